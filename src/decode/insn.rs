//! Decoded instruction model
//!
//! `Insn` is the closed tagged union over the supported opcode families.
//! Every site that dispatches on it matches exhaustively, so extending the
//! instruction set without updating all handling sites fails to build.
//! Labels and full-frame resets appear as pseudo-instructions in the
//! decoded list, the way the decoder emits them.

use std::fmt;

use super::Label;
use crate::value::Category;

/// Loadable constant operand of an `ldc` family instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Str(String),
    /// Class literal, by internal name or array descriptor.
    Class(String),
    /// Method type constant, by method descriptor.
    MethodType(String),
    /// Method handle constant, by the referenced member's descriptor.
    MethodHandle(String),
    /// Dynamically-computed constant, by field descriptor.
    Dynamic { descriptor: String },
}

impl Const {
    pub fn kind(&self) -> &'static str {
        match self {
            Const::Int(_) => "int",
            Const::Float(_) => "float",
            Const::Long(_) => "long",
            Const::Double(_) => "double",
            Const::Str(_) => "string",
            Const::Class(_) => "class",
            Const::MethodType(_) => "method_type",
            Const::MethodHandle(_) => "method_handle",
            Const::Dynamic { .. } => "dynamic",
        }
    }
}

/// Primitive element kind of a `newarray` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimArray {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl PrimArray {
    /// Array descriptor for this element kind, e.g. `[I`.
    pub fn descriptor(self) -> &'static str {
        match self {
            PrimArray::Boolean => "[Z",
            PrimArray::Char => "[C",
            PrimArray::Float => "[F",
            PrimArray::Double => "[D",
            PrimArray::Byte => "[B",
            PrimArray::Short => "[S",
            PrimArray::Int => "[I",
            PrimArray::Long => "[J",
        }
    }
}

/// Dispatch kind of a method invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// Direction and target of a field access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

impl FieldOp {
    pub fn is_instance(self) -> bool {
        matches!(self, FieldOp::GetField | FieldOp::PutField)
    }

    pub fn is_put(self) -> bool {
        matches!(self, FieldOp::PutStatic | FieldOp::PutField)
    }
}

/// One slot declared by a full-frame reset pseudo-instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlot {
    Int,
    Float,
    Long,
    Double,
    Reference,
}

impl FrameSlot {
    pub fn category(self) -> Category {
        match self {
            FrameSlot::Int => Category::Int,
            FrameSlot::Float => Category::Float,
            FrameSlot::Long => Category::Long,
            FrameSlot::Double => Category::Double,
            FrameSlot::Reference => Category::Reference,
        }
    }
}

/// A decoded instruction with its static operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    Nop,

    // Constants
    AconstNull,
    IconstM1,
    Iconst0,
    Iconst1,
    Iconst2,
    Iconst3,
    Iconst4,
    Iconst5,
    Lconst0,
    Lconst1,
    Fconst0,
    Fconst1,
    Fconst2,
    Dconst0,
    Dconst1,
    Bipush(i8),
    Sipush(i16),
    Ldc(Const),

    // Local variable loads and stores
    Iload(u16),
    Lload(u16),
    Fload(u16),
    Dload(u16),
    Aload(u16),
    Istore(u16),
    Lstore(u16),
    Fstore(u16),
    Dstore(u16),
    Astore(u16),

    // Array loads and stores
    Iaload,
    Laload,
    Faload,
    Daload,
    Aaload,
    Baload,
    Caload,
    Saload,
    Iastore,
    Lastore,
    Fastore,
    Dastore,
    Aastore,
    Bastore,
    Castore,
    Sastore,

    // Stack shuffles
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,

    // Arithmetic
    Iadd,
    Ladd,
    Fadd,
    Dadd,
    Isub,
    Lsub,
    Fsub,
    Dsub,
    Imul,
    Lmul,
    Fmul,
    Dmul,
    Idiv,
    Ldiv,
    Fdiv,
    Ddiv,
    Irem,
    Lrem,
    Frem,
    Drem,
    Ineg,
    Lneg,
    Fneg,
    Dneg,

    // Bitwise
    Ishl,
    Lshl,
    Ishr,
    Lshr,
    Iushr,
    Lushr,
    Iand,
    Land,
    Ior,
    Lor,
    Ixor,
    Lxor,

    Iinc { var: u16, delta: i16 },

    // Conversions
    I2l,
    I2f,
    I2d,
    L2i,
    L2f,
    L2d,
    F2i,
    F2l,
    F2d,
    D2i,
    D2l,
    D2f,
    I2b,
    I2c,
    I2s,

    // Comparisons
    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,

    // Conditional branches
    Ifeq(Label),
    Ifne(Label),
    Iflt(Label),
    Ifge(Label),
    Ifgt(Label),
    Ifle(Label),
    IfIcmpeq(Label),
    IfIcmpne(Label),
    IfIcmplt(Label),
    IfIcmpge(Label),
    IfIcmpgt(Label),
    IfIcmple(Label),
    IfAcmpeq(Label),
    IfAcmpne(Label),
    Ifnull(Label),
    Ifnonnull(Label),

    // Unconditional control transfer
    Goto(Label),
    Jsr(Label),
    Ret(u16),
    Tableswitch { min: i32, max: i32, default: Label, targets: Vec<Label> },
    Lookupswitch { default: Label, pairs: Vec<(i32, Label)> },

    // Returns
    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
    Areturn,
    Return,

    // Field access and invocation
    Field { op: FieldOp, owner: String, name: String, descriptor: String },
    Invoke { kind: InvokeKind, owner: String, name: String, descriptor: String },
    Invokedynamic { name: String, descriptor: String },

    // Objects and arrays
    New(String),
    Newarray(PrimArray),
    Anewarray(String),
    Multianewarray { descriptor: String, dims: u8 },
    Arraylength,
    Athrow,
    Checkcast(String),
    Instanceof(String),

    // Synchronization
    Monitorenter,
    Monitorexit,

    // Pseudo-instructions emitted by the decoder
    Label(Label),
    Frame { locals: Vec<FrameSlot>, stack: Vec<FrameSlot> },
}

impl Insn {
    /// Conventional mnemonic of this instruction.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Insn::Nop => "nop",
            Insn::AconstNull => "aconst_null",
            Insn::IconstM1 => "iconst_m1",
            Insn::Iconst0 => "iconst_0",
            Insn::Iconst1 => "iconst_1",
            Insn::Iconst2 => "iconst_2",
            Insn::Iconst3 => "iconst_3",
            Insn::Iconst4 => "iconst_4",
            Insn::Iconst5 => "iconst_5",
            Insn::Lconst0 => "lconst_0",
            Insn::Lconst1 => "lconst_1",
            Insn::Fconst0 => "fconst_0",
            Insn::Fconst1 => "fconst_1",
            Insn::Fconst2 => "fconst_2",
            Insn::Dconst0 => "dconst_0",
            Insn::Dconst1 => "dconst_1",
            Insn::Bipush(_) => "bipush",
            Insn::Sipush(_) => "sipush",
            Insn::Ldc(_) => "ldc",
            Insn::Iload(_) => "iload",
            Insn::Lload(_) => "lload",
            Insn::Fload(_) => "fload",
            Insn::Dload(_) => "dload",
            Insn::Aload(_) => "aload",
            Insn::Istore(_) => "istore",
            Insn::Lstore(_) => "lstore",
            Insn::Fstore(_) => "fstore",
            Insn::Dstore(_) => "dstore",
            Insn::Astore(_) => "astore",
            Insn::Iaload => "iaload",
            Insn::Laload => "laload",
            Insn::Faload => "faload",
            Insn::Daload => "daload",
            Insn::Aaload => "aaload",
            Insn::Baload => "baload",
            Insn::Caload => "caload",
            Insn::Saload => "saload",
            Insn::Iastore => "iastore",
            Insn::Lastore => "lastore",
            Insn::Fastore => "fastore",
            Insn::Dastore => "dastore",
            Insn::Aastore => "aastore",
            Insn::Bastore => "bastore",
            Insn::Castore => "castore",
            Insn::Sastore => "sastore",
            Insn::Pop => "pop",
            Insn::Pop2 => "pop2",
            Insn::Dup => "dup",
            Insn::DupX1 => "dup_x1",
            Insn::DupX2 => "dup_x2",
            Insn::Dup2 => "dup2",
            Insn::Dup2X1 => "dup2_x1",
            Insn::Dup2X2 => "dup2_x2",
            Insn::Swap => "swap",
            Insn::Iadd => "iadd",
            Insn::Ladd => "ladd",
            Insn::Fadd => "fadd",
            Insn::Dadd => "dadd",
            Insn::Isub => "isub",
            Insn::Lsub => "lsub",
            Insn::Fsub => "fsub",
            Insn::Dsub => "dsub",
            Insn::Imul => "imul",
            Insn::Lmul => "lmul",
            Insn::Fmul => "fmul",
            Insn::Dmul => "dmul",
            Insn::Idiv => "idiv",
            Insn::Ldiv => "ldiv",
            Insn::Fdiv => "fdiv",
            Insn::Ddiv => "ddiv",
            Insn::Irem => "irem",
            Insn::Lrem => "lrem",
            Insn::Frem => "frem",
            Insn::Drem => "drem",
            Insn::Ineg => "ineg",
            Insn::Lneg => "lneg",
            Insn::Fneg => "fneg",
            Insn::Dneg => "dneg",
            Insn::Ishl => "ishl",
            Insn::Lshl => "lshl",
            Insn::Ishr => "ishr",
            Insn::Lshr => "lshr",
            Insn::Iushr => "iushr",
            Insn::Lushr => "lushr",
            Insn::Iand => "iand",
            Insn::Land => "land",
            Insn::Ior => "ior",
            Insn::Lor => "lor",
            Insn::Ixor => "ixor",
            Insn::Lxor => "lxor",
            Insn::Iinc { .. } => "iinc",
            Insn::I2l => "i2l",
            Insn::I2f => "i2f",
            Insn::I2d => "i2d",
            Insn::L2i => "l2i",
            Insn::L2f => "l2f",
            Insn::L2d => "l2d",
            Insn::F2i => "f2i",
            Insn::F2l => "f2l",
            Insn::F2d => "f2d",
            Insn::D2i => "d2i",
            Insn::D2l => "d2l",
            Insn::D2f => "d2f",
            Insn::I2b => "i2b",
            Insn::I2c => "i2c",
            Insn::I2s => "i2s",
            Insn::Lcmp => "lcmp",
            Insn::Fcmpl => "fcmpl",
            Insn::Fcmpg => "fcmpg",
            Insn::Dcmpl => "dcmpl",
            Insn::Dcmpg => "dcmpg",
            Insn::Ifeq(_) => "ifeq",
            Insn::Ifne(_) => "ifne",
            Insn::Iflt(_) => "iflt",
            Insn::Ifge(_) => "ifge",
            Insn::Ifgt(_) => "ifgt",
            Insn::Ifle(_) => "ifle",
            Insn::IfIcmpeq(_) => "if_icmpeq",
            Insn::IfIcmpne(_) => "if_icmpne",
            Insn::IfIcmplt(_) => "if_icmplt",
            Insn::IfIcmpge(_) => "if_icmpge",
            Insn::IfIcmpgt(_) => "if_icmpgt",
            Insn::IfIcmple(_) => "if_icmple",
            Insn::IfAcmpeq(_) => "if_acmpeq",
            Insn::IfAcmpne(_) => "if_acmpne",
            Insn::Ifnull(_) => "ifnull",
            Insn::Ifnonnull(_) => "ifnonnull",
            Insn::Goto(_) => "goto",
            Insn::Jsr(_) => "jsr",
            Insn::Ret(_) => "ret",
            Insn::Tableswitch { .. } => "tableswitch",
            Insn::Lookupswitch { .. } => "lookupswitch",
            Insn::Ireturn => "ireturn",
            Insn::Lreturn => "lreturn",
            Insn::Freturn => "freturn",
            Insn::Dreturn => "dreturn",
            Insn::Areturn => "areturn",
            Insn::Return => "return",
            Insn::Field { op: FieldOp::GetStatic, .. } => "getstatic",
            Insn::Field { op: FieldOp::PutStatic, .. } => "putstatic",
            Insn::Field { op: FieldOp::GetField, .. } => "getfield",
            Insn::Field { op: FieldOp::PutField, .. } => "putfield",
            Insn::Invoke { kind: InvokeKind::Virtual, .. } => "invokevirtual",
            Insn::Invoke { kind: InvokeKind::Special, .. } => "invokespecial",
            Insn::Invoke { kind: InvokeKind::Static, .. } => "invokestatic",
            Insn::Invoke { kind: InvokeKind::Interface, .. } => "invokeinterface",
            Insn::Invokedynamic { .. } => "invokedynamic",
            Insn::New(_) => "new",
            Insn::Newarray(_) => "newarray",
            Insn::Anewarray(_) => "anewarray",
            Insn::Multianewarray { .. } => "multianewarray",
            Insn::Arraylength => "arraylength",
            Insn::Athrow => "athrow",
            Insn::Checkcast(_) => "checkcast",
            Insn::Instanceof(_) => "instanceof",
            Insn::Monitorenter => "monitorenter",
            Insn::Monitorexit => "monitorexit",
            Insn::Label(_) => "label",
            Insn::Frame { .. } => "frame",
        }
    }

    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Insn::Ifeq(_)
                | Insn::Ifne(_)
                | Insn::Iflt(_)
                | Insn::Ifge(_)
                | Insn::Ifgt(_)
                | Insn::Ifle(_)
                | Insn::IfIcmpeq(_)
                | Insn::IfIcmpne(_)
                | Insn::IfIcmplt(_)
                | Insn::IfIcmpge(_)
                | Insn::IfIcmpgt(_)
                | Insn::IfIcmple(_)
                | Insn::IfAcmpeq(_)
                | Insn::IfAcmpne(_)
                | Insn::Ifnull(_)
                | Insn::Ifnonnull(_)
        )
    }

    pub fn is_return(&self) -> bool {
        matches!(
            self,
            Insn::Ireturn | Insn::Lreturn | Insn::Freturn | Insn::Dreturn | Insn::Areturn | Insn::Return
        )
    }

    pub fn is_shuffle(&self) -> bool {
        matches!(
            self,
            Insn::Dup | Insn::DupX1 | Insn::DupX2 | Insn::Dup2 | Insn::Dup2X1 | Insn::Dup2X2 | Insn::Swap
        )
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Bipush(v) => write!(f, "bipush {v}"),
            Insn::Sipush(v) => write!(f, "sipush {v}"),
            Insn::Ldc(Const::Int(v)) => write!(f, "ldc {v}"),
            Insn::Ldc(Const::Float(v)) => write!(f, "ldc {v:?}f"),
            Insn::Ldc(Const::Long(v)) => write!(f, "ldc {v}L"),
            Insn::Ldc(Const::Double(v)) => write!(f, "ldc {v:?}"),
            Insn::Ldc(Const::Str(v)) => write!(f, "ldc {v:?}"),
            Insn::Ldc(c) => write!(f, "ldc <{}>", c.kind()),
            Insn::Iload(v) | Insn::Lload(v) | Insn::Fload(v) | Insn::Dload(v) | Insn::Aload(v) => {
                write!(f, "{} {v}", self.mnemonic())
            }
            Insn::Istore(v) | Insn::Lstore(v) | Insn::Fstore(v) | Insn::Dstore(v) | Insn::Astore(v) => {
                write!(f, "{} {v}", self.mnemonic())
            }
            Insn::Iinc { var, delta } => write!(f, "iinc {var} {delta}"),
            Insn::Ifeq(l)
            | Insn::Ifne(l)
            | Insn::Iflt(l)
            | Insn::Ifge(l)
            | Insn::Ifgt(l)
            | Insn::Ifle(l)
            | Insn::IfIcmpeq(l)
            | Insn::IfIcmpne(l)
            | Insn::IfIcmplt(l)
            | Insn::IfIcmpge(l)
            | Insn::IfIcmpgt(l)
            | Insn::IfIcmple(l)
            | Insn::IfAcmpeq(l)
            | Insn::IfAcmpne(l)
            | Insn::Ifnull(l)
            | Insn::Ifnonnull(l)
            | Insn::Goto(l)
            | Insn::Jsr(l) => write!(f, "{} {l}", self.mnemonic()),
            Insn::Ret(var) => write!(f, "ret {var}"),
            Insn::Tableswitch { min, max, default, .. } => {
                write!(f, "tableswitch [{min}..{max}] default {default}")
            }
            Insn::Lookupswitch { default, pairs } => {
                write!(f, "lookupswitch ({} keys) default {default}", pairs.len())
            }
            Insn::Field { owner, name, descriptor, .. } => {
                write!(f, "{} {owner}.{name} {descriptor}", self.mnemonic())
            }
            Insn::Invoke { owner, name, descriptor, .. } => {
                write!(f, "{} {owner}.{name}{descriptor}", self.mnemonic())
            }
            Insn::Invokedynamic { name, descriptor } => {
                write!(f, "invokedynamic {name}{descriptor}")
            }
            Insn::New(t) => write!(f, "new {t}"),
            Insn::Newarray(k) => write!(f, "newarray {}", k.descriptor()),
            Insn::Anewarray(t) => write!(f, "anewarray {t}"),
            Insn::Multianewarray { descriptor, dims } => {
                write!(f, "multianewarray {descriptor} {dims}")
            }
            Insn::Checkcast(t) => write!(f, "checkcast {t}"),
            Insn::Instanceof(t) => write!(f, "instanceof {t}"),
            Insn::Label(l) => write!(f, "{l}:"),
            Insn::Frame { locals, stack } => {
                write!(f, "frame locals={} stack={}", locals.len(), stack.len())
            }
            _ => f.write_str(self.mnemonic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_family_predicates() {
        assert!(Insn::IfIcmple(Label(0)).is_conditional_branch());
        assert!(!Insn::Goto(Label(0)).is_conditional_branch());
        assert!(Insn::Areturn.is_return());
        assert!(!Insn::Athrow.is_return());
        assert!(Insn::Dup2X2.is_shuffle());
        assert!(!Insn::Pop2.is_shuffle());
    }

    #[test]
    fn display_renders_mnemonic_and_operands() {
        assert_eq!(Insn::Iconst3.to_string(), "iconst_3");
        assert_eq!(Insn::Iload(2).to_string(), "iload 2");
        assert_eq!(Insn::IfIcmpne(Label(4)).to_string(), "if_icmpne L4");
        assert_eq!(Insn::Ldc(Const::Str("hi".into())).to_string(), "ldc \"hi\"");
        assert_eq!(
            Insn::Invoke {
                kind: InvokeKind::Static,
                owner: "Math".into(),
                name: "abs".into(),
                descriptor: "(I)I".into(),
            }
            .to_string(),
            "invokestatic Math.abs(I)I"
        );
        assert_eq!(Insn::Label(Label(7)).to_string(), "L7:");
    }
}
