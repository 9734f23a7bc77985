//! Static stack-effect table
//!
//! For every decoded instruction, `EffectTable::build` computes what it
//! pops, what it pushes and where it may jump, purely from the static
//! opcode and operands. The match over `Insn` is exhaustive: the
//! instruction set is closed, so an opcode the simulator cannot handle is
//! unrepresentable rather than a runtime error.

use crate::decode::{descriptor, Const, Insn, InvokeKind, Label, MethodCode};
use crate::error::{Error, Result};
use crate::value::Category;

/// One pop requirement of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopReq {
    /// Exact category, popped as one logical unit.
    Cat(Category),
    /// Any one-slot value (not a continuation slot).
    Any1,
    /// Any two physical slots whose lower slot is not a continuation.
    Any2,
    /// The `astore` wildcard: a reference or a return address.
    RefOrRetAddr,
}

impl PopReq {
    /// Physical slots this requirement consumes.
    pub fn width(self) -> usize {
        match self {
            PopReq::Cat(c) => c.width(),
            PopReq::Any1 | PopReq::RefOrRetAddr => 1,
            PopReq::Any2 => 2,
        }
    }
}

/// Compiled pop/push/jump descriptor for one instruction.
#[derive(Debug, Clone, Default)]
pub struct EffectEntry {
    /// Pop requirements in the order they are applied to the stack
    /// (topmost first).
    pub pops: Vec<PopReq>,
    /// Categories pushed, in push order. Empty for stack shuffles, whose
    /// pushes depend on the identities of the popped values.
    pub pushes: Vec<Category>,
    /// Static jump target candidates, default target first for switches.
    pub jump_targets: Vec<Label>,
    pub is_throw: bool,
    pub is_return: bool,
    pub is_frame_reset: bool,
    /// Subroutine return: the target comes from a return-address local.
    pub is_ret: bool,
    /// Stack is emptied during the push phase (returns and throw).
    pub clears_stack: bool,
    /// Push behavior is resolved from the popped values at execution time.
    pub is_shuffle: bool,
}

impl EffectEntry {
    fn pops(mut self, pops: &[PopReq]) -> Self {
        self.pops.extend_from_slice(pops);
        self
    }

    fn pushes(mut self, pushes: &[Category]) -> Self {
        self.pushes.extend_from_slice(pushes);
        self
    }

    fn jump(mut self, target: Label) -> Self {
        self.jump_targets.push(target);
        self
    }

    /// Sum of physical slots popped.
    pub fn pop_width(&self) -> usize {
        self.pops.iter().map(|p| p.width()).sum()
    }

    /// Sum of physical slots pushed.
    pub fn push_width(&self) -> usize {
        self.pushes.iter().map(|c| c.width()).sum()
    }
}

/// Static stack effects for a whole method, indexed by instruction.
#[derive(Debug, Clone)]
pub struct EffectTable {
    entries: Vec<EffectEntry>,
}

impl EffectTable {
    /// Compile the effect entry of every instruction in `method`.
    pub fn build(method: &MethodCode) -> Result<EffectTable> {
        let entries = method
            .instructions
            .iter()
            .map(build_entry)
            .collect::<Result<Vec<_>>>()?;
        Ok(EffectTable { entries })
    }

    pub fn entry(&self, index: usize) -> &EffectEntry {
        &self.entries[index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stack category a loadable constant pushes.
fn const_category(c: &Const) -> Result<Category> {
    match c {
        Const::Int(_) => Ok(Category::Int),
        Const::Float(_) => Ok(Category::Float),
        Const::Long(_) => Ok(Category::Long),
        Const::Double(_) => Ok(Category::Double),
        Const::Str(_) | Const::Class(_) | Const::MethodType(_) | Const::MethodHandle(_) => {
            Ok(Category::Reference)
        }
        Const::Dynamic { descriptor: d } => descriptor::field_category(d)
            .map_err(|_| Error::UnsupportedConstant { kind: format!("dynamic constant {d}") }),
    }
}

/// Pop requirements for a call's arguments: reverse of push order, since
/// arguments are pushed left to right and the rightmost is on top.
fn argument_pops(desc: &str) -> Result<Vec<PopReq>> {
    let (args, _) = descriptor::method_categories(desc)?;
    Ok(args.into_iter().rev().map(PopReq::Cat).collect())
}

fn build_entry(insn: &Insn) -> Result<EffectEntry> {
    use Category::*;
    use PopReq::{Any1, Any2, Cat, RefOrRetAddr};

    let e = EffectEntry::default();
    let entry = match insn {
        Insn::Nop | Insn::Label(_) => e,
        Insn::Frame { .. } => EffectEntry { is_frame_reset: true, ..e },

        // Constants
        Insn::AconstNull => e.pushes(&[Reference]),
        Insn::IconstM1
        | Insn::Iconst0
        | Insn::Iconst1
        | Insn::Iconst2
        | Insn::Iconst3
        | Insn::Iconst4
        | Insn::Iconst5
        | Insn::Bipush(_)
        | Insn::Sipush(_) => e.pushes(&[Int]),
        Insn::Lconst0 | Insn::Lconst1 => e.pushes(&[Long]),
        Insn::Fconst0 | Insn::Fconst1 | Insn::Fconst2 => e.pushes(&[Float]),
        Insn::Dconst0 | Insn::Dconst1 => e.pushes(&[Double]),
        Insn::Ldc(c) => e.pushes(&[const_category(c)?]),

        // Local loads and stores
        Insn::Iload(_) => e.pushes(&[Int]),
        Insn::Lload(_) => e.pushes(&[Long]),
        Insn::Fload(_) => e.pushes(&[Float]),
        Insn::Dload(_) => e.pushes(&[Double]),
        Insn::Aload(_) => e.pushes(&[Reference]),
        Insn::Istore(_) => e.pops(&[Cat(Int)]),
        Insn::Lstore(_) => e.pops(&[Cat(Long)]),
        Insn::Fstore(_) => e.pops(&[Cat(Float)]),
        Insn::Dstore(_) => e.pops(&[Cat(Double)]),
        Insn::Astore(_) => e.pops(&[RefOrRetAddr]),

        // Array loads: index then array ref; sub-int elements widen to int.
        Insn::Iaload | Insn::Baload | Insn::Caload | Insn::Saload => {
            e.pops(&[Cat(Int), Cat(Reference)]).pushes(&[Int])
        }
        Insn::Laload => e.pops(&[Cat(Int), Cat(Reference)]).pushes(&[Long]),
        Insn::Faload => e.pops(&[Cat(Int), Cat(Reference)]).pushes(&[Float]),
        Insn::Daload => e.pops(&[Cat(Int), Cat(Reference)]).pushes(&[Double]),
        Insn::Aaload => e.pops(&[Cat(Int), Cat(Reference)]).pushes(&[Reference]),

        // Array stores: value, index, array ref.
        Insn::Iastore | Insn::Bastore | Insn::Castore | Insn::Sastore => {
            e.pops(&[Cat(Int), Cat(Int), Cat(Reference)])
        }
        Insn::Lastore => e.pops(&[Cat(Long), Cat(Int), Cat(Reference)]),
        Insn::Fastore => e.pops(&[Cat(Float), Cat(Int), Cat(Reference)]),
        Insn::Dastore => e.pops(&[Cat(Double), Cat(Int), Cat(Reference)]),
        Insn::Aastore => e.pops(&[Cat(Reference), Cat(Int), Cat(Reference)]),

        // Stack shuffles: pop widths are static, pushes are not.
        Insn::Pop => e.pops(&[Any1]),
        Insn::Pop2 => e.pops(&[Any2]),
        Insn::Dup => EffectEntry { is_shuffle: true, ..e.pops(&[Any1]) },
        Insn::DupX1 => EffectEntry { is_shuffle: true, ..e.pops(&[Any1, Any1]) },
        Insn::DupX2 => EffectEntry { is_shuffle: true, ..e.pops(&[Any1, Any2]) },
        Insn::Dup2 => EffectEntry { is_shuffle: true, ..e.pops(&[Any2]) },
        Insn::Dup2X1 => EffectEntry { is_shuffle: true, ..e.pops(&[Any2, Any1]) },
        Insn::Dup2X2 => EffectEntry { is_shuffle: true, ..e.pops(&[Any2, Any2]) },
        Insn::Swap => EffectEntry { is_shuffle: true, ..e.pops(&[Any1, Any1]) },

        // Arithmetic
        Insn::Iadd | Insn::Isub | Insn::Imul | Insn::Idiv | Insn::Irem => {
            e.pops(&[Cat(Int), Cat(Int)]).pushes(&[Int])
        }
        Insn::Ladd | Insn::Lsub | Insn::Lmul | Insn::Ldiv | Insn::Lrem => {
            e.pops(&[Cat(Long), Cat(Long)]).pushes(&[Long])
        }
        Insn::Fadd | Insn::Fsub | Insn::Fmul | Insn::Fdiv | Insn::Frem => {
            e.pops(&[Cat(Float), Cat(Float)]).pushes(&[Float])
        }
        Insn::Dadd | Insn::Dsub | Insn::Dmul | Insn::Ddiv | Insn::Drem => {
            e.pops(&[Cat(Double), Cat(Double)]).pushes(&[Double])
        }
        Insn::Ineg => e.pops(&[Cat(Int)]).pushes(&[Int]),
        Insn::Lneg => e.pops(&[Cat(Long)]).pushes(&[Long]),
        Insn::Fneg => e.pops(&[Cat(Float)]).pushes(&[Float]),
        Insn::Dneg => e.pops(&[Cat(Double)]).pushes(&[Double]),

        // Bitwise; long shifts take an int shift distance on top.
        Insn::Ishl | Insn::Ishr | Insn::Iushr | Insn::Iand | Insn::Ior | Insn::Ixor => {
            e.pops(&[Cat(Int), Cat(Int)]).pushes(&[Int])
        }
        Insn::Lshl | Insn::Lshr | Insn::Lushr => e.pops(&[Cat(Int), Cat(Long)]).pushes(&[Long]),
        Insn::Land | Insn::Lor | Insn::Lxor => e.pops(&[Cat(Long), Cat(Long)]).pushes(&[Long]),

        Insn::Iinc { .. } => e,

        // Conversions
        Insn::I2l => e.pops(&[Cat(Int)]).pushes(&[Long]),
        Insn::I2f => e.pops(&[Cat(Int)]).pushes(&[Float]),
        Insn::I2d => e.pops(&[Cat(Int)]).pushes(&[Double]),
        Insn::L2i => e.pops(&[Cat(Long)]).pushes(&[Int]),
        Insn::L2f => e.pops(&[Cat(Long)]).pushes(&[Float]),
        Insn::L2d => e.pops(&[Cat(Long)]).pushes(&[Double]),
        Insn::F2i => e.pops(&[Cat(Float)]).pushes(&[Int]),
        Insn::F2l => e.pops(&[Cat(Float)]).pushes(&[Long]),
        Insn::F2d => e.pops(&[Cat(Float)]).pushes(&[Double]),
        Insn::D2i => e.pops(&[Cat(Double)]).pushes(&[Int]),
        Insn::D2l => e.pops(&[Cat(Double)]).pushes(&[Long]),
        Insn::D2f => e.pops(&[Cat(Double)]).pushes(&[Float]),
        Insn::I2b | Insn::I2c | Insn::I2s => e.pops(&[Cat(Int)]).pushes(&[Int]),

        // Comparisons: two wide operands fold to one int.
        Insn::Lcmp => e.pops(&[Cat(Long), Cat(Long)]).pushes(&[Int]),
        Insn::Fcmpl | Insn::Fcmpg => e.pops(&[Cat(Float), Cat(Float)]).pushes(&[Int]),
        Insn::Dcmpl | Insn::Dcmpg => e.pops(&[Cat(Double), Cat(Double)]).pushes(&[Int]),

        // Conditional branches: one target plus implicit fallthrough.
        Insn::Ifeq(l) | Insn::Ifne(l) | Insn::Iflt(l) | Insn::Ifge(l) | Insn::Ifgt(l)
        | Insn::Ifle(l) => e.pops(&[Cat(Int)]).jump(*l),
        Insn::IfIcmpeq(l)
        | Insn::IfIcmpne(l)
        | Insn::IfIcmplt(l)
        | Insn::IfIcmpge(l)
        | Insn::IfIcmpgt(l)
        | Insn::IfIcmple(l) => e.pops(&[Cat(Int), Cat(Int)]).jump(*l),
        Insn::IfAcmpeq(l) | Insn::IfAcmpne(l) => {
            e.pops(&[Cat(Reference), Cat(Reference)]).jump(*l)
        }
        Insn::Ifnull(l) | Insn::Ifnonnull(l) => e.pops(&[Cat(Reference)]).jump(*l),

        Insn::Goto(l) => e.jump(*l),
        Insn::Jsr(l) => e.pushes(&[ReturnAddress]).jump(*l),
        Insn::Ret(_) => EffectEntry { is_ret: true, ..e },

        Insn::Tableswitch { default, targets, .. } => {
            let mut entry = e.pops(&[Cat(Int)]).jump(*default);
            entry.jump_targets.extend_from_slice(targets);
            entry
        }
        Insn::Lookupswitch { default, pairs } => {
            let mut entry = e.pops(&[Cat(Int)]).jump(*default);
            entry.jump_targets.extend(pairs.iter().map(|(_, l)| *l));
            entry
        }

        // Returns: pop the matching category and empty the stack.
        Insn::Ireturn => ret(e.pops(&[Cat(Int)])),
        Insn::Lreturn => ret(e.pops(&[Cat(Long)])),
        Insn::Freturn => ret(e.pops(&[Cat(Float)])),
        Insn::Dreturn => ret(e.pops(&[Cat(Double)])),
        Insn::Areturn => ret(e.pops(&[Cat(Reference)])),
        Insn::Return => ret(e),

        Insn::Field { op, descriptor: d, .. } => {
            let cat = descriptor::field_category(d)?;
            let mut entry = e;
            if op.is_put() {
                entry.pops.push(Cat(cat));
            } else {
                entry.pushes.push(cat);
            }
            // The receiver sits beneath the value, so it is popped second.
            if op.is_instance() {
                entry.pops.push(Cat(Reference));
            }
            entry
        }

        Insn::Invoke { kind, descriptor: d, .. } => {
            let mut entry = e.pops(&argument_pops(d)?);
            if *kind != InvokeKind::Static {
                entry.pops.push(Cat(Reference));
            }
            let (_, ret_cat) = descriptor::method_categories(d)?;
            if let Some(cat) = ret_cat {
                entry.pushes.push(cat);
            }
            entry
        }
        Insn::Invokedynamic { descriptor: d, .. } => {
            let mut entry = e.pops(&argument_pops(d)?);
            let (_, ret_cat) = descriptor::method_categories(d)?;
            if let Some(cat) = ret_cat {
                entry.pushes.push(cat);
            }
            entry
        }

        // Objects and arrays
        Insn::New(_) => e.pushes(&[Reference]),
        Insn::Newarray(_) | Insn::Anewarray(_) => {
            e.pops(&[Cat(Int)]).pushes(&[Reference])
        }
        Insn::Multianewarray { dims, .. } => {
            let mut entry = e.pushes(&[Reference]);
            entry.pops = vec![Cat(Int); *dims as usize];
            entry
        }
        Insn::Arraylength => e.pops(&[Cat(Reference)]).pushes(&[Int]),
        Insn::Athrow => EffectEntry {
            is_throw: true,
            clears_stack: true,
            ..e.pops(&[Cat(Reference)])
        },
        Insn::Checkcast(_) => e.pops(&[Cat(Reference)]).pushes(&[Reference]),
        Insn::Instanceof(_) => e.pops(&[Cat(Reference)]).pushes(&[Int]),

        Insn::Monitorenter | Insn::Monitorexit => e.pops(&[Cat(Reference)]),
    };
    Ok(entry)
}

fn ret(e: EffectEntry) -> EffectEntry {
    EffectEntry { is_return: true, clears_stack: true, ..e }
}
