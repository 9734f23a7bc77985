//! Decoder output contract
//!
//! The decoder that turns a compiled method's raw byte encoding into this
//! structure lives outside the crate; everything here is its finished,
//! immutable output. `MethodCode` carries the ordered instruction list
//! (labels and frame resets as pseudo-instructions), the method signature,
//! declared stack/locals limits, try regions and the debug maps.

use std::collections::HashMap;
use std::fmt;

pub mod descriptor;
mod insn;

pub use insn::{Const, FieldOp, FrameSlot, Insn, InvokeKind, PrimArray};

/// Opaque position marker inside a decoded instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A declared `[start, end)` protected range with its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryRegion {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// Internal name of the caught exception type; `None` catches everything.
    pub catch_type: Option<String>,
}

/// Debug live range of a named local variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVarDebug {
    pub name: String,
    pub descriptor: String,
    pub start: Label,
    pub end: Label,
    pub index: u16,
}

/// One decoded method, as produced by the external decoder.
#[derive(Debug, Clone, Default)]
pub struct MethodCode {
    pub instructions: Vec<Insn>,
    /// Method descriptor, e.g. `(IJ)V`.
    pub descriptor: String,
    pub is_static: bool,
    /// Declared operand stack limit, in physical slots.
    pub max_stack: usize,
    /// Declared local variable count, in physical slots.
    pub max_locals: usize,
    /// Try regions in declaration order.
    pub try_regions: Vec<TryRegion>,
    /// Label of the start of each source line.
    pub line_numbers: HashMap<Label, u32>,
    pub local_debug: Vec<LocalVarDebug>,
}

impl MethodCode {
    pub fn new(descriptor: impl Into<String>, is_static: bool) -> Self {
        Self {
            descriptor: descriptor.into(),
            is_static,
            ..Self::default()
        }
    }

    pub fn with_limits(mut self, max_stack: usize, max_locals: usize) -> Self {
        self.max_stack = max_stack;
        self.max_locals = max_locals;
        self
    }

    /// Append an instruction, returning its index.
    pub fn emit(&mut self, insn: Insn) -> usize {
        self.instructions.push(insn);
        self.instructions.len() - 1
    }

    pub fn add_try_region(&mut self, region: TryRegion) {
        self.try_regions.push(region);
    }

    /// Index of the pseudo-instruction marking `label`, if present.
    pub fn label_index(&self, label: Label) -> Option<usize> {
        self.instructions
            .iter()
            .position(|i| matches!(i, Insn::Label(l) if *l == label))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_lookup() {
        let mut code = MethodCode::new("()V", true);
        code.emit(Insn::Nop);
        code.emit(Insn::Label(Label(4)));
        code.emit(Insn::Return);
        assert_eq!(code.label_index(Label(4)), Some(1));
        assert_eq!(code.label_index(Label(9)), None);
    }

    #[test]
    fn renders_instructions() {
        assert_eq!(Insn::Iload(3).to_string(), "iload 3");
        assert_eq!(Insn::Goto(Label(2)).to_string(), "goto L2");
        assert_eq!(Insn::Iadd.to_string(), "iadd");
        assert_eq!(
            Insn::Iinc { var: 1, delta: -1 }.to_string(),
            "iinc 1 -1"
        );
    }
}
