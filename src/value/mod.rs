//! Typed simulated values
//!
//! A `Value` models one logical entry on the operand stack or in a local
//! slot: its category, an optional statically-known literal, and a lineage
//! handle recording where it came from. Values are immutable; every
//! transformation (move, merge, known-literal update) produces a new one.

use std::fmt;

mod lineage;

pub use lineage::{Lineage, LineageStore};

/// Slot category of a simulated value.
///
/// Long and Double are two slots wide; their second physical slot is a
/// continuation marker (`LongCont`/`DoubleCont`) that is never independently
/// readable or writable. `Empty` marks an uninitialized local slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Int,
    Long,
    Float,
    Double,
    Reference,
    ReturnAddress,
    LongCont,
    DoubleCont,
    Empty,
}

impl Category {
    /// Physical slots a value of this category occupies.
    pub fn width(self) -> usize {
        match self {
            Category::Long | Category::Double => 2,
            _ => 1,
        }
    }

    /// Continuation category for wide values.
    pub fn continuation(self) -> Option<Category> {
        match self {
            Category::Long => Some(Category::LongCont),
            Category::Double => Some(Category::DoubleCont),
            _ => None,
        }
    }

    pub fn is_continuation(self) -> bool {
        matches!(self, Category::LongCont | Category::DoubleCont)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Int => "int",
            Category::Long => "long",
            Category::Float => "float",
            Category::Double => "double",
            Category::Reference => "reference",
            Category::ReturnAddress => "return_address",
            Category::LongCont => "long_cont",
            Category::DoubleCont => "double_cont",
            Category::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// One immutable simulated value.
#[derive(Debug, Clone)]
pub struct Value {
    pub category: Category,
    pub known: Option<String>,
    pub lineage: Lineage,
}

impl Value {
    pub fn new(category: Category, lineage: Lineage) -> Self {
        Self { category, known: None, lineage }
    }

    /// New value with the known literal replaced; lineage is untouched,
    /// literal knowledge and provenance being independent facets.
    pub fn with_known(&self, known: impl Into<String>) -> Self {
        Self {
            category: self.category,
            known: Some(known.into()),
            lineage: self.lineage,
        }
    }

    /// Continuation slot paired with this wide value. Shares the lineage.
    pub(crate) fn continuation(&self) -> Option<Value> {
        self.category
            .continuation()
            .map(|cont| Value { category: cont, known: None, lineage: self.lineage })
    }

    pub fn width(&self) -> usize {
        self.category.width()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.known {
            Some(k) => write!(f, "{}({})", self.category, k),
            None => write!(f, "{}", self.category),
        }
    }
}
