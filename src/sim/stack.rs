//! Width-aware operand stack
//!
//! Physical slots are `Value`s; a wide value is always immediately followed
//! by its continuation slot, and every public pop/push works on logical
//! units so a caller can never split a long or double in half.

use crate::error::{Error, Result};
use crate::value::{Category, Value};

#[derive(Debug, Clone)]
pub struct OperandStack {
    slots: Vec<Value>,
    max: usize,
}

impl OperandStack {
    pub fn new(max: usize) -> Self {
        Self { slots: Vec::new(), max }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Physical slots, bottom first.
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Value] {
        &mut self.slots
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Push one logical value; a wide value's continuation slot goes with it.
    pub fn push(&mut self, value: Value) -> Result<()> {
        if value.category.is_continuation() || value.category == Category::Empty {
            return Err(Error::TypeMismatch {
                expected: "a pushable value".into(),
                found: value.category.to_string(),
            });
        }
        if self.slots.len() + value.width() > self.max {
            return Err(Error::StackOverflow { max: self.max });
        }
        let cont = value.continuation();
        self.slots.push(value);
        if let Some(cont) = cont {
            self.slots.push(cont);
        }
        Ok(())
    }

    fn top(&self) -> Result<&Value> {
        self.slots.last().ok_or(Error::StackUnderflow)
    }

    /// Pop one logical value of exactly this category.
    pub fn pop(&mut self, category: Category) -> Result<Value> {
        match category.continuation() {
            None => {
                let found = self.top()?.category;
                if found != category {
                    return Err(Error::TypeMismatch {
                        expected: category.to_string(),
                        found: found.to_string(),
                    });
                }
                Ok(self.slots.pop().ok_or(Error::StackUnderflow)?)
            }
            Some(cont) => {
                let found = self.top()?.category;
                if found != cont {
                    return Err(Error::TypeMismatch {
                        expected: cont.to_string(),
                        found: found.to_string(),
                    });
                }
                self.slots.pop();
                let value = self.slots.pop().ok_or(Error::StackUnderflow)?;
                if value.category != category {
                    return Err(Error::TypeMismatch {
                        expected: category.to_string(),
                        found: value.category.to_string(),
                    });
                }
                Ok(value)
            }
        }
    }

    /// Pop any one-slot value.
    pub fn pop_any1(&mut self) -> Result<Value> {
        let found = self.top()?.category;
        if found.is_continuation() {
            return Err(Error::TypeMismatch {
                expected: "a one-slot value".into(),
                found: found.to_string(),
            });
        }
        Ok(self.slots.pop().ok_or(Error::StackUnderflow)?)
    }

    /// Pop two physical slots as logical values, topmost first: either one
    /// wide value, or two one-slot values.
    pub fn pop_any2(&mut self) -> Result<Vec<Value>> {
        let top = self.top()?.category;
        if top.is_continuation() {
            let wide = match top {
                Category::LongCont => Category::Long,
                _ => Category::Double,
            };
            Ok(vec![self.pop(wide)?])
        } else {
            let first = self.pop_any1()?;
            let second = self.pop_any1()?;
            Ok(vec![first, second])
        }
    }

    /// Pop a reference or a return address (the `astore` wildcard).
    pub fn pop_ref_or_ret(&mut self) -> Result<Value> {
        let found = self.top()?.category;
        if found != Category::Reference && found != Category::ReturnAddress {
            return Err(Error::TypeMismatch {
                expected: "reference or return_address".into(),
                found: found.to_string(),
            });
        }
        Ok(self.slots.pop().ok_or(Error::StackUnderflow)?)
    }

    /// Physical index of the logical value at depth `d` below the top,
    /// where continuation slots never count as a depth step.
    fn logical_index(&self, depth: usize) -> Result<usize> {
        let mut remaining = depth;
        let mut i = self.slots.len();
        while i > 0 {
            i -= 1;
            if self.slots[i].category.is_continuation() {
                continue;
            }
            if remaining == 0 {
                return Ok(i);
            }
            remaining -= 1;
        }
        Err(Error::StackUnderflow)
    }

    /// Logical value at depth `d` below the top (0 is the top).
    pub fn peek_logical(&self, depth: usize) -> Result<&Value> {
        Ok(&self.slots[self.logical_index(depth)?])
    }

    /// Replace the known literal of the logical value at depth `d`; lineage
    /// is untouched.
    pub fn set_known_at(&mut self, depth: usize, known: impl Into<String>) -> Result<()> {
        let i = self.logical_index(depth)?;
        self.slots[i] = self.slots[i].with_known(known);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::LineageStore;

    fn val(store: &LineageStore, category: Category) -> Value {
        Value::new(category, store.origin(0))
    }

    #[test]
    fn wide_push_adds_continuation() {
        let store = LineageStore::new();
        let mut stack = OperandStack::new(4);
        stack.push(val(&store, Category::Long)).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.slots()[1].category, Category::LongCont);
        let popped = stack.pop(Category::Long).unwrap();
        assert_eq!(popped.category, Category::Long);
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_any1_rejects_continuation_slot() {
        let store = LineageStore::new();
        let mut stack = OperandStack::new(4);
        stack.push(val(&store, Category::Double)).unwrap();
        assert!(matches!(stack.pop_any1(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn pop_any2_returns_pair_topmost_first() {
        let store = LineageStore::new();
        let mut stack = OperandStack::new(4);
        stack.push(val(&store, Category::Int)).unwrap();
        stack.push(val(&store, Category::Float)).unwrap();
        let popped = stack.pop_any2().unwrap();
        assert_eq!(popped[0].category, Category::Float);
        assert_eq!(popped[1].category, Category::Int);
    }

    #[test]
    fn overflow_and_underflow_fail() {
        let store = LineageStore::new();
        let mut stack = OperandStack::new(1);
        assert!(matches!(
            stack.push(val(&store, Category::Long)),
            Err(Error::StackOverflow { max: 1 })
        ));
        assert!(matches!(stack.pop(Category::Int), Err(Error::StackUnderflow)));
    }

    #[test]
    fn set_known_skips_continuations() {
        let store = LineageStore::new();
        let mut stack = OperandStack::new(4);
        stack.push(val(&store, Category::Long)).unwrap();
        stack.push(val(&store, Category::Int)).unwrap();
        // Depth 1 is the long, not its continuation slot.
        stack.set_known_at(1, "7").unwrap();
        assert_eq!(stack.peek_logical(1).unwrap().known.as_deref(), Some("7"));
        assert_eq!(stack.peek_logical(0).unwrap().known, None);
    }
}
