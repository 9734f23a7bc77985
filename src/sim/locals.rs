//! Local-variable slots
//!
//! Fixed-length slot array with the same width invariant as the operand
//! stack: a wide value occupies its index plus the following continuation
//! slot. Overwriting either half of a wide value invalidates the whole
//! value, exactly as the machine's verifier treats locals.

use crate::error::{Error, Result};
use crate::value::{Category, Value};

#[derive(Debug, Clone)]
pub struct LocalsArray {
    slots: Vec<Value>,
}

impl LocalsArray {
    /// `empty` is the placeholder written into uninitialized slots.
    pub fn new(max_locals: usize, empty: Value) -> Self {
        Self { slots: vec![empty; max_locals] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots, including empty and continuation ones.
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Value] {
        &mut self.slots
    }

    pub fn slot(&self, index: usize) -> Result<&Value> {
        self.slots.get(index).ok_or(Error::LocalOutOfRange {
            index,
            max: self.slots.len(),
        })
    }

    /// Typed read of a logical value.
    pub fn load(&self, index: usize, category: Category) -> Result<Value> {
        let value = self.slot(index)?;
        if value.category != category {
            return Err(Error::InvalidLocal {
                index,
                expected: category.to_string(),
                found: value.category.to_string(),
            });
        }
        Ok(value.clone())
    }

    /// Write a logical value at `index`, invalidating any wide value the
    /// write overlaps.
    pub fn store(&mut self, index: usize, value: Value) -> Result<()> {
        let width = value.width();
        if index + width > self.slots.len() {
            return Err(Error::LocalOutOfRange {
                index,
                max: self.slots.len(),
            });
        }
        let empty = |slot: &Value| Value::new(Category::Empty, slot.lineage);

        // A wide value whose continuation sits at `index` loses its lower half.
        if index > 0 && self.slots[index].category.is_continuation() {
            self.slots[index - 1] = empty(&self.slots[index - 1]);
        }
        // A wide value starting at the last written slot loses its continuation.
        let last = index + width - 1;
        if last + 1 < self.slots.len() && self.slots[last + 1].category.is_continuation() {
            self.slots[last + 1] = empty(&self.slots[last + 1]);
        }

        let cont = value.continuation();
        self.slots[index] = value;
        if let Some(cont) = cont {
            self.slots[index + 1] = cont;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::LineageStore;

    fn arr(store: &LineageStore, n: usize) -> LocalsArray {
        LocalsArray::new(n, Value::new(Category::Empty, store.argument()))
    }

    #[test]
    fn wide_store_fills_two_slots() {
        let store = LineageStore::new();
        let mut locals = arr(&store, 3);
        locals.store(0, Value::new(Category::Long, store.origin(0))).unwrap();
        assert_eq!(locals.slot(0).unwrap().category, Category::Long);
        assert_eq!(locals.slot(1).unwrap().category, Category::LongCont);
        assert_eq!(locals.slot(2).unwrap().category, Category::Empty);
    }

    #[test]
    fn overwriting_either_half_invalidates_the_wide_value() {
        let store = LineageStore::new();
        let mut locals = arr(&store, 3);
        locals.store(0, Value::new(Category::Double, store.origin(0))).unwrap();
        locals.store(1, Value::new(Category::Int, store.origin(1))).unwrap();
        assert_eq!(locals.slot(0).unwrap().category, Category::Empty);
        assert_eq!(locals.slot(1).unwrap().category, Category::Int);

        locals.store(1, Value::new(Category::Long, store.origin(2))).unwrap();
        locals.store(2, Value::new(Category::Int, store.origin(3))).unwrap();
        assert_eq!(locals.slot(1).unwrap().category, Category::Empty);
        assert_eq!(locals.slot(2).unwrap().category, Category::Int);
    }

    #[test]
    fn typed_load_checks_category_and_bounds() {
        let store = LineageStore::new();
        let mut locals = arr(&store, 2);
        locals.store(0, Value::new(Category::Int, store.origin(0))).unwrap();
        assert!(locals.load(0, Category::Int).is_ok());
        assert!(matches!(
            locals.load(0, Category::Float),
            Err(Error::InvalidLocal { .. })
        ));
        assert!(matches!(
            locals.load(5, Category::Int),
            Err(Error::LocalOutOfRange { index: 5, max: 2 })
        ));
        assert!(matches!(
            locals.store(1, Value::new(Category::Long, store.origin(1))),
            Err(Error::LocalOutOfRange { .. })
        ));
    }
}
