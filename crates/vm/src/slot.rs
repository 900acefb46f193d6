//! Variable slots for static fields, locals and arguments.

use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;
use crate::{VmError, VmResult};

/// A fixed-size slot of stack items wired into the reference counter.
#[derive(Debug)]
pub struct Slot {
    items: Vec<StackItem>,
    reference_counter: ReferenceCounter,
}

impl Slot {
    /// Creates a slot of `count` nulls.
    pub fn new(count: usize, reference_counter: ReferenceCounter) -> Self {
        let items = vec![StackItem::Null; count];
        for item in &items {
            reference_counter.add_stack_reference(item);
        }
        Self {
            items,
            reference_counter,
        }
    }

    /// Creates a slot seeded with `items` (used for arguments).
    pub fn with_items(items: Vec<StackItem>, reference_counter: ReferenceCounter) -> Self {
        for item in &items {
            reference_counter.add_stack_reference(item);
        }
        Self {
            items,
            reference_counter,
        }
    }

    /// The slot size.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns whether the slot has no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A clone of the item at `index`.
    pub fn get(&self, index: usize) -> VmResult<StackItem> {
        self.items
            .get(index)
            .cloned()
            .ok_or_else(|| VmError::invalid_operation(format!("slot index {index} out of range")))
    }

    /// Replaces the item at `index`.
    pub fn set(&mut self, index: usize, item: StackItem) -> VmResult<()> {
        let target = self
            .items
            .get_mut(index)
            .ok_or_else(|| VmError::invalid_operation(format!("slot index {index} out of range")))?;
        self.reference_counter.add_stack_reference(&item);
        let old = std::mem::replace(target, item);
        self.reference_counter.remove_stack_reference(&old);
        Ok(())
    }

    /// Releases every reference held by the slot.
    pub fn clear_references(&mut self) {
        for item in self.items.drain(..) {
            self.reference_counter.remove_stack_reference(&item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_new_slot_is_null_filled() {
        let slot = Slot::new(3, ReferenceCounter::new());
        assert_eq!(slot.len(), 3);
        assert!(slot.get(0).unwrap().is_null());
        assert!(slot.get(3).is_err());
    }

    #[test]
    fn test_set_get() {
        let rc = ReferenceCounter::new();
        let mut slot = Slot::new(2, rc.clone());
        slot.set(1, StackItem::from_int(7)).unwrap();
        assert_eq!(slot.get(1).unwrap().get_integer().unwrap(), BigInt::from(7));
        // Two slots worth of references, regardless of overwrites.
        assert_eq!(rc.count(), 2);
    }

    #[test]
    fn test_clear_references() {
        let rc = ReferenceCounter::new();
        let mut slot = Slot::with_items(vec![StackItem::from_int(1)], rc.clone());
        assert_eq!(rc.count(), 1);
        slot.clear_references();
        assert_eq!(rc.count(), 0);
        assert!(slot.is_empty());
    }
}
