//! Reference counting for stack items.
//!
//! The counter tracks two kinds of references: items sitting on a stack
//! or in a slot ("stack references") and container-to-child edges. The
//! total feeds the engine's stack-item limit. Shared items (compounds
//! and buffers) are tracked as graph nodes so that cycles which are no
//! longer reachable from any stack can be collected by a mark-sweep pass
//! confined to the compound graph.

use crate::stack_item::StackItem;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct TrackedItem {
    /// A handle keeping the shared interior alive for graph walks.
    handle: Option<StackItem>,
    /// References from stacks and slots.
    stack_refs: usize,
    /// Incoming container edges.
    parent_refs: usize,
}

#[derive(Default)]
struct CounterInner {
    /// Total references: stack references plus container edges, for every
    /// item kind including primitives.
    total: usize,
    /// Graph nodes for shared items, keyed by identity id.
    tracked: HashMap<usize, TrackedItem>,
    /// Shared items whose reference counts dropped to zero.
    zero_referred: HashSet<usize>,
}

/// Counts references to stack items and collects unreachable cycles.
#[derive(Clone, Default)]
pub struct ReferenceCounter {
    inner: Arc<Mutex<CounterInner>>,
}

impl ReferenceCounter {
    /// Creates a counter with no references.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current total reference count.
    pub fn count(&self) -> usize {
        self.inner.lock().total
    }

    /// Records an item landing on a stack or in a slot.
    pub fn add_stack_reference(&self, item: &StackItem) {
        let mut inner = self.inner.lock();
        inner.total += 1;
        if let Some(id) = item.identity() {
            let tracked = inner.tracked.entry(id).or_default();
            if tracked.handle.is_none() {
                tracked.handle = Some(item.clone());
            }
            tracked.stack_refs += 1;
            inner.zero_referred.remove(&id);
        }
    }

    /// Records an item leaving a stack or slot.
    pub fn remove_stack_reference(&self, item: &StackItem) {
        let mut inner = self.inner.lock();
        inner.total = inner.total.saturating_sub(1);
        if let Some(id) = item.identity() {
            if let Some(tracked) = inner.tracked.get_mut(&id) {
                tracked.stack_refs = tracked.stack_refs.saturating_sub(1);
                if tracked.stack_refs == 0 && tracked.parent_refs == 0 {
                    inner.zero_referred.insert(id);
                }
            }
        }
    }

    /// Records `child` being placed into a container.
    pub fn add_reference(&self, child: &StackItem) {
        let mut inner = self.inner.lock();
        inner.total += 1;
        if let Some(id) = child.identity() {
            let tracked = inner.tracked.entry(id).or_default();
            if tracked.handle.is_none() {
                tracked.handle = Some(child.clone());
            }
            tracked.parent_refs += 1;
            inner.zero_referred.remove(&id);
        }
    }

    /// Records `child` being removed from a container.
    pub fn remove_reference(&self, child: &StackItem) {
        let mut inner = self.inner.lock();
        inner.total = inner.total.saturating_sub(1);
        if let Some(id) = child.identity() {
            if let Some(tracked) = inner.tracked.get_mut(&id) {
                tracked.parent_refs = tracked.parent_refs.saturating_sub(1);
                if tracked.stack_refs == 0 && tracked.parent_refs == 0 {
                    inner.zero_referred.insert(id);
                }
            }
        }
    }

    /// Collects shared items unreachable from any stack and returns the
    /// adjusted total.
    ///
    /// Mark phase: every tracked node with live stack references roots a
    /// walk over container children. Sweep phase: unmarked nodes are
    /// dropped and each of their outgoing edges (including edges closing
    /// a cycle) is subtracted from the total.
    pub fn check_zero_referred(&self) -> usize {
        let mut inner = self.inner.lock();
        if inner.zero_referred.is_empty() {
            return inner.total;
        }
        inner.zero_referred.clear();

        // Mark.
        let mut reachable: HashSet<usize> = HashSet::new();
        let mut work: Vec<StackItem> = inner
            .tracked
            .values()
            .filter(|t| t.stack_refs > 0)
            .filter_map(|t| t.handle.clone())
            .collect();
        while let Some(item) = work.pop() {
            if let Some(id) = item.identity() {
                if !reachable.insert(id) {
                    continue;
                }
            }
            for child in item.children() {
                if child.identity().is_some() {
                    work.push(child);
                }
            }
        }

        // Sweep.
        let dead: Vec<usize> = inner
            .tracked
            .keys()
            .filter(|id| !reachable.contains(id))
            .copied()
            .collect();
        for id in dead {
            if let Some(tracked) = inner.tracked.remove(&id) {
                if let Some(handle) = tracked.handle {
                    // Every outgoing edge of a dead container disappears
                    // with it.
                    let edges = handle.children().len();
                    inner.total = inner.total.saturating_sub(edges);
                }
            }
        }

        inner.total
    }

    /// Drops every reference; used when an engine is torn down.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.total = 0;
        inner.tracked.clear();
        inner.zero_referred.clear();
    }
}

impl std::fmt::Debug for ReferenceCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCounter")
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_reference_counting() {
        let rc = ReferenceCounter::new();
        let item = StackItem::from_int(1);
        rc.add_stack_reference(&item);
        rc.add_stack_reference(&item);
        assert_eq!(rc.count(), 2);
        rc.remove_stack_reference(&item);
        assert_eq!(rc.count(), 1);
    }

    #[test]
    fn test_container_edges_counted() {
        let rc = ReferenceCounter::new();
        let array = StackItem::from_array(vec![]);
        rc.add_stack_reference(&array);
        let child = StackItem::from_int(7);
        rc.add_reference(&child);
        assert_eq!(rc.count(), 2);
        rc.remove_reference(&child);
        assert_eq!(rc.count(), 1);
    }

    #[test]
    fn test_unreachable_compound_swept() {
        let rc = ReferenceCounter::new();
        let array = StackItem::from_array(vec![]);
        rc.add_stack_reference(&array);
        let child = StackItem::from_int(7);
        if let StackItem::Array(items) = &array {
            items.with_mut(|v| v.push(child.clone()));
        }
        rc.add_reference(&child);
        assert_eq!(rc.count(), 2);

        // The array leaves the stack; its child edge goes with it.
        rc.remove_stack_reference(&array);
        assert_eq!(rc.check_zero_referred(), 0);
    }

    #[test]
    fn test_cycle_collected() {
        let rc = ReferenceCounter::new();
        let a = StackItem::from_array(vec![]);
        let b = StackItem::from_array(vec![]);
        // a -> b and b -> a.
        if let (StackItem::Array(xa), StackItem::Array(xb)) = (&a, &b) {
            xa.with_mut(|v| v.push(b.clone()));
            xb.with_mut(|v| v.push(a.clone()));
        }
        rc.add_stack_reference(&a);
        rc.add_stack_reference(&b);
        rc.add_reference(&b); // edge a -> b
        rc.add_reference(&a); // edge b -> a
        assert_eq!(rc.count(), 4);

        rc.remove_stack_reference(&a);
        rc.remove_stack_reference(&b);
        // Both nodes hold each other, but neither is stack-reachable.
        assert_eq!(rc.check_zero_referred(), 0);
    }

    #[test]
    fn test_reachable_cycle_survives() {
        let rc = ReferenceCounter::new();
        let a = StackItem::from_array(vec![]);
        let b = StackItem::from_array(vec![]);
        if let (StackItem::Array(xa), StackItem::Array(xb)) = (&a, &b) {
            xa.with_mut(|v| v.push(b.clone()));
            xb.with_mut(|v| v.push(a.clone()));
        }
        rc.add_stack_reference(&a);
        rc.add_stack_reference(&b);
        rc.add_reference(&b);
        rc.add_reference(&a);

        rc.remove_stack_reference(&b);
        // a is still on the stack, so the whole cycle stays.
        assert_eq!(rc.check_zero_referred(), 3);
    }
}
