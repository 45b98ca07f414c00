use std::sync::Mutex;

use layers::LayerTree;
use log::trace;

/// Single-slot, latest-value-wins handoff of a completed [`LayerTree`].
///
/// When trees are produced faster than they are consumed only the most
/// temporally relevant one survives; older trees are dropped on arrival
/// instead of queueing. All operations are short critical sections under
/// one mutex — nothing here ever waits for another operation.
pub struct LayerTreeHolder {
    tree: Mutex<Option<LayerTree>>,
}

impl LayerTreeHolder {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(None),
        }
    }

    /// Store `tree` if the holder is empty or the held tree targets a
    /// strictly earlier presentation time; otherwise the incoming tree is
    /// discarded.
    pub fn replace_if_newer(&self, tree: LayerTree) {
        let mut held = self.tree.lock().expect("layer tree holder lock poisoned");
        match held.as_ref() {
            Some(current) if current.target_time() >= tree.target_time() => {
                trace!(
                    "discarding layer tree for frame {}, holder has a newer one",
                    tree.frame_number()
                );
            }
            _ => *held = Some(tree),
        }
    }

    /// Atomically take and clear the held tree.
    pub fn take(&self) -> Option<LayerTree> {
        self.tree
            .lock()
            .expect("layer tree holder lock poisoned")
            .take()
    }

    pub fn is_empty(&self) -> bool {
        self.tree
            .lock()
            .expect("layer tree holder lock poisoned")
            .is_none()
    }
}

impl Default for LayerTreeHolder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::Size;
    use std::time::{Duration, Instant};

    fn tree_targeting(base: Instant, offset_ms: u64, frame_number: u64) -> LayerTree {
        LayerTree::new(
            None,
            Size::new(100.0, 100.0),
            1.0,
            base + Duration::from_millis(offset_ms),
            frame_number,
        )
    }

    #[test]
    fn empty_holder_accepts_any_tree() {
        let holder = LayerTreeHolder::new();
        assert!(holder.is_empty());
        holder.replace_if_newer(tree_targeting(Instant::now(), 0, 1));
        assert!(!holder.is_empty());
        assert_eq!(holder.take().map(|tree| tree.frame_number()), Some(1));
        assert!(holder.is_empty());
    }

    #[test]
    fn older_tree_is_discarded_newer_replaces() {
        let base = Instant::now();
        let holder = LayerTreeHolder::new();
        holder.replace_if_newer(tree_targeting(base, 5, 1));

        // Strictly earlier target: no-op.
        holder.replace_if_newer(tree_targeting(base, 3, 2));
        // Equal target: also a no-op (held tree is not strictly earlier).
        holder.replace_if_newer(tree_targeting(base, 5, 3));
        // Strictly later target: replaces.
        holder.replace_if_newer(tree_targeting(base, 7, 4));

        assert_eq!(holder.take().map(|tree| tree.frame_number()), Some(4));
        assert!(holder.take().is_none());
    }
}
