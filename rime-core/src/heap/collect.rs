//! Tracing garbage collection.
//!
//! The collector is a precise, non-moving mark-sweep collector.
//! It runs on the thread of the mutator that requested it,
//! while every other mutator is parked in a safe point.
//!
//! Marking starts from the stack roots of every mutator
//! and from the pinned roots, and follows references
//! according to the [kind][`super::Kind`] of each object.
//! Permanent objects are neither marked nor traced,
//! as they only reference other permanent objects.
//!
//! Sweeping walks every block of the collected region.
//! Blocks without live objects are freed as a whole.
//! Dead objects in blocks that are still in use are cleared,
//! but their memory is not reused.

use {
    super::{Block, Heap, ObjectHeader, UnsafeRef, heap::World},
    smallvec::SmallVec,
};

/// Statistics about a garbage collection cycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CollectionStats
{
    /// Number of objects found reachable from roots.
    pub live_objects: usize,

    /// Number of objects that died since the previous cycle.
    pub dead_objects: usize,

    /// Number of blocks that were freed.
    pub freed_blocks: usize,
}

impl<'h> Heap<'h>
{
    /// Perform a garbage collection cycle.
    ///
    /// # Safety
    ///
    /// Every mutator in `world`, except the calling one,
    /// must be in a safe point for the duration of the call.
    /// The calling mutator must not be allocating.
    pub (super) unsafe fn collect(&self, world: &World<'h>) -> CollectionStats
    {
        let mut gray: SmallVec<[UnsafeRef<'h>; 64]> = SmallVec::new();

        // Gather roots.
        for &mutator in world.mutators.iter() {
            (*mutator.as_ptr()).for_each_stack_root(|object| gray.push(object));
        }
        let pinned_roots = self.pinned_roots.lock().unwrap();
        gray.extend(pinned_roots.keys().copied());
        drop(pinned_roots);

        log::debug!(
            "Collecting garbage with {} mutators and {} roots",
            world.mutators.len(),
            gray.len(),
        );

        // Mark.
        while let Some(object) = gray.pop() {
            if object.is_permanent() {
                continue;
            }
            let header = object.as_ptr().cast::<ObjectHeader>();
            if (*header.as_ptr()).marked.replace(true) {
                continue;
            }
            ObjectHeader::for_each_reference(header, |r| gray.push(r));
        }

        // Sweep.
        let mut stats = CollectionStats::default();

        let mut blocks = self.blocks.lock().unwrap();
        let before = blocks.len();
        blocks.retain(|block| sweep_block(block, &mut stats) != 0);
        stats.freed_blocks = before - blocks.len();
        drop(blocks);

        // Allocation blocks are still in use, so never freed.
        for &mutator in world.mutators.iter() {
            sweep_block((*mutator.as_ptr()).allocation_block(), &mut stats);
        }

        log::debug!(
            "Collected garbage: {} live objects, {} dead objects, {} freed blocks",
            stats.live_objects,
            stats.dead_objects,
            stats.freed_blocks,
        );

        stats
    }
}

/// Clear marks, clear dead objects, and count live objects.
///
/// # Safety
///
/// No mutator may be using the block.
unsafe fn sweep_block(block: &Block, stats: &mut CollectionStats) -> usize
{
    let mut live = 0;
    block.for_each_object(|object| {
        let header = &*object.as_ptr();
        if header.marked.replace(false) {
            live += 1;
        } else if !header.dead.replace(true) {
            ObjectHeader::clear_references(object);
            stats.dead_objects += 1;
        }
    });
    stats.live_objects += live;
    live
}

#[cfg(test)]
mod tests
{
    use {
        super::*,
        crate::heap::{BorrowRef, HeapConfig, Mutator, SimpleVector},
    };

    /// Heap configuration that never collects automatically.
    fn manual() -> HeapConfig
    {
        HeapConfig{automatic_collection: false, ..HeapConfig::default()}
    }

    #[test]
    fn unrooted_objects_die()
    {
        Heap::with_config(manual(), |heap| {
            let mutator = Mutator::new(heap);
            let symbol = heap.intern("x");
            mutator.with_stack_roots(|[kept, scratch]: &[_; 2]| {
                SimpleVector::new_filled(&mutator, kept, 2, symbol);
                SimpleVector::new_filled(&mutator, scratch, 2, symbol);
                scratch.set(symbol);

                let stats = mutator.collect_garbage();
                assert_eq!(stats.live_objects, 1);
                assert_eq!(stats.dead_objects, 1);

                // Dead objects are only reported once.
                let stats = mutator.collect_garbage();
                assert_eq!(stats.live_objects, 1);
                assert_eq!(stats.dead_objects, 0);
            });
        }).unwrap();
    }

    #[test]
    fn objects_reachable_through_vectors_live()
    {
        Heap::with_config(manual(), |heap| {
            let mutator = Mutator::new(heap);
            mutator.with_stack_roots(|[outer, inner]: &[_; 2]| {
                SimpleVector::new_zeroed(&mutator, inner, 1);
                SimpleVector::new_filled(&mutator, outer, 3, inner);
                inner.set(heap.pre_alloc.empty_simple_vector());

                let stats = mutator.collect_garbage();
                assert_eq!(stats.live_objects, 2);
                assert_eq!(stats.dead_objects, 0);
            });
        }).unwrap();
    }

    #[test]
    fn pinned_roots_keep_objects_live()
    {
        Heap::with_config(manual(), |heap| {
            let mutator = Mutator::new(heap);
            let pinned = mutator.with_stack_roots(|[root]: &[_; 1]| {
                SimpleVector::new_zeroed(&mutator, root, 4);
                root.pin()
            });

            let stats = mutator.collect_garbage();
            assert_eq!(stats.live_objects, 1);
            assert_eq!(SimpleVector::of(&pinned).unwrap().len(), 4);

            drop(pinned);
            let stats = mutator.collect_garbage();
            assert_eq!(stats.live_objects, 0);
            assert_eq!(stats.dead_objects, 1);
        }).unwrap();
    }

    #[test]
    fn blocks_without_live_objects_are_freed()
    {
        Heap::with_config(manual(), |heap| {
            let mutator = Mutator::new(heap);
            mutator.with_stack_roots(|[scratch]: &[_; 1]| {
                for _ in 0 .. 500 {
                    SimpleVector::new_zeroed(&mutator, scratch, 16);
                }
                scratch.set(heap.pre_alloc.empty_simple_vector());
            });

            let retired = heap.blocks.lock().unwrap().len();
            assert!(retired > 0);

            let stats = mutator.collect_garbage();
            assert_eq!(stats.freed_blocks, retired);
            assert_eq!(stats.live_objects, 0);
            assert!(heap.blocks.lock().unwrap().is_empty());
        }).unwrap();
    }

    #[test]
    fn permanent_objects_are_never_collected()
    {
        Heap::with_config(manual(), |heap| {
            let mutator = Mutator::new(heap);
            let vector = heap.new_permanent_symbols(&["A", "B"]);
            let stats = mutator.collect_garbage();
            assert_eq!(stats, CollectionStats::default());
            let vector = SimpleVector::of(&vector).unwrap();
            assert_eq!(vector.get(1), Ok(heap.intern("B").borrow_ref()));
        }).unwrap();
    }
}
