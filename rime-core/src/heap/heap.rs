use {
    super::{
        Block,
        HeapConfig,
        HeapConfigError,
        Mutator,
        PreAlloc,
        UnsafeRef,
        permanent::PermanentRegion,
        symbol_table::SymbolTable,
    },
    std::{
        collections::{HashMap, HashSet},
        marker::{PhantomData, PhantomPinned},
        num::NonZeroU64,
        ptr::NonNull,
        sync::{
            Condvar,
            Mutex,
            MutexGuard,
            atomic::{AtomicBool, AtomicUsize, Ordering::{Acquire, Relaxed, Release}},
        },
    },
};

/// Brand of a heap; invariant in `'h`.
pub (super) type HeapId<'h> = PhantomData<fn(&'h ()) -> &'h ()>;

/// Garbage-collected heap.
///
/// Each heap has its own brand `'h`, which also serves as its lifetime.
/// References carry the brand, so an object on one heap
/// can never be stored into an object on another heap.
pub struct Heap<'h>
{
    _heap_id: HeapId<'h>,

    // Blocks and mutators store pointers to the heap.
    _pinned: PhantomPinned,

    /// Objects allocated once, when the heap is created.
    pub pre_alloc: PreAlloc<'h>,

    /// Configuration the heap was created with.
    pub config: HeapConfig,

    /// Retired blocks of the collected region.
    ///
    /// Each mutator additionally owns the block it allocates in.
    pub (super) blocks: Mutex<Vec<Block>>,

    /// Blocks that constitute the permanent region.
    pub (super) permanent: Mutex<PermanentRegion>,

    /// Interned symbols, by name.
    pub (super) symbols: Mutex<SymbolTable<'h>>,

    /// Which mutators exist and which of them are in a safe point.
    pub (super) world: Mutex<World<'h>>,

    /// Notified whenever [`world`][`Self::world`] changes.
    pub (super) world_changed: Condvar,

    /// Whether a mutator is waiting to perform a garbage collection cycle.
    ///
    /// This can be read without locking [`world`][`Self::world`],
    /// so that safe points are cheap when no collection is planned.
    pub (super) collection_requested: AtomicBool,

    /// Number of bytes in blocks created since the last collection.
    fresh_bytes: AtomicUsize,

    /// Number of pinned roots per object, for objects that have any.
    ///
    /// Every key is a root of the garbage collector.
    /// Maintained by [`PinnedRoot`][`super::PinnedRoot`].
    pub (super) pinned_roots: Mutex<HashMap<UnsafeRef<'h>, NonZeroU64>>,
}

/// State shared by all mutators of a heap.
pub (super) struct World<'h>
{
    /// Every live mutator of the heap.
    ///
    /// The collector walks their stack roots and allocation blocks.
    /// Maintained by [`Mutator::new`] and [`Mutator::drop`].
    pub mutators: HashSet<NonNull<Mutator<'h>>>,

    /// How many of the mutators are currently in a safe point.
    pub parked: usize,

    /// Whether a garbage collection cycle is in progress.
    ///
    /// While set, no mutator may leave its safe point.
    pub collecting: bool,
}

// SAFETY: The mutator pointers in the world are only
//         dereferenced while their mutators are in a safe point.
unsafe impl<'h> Send for World<'h> { }

impl<'h> Heap<'h>
{
    /// Run `f` on a fresh heap with the default configuration.
    ///
    /// See [`with_config`][`Self::with_config`].
    pub fn with<F, R>(f: F) -> R
        where F: for<'i> FnOnce(&'i Heap<'i>) -> R
    {
        Self::with_config(HeapConfig::default(), f)
            .expect("Default heap configuration should be valid")
    }

    /// Run `f` on a fresh heap with its own brand.
    ///
    /// The heap is dropped when `f` returns or unwinds.
    /// An invalid configuration is reported before any heap is created.
    pub fn with_config<F, R>(config: HeapConfig, f: F)
        -> Result<R, HeapConfigError>
        // NOTE: The higher-ranked bound keeps callers from picking 'h,
        //       so no two heaps share a brand.
        //       Passing a reference keeps f from moving the heap.
        where F: for<'i> FnOnce(&'i Heap<'i>) -> R
    {
        config.validate()?;

        let heap = Heap{
            _heap_id: PhantomData,
            _pinned: PhantomPinned,
            pre_alloc: PreAlloc::dangling(),
            config,
            blocks: Mutex::new(Vec::new()),
            permanent: Mutex::new(PermanentRegion::new()),
            symbols: Mutex::new(SymbolTable::new()),
            world: Mutex::new(World{
                mutators: HashSet::new(),
                parked: 0,
                collecting: false,
            }),
            world_changed: Condvar::new(),
            collection_requested: AtomicBool::new(false),
            fresh_bytes: AtomicUsize::new(0),
            pinned_roots: Mutex::new(HashMap::new()),
        };

        // SAFETY: The heap is not yet visible to anyone.
        unsafe { heap.pre_alloc.init(&heap); }

        Ok(f(&heap))
    }

    /// Add a block to the collected region of the heap.
    pub (super) fn add_block(&self, block: Block)
    {
        log::trace!("Retiring block of {} bytes", block.len());
        let mut blocks = self.blocks.lock().unwrap();
        blocks.push(block);
    }

    /// Account for a freshly created block in the collected region.
    ///
    /// Returns whether an automatic collection is due.
    pub (super) fn account_fresh_block(&self, len: usize) -> bool
    {
        let fresh = self.fresh_bytes.fetch_add(len, Relaxed);
        self.config.automatic_collection
            && fresh.saturating_add(len) >= self.config.collection_threshold
    }

    /// Forget about blocks created before the collection that just finished.
    pub (super) fn reset_fresh_bytes(&self)
    {
        self.fresh_bytes.store(0, Relaxed);
    }

    /// Add a mutator to the world, after any cycle in progress.
    ///
    /// # Safety
    ///
    /// Only for [`Mutator::new`].
    pub (super) unsafe fn register_mutator(
        &'h self,
        mutator: NonNull<Mutator<'h>>,
    )
    {
        let mut world = self.lock_world();
        while world.collecting {
            world = self.world_changed.wait(world).unwrap();
        }
        world.mutators.insert(mutator);
    }

    /// Remove a mutator from the world.
    ///
    /// # Safety
    ///
    /// Only for [`Mutator::drop`].
    pub (super) unsafe fn unregister_mutator(
        &'h self,
        mutator: NonNull<Mutator<'h>>,
    )
    {
        let mut world = self.lock_world();
        world.mutators.take(&mutator).expect("Use-after-drop of mutator");
        drop(world);

        // A collecting mutator may be waiting for this one.
        self.world_changed.notify_all();
    }

    /// Lock the world state.
    pub (super) fn lock_world(&self) -> MutexGuard<'_, World<'h>>
    {
        self.world.lock().unwrap()
    }

    /// Whether a mutator is waiting to collect garbage.
    pub (super) fn is_collection_requested(&self) -> bool
    {
        self.collection_requested.load(Acquire)
    }

    /// Set or clear the collection request flag.
    pub (super) fn set_collection_requested(&self, value: bool)
    {
        self.collection_requested.store(value, Release);
    }

    /// Count one more pinned root for an object.
    ///
    /// # Safety
    ///
    /// Only for [`PinnedRoot`][`super::PinnedRoot`].
    pub (super) unsafe fn retain_pinned_root(&self, object: UnsafeRef<'h>)
    {
        let mut pinned_roots = self.pinned_roots.lock().unwrap();
        match pinned_roots.get_mut(&object) {
            Some(count) =>
                *count = count.checked_add(1)
                    .expect("Pinned root count should not overflow"),
            None => {
                pinned_roots.insert(object, NonZeroU64::MIN);
            },
        }
    }

    /// Count one less pinned root for an object.
    ///
    /// # Safety
    ///
    /// Only for [`PinnedRoot`][`super::PinnedRoot`].
    pub (super) unsafe fn release_pinned_root(&self, object: UnsafeRef<'h>)
    {
        let mut pinned_roots = self.pinned_roots.lock().unwrap();
        let count = pinned_roots.get(&object)
            .expect("Released pinned root should be registered");
        match NonZeroU64::new(count.get() - 1) {
            Some(count) => { pinned_roots.insert(object, count); },
            None        => { pinned_roots.remove(&object); },
        }
    }

    /// The number of pinned roots that reference an object.
    #[cfg(test)]
    pub (super) fn pinned_root_count(&self, object: UnsafeRef<'h>) -> u64
    {
        let pinned_roots = self.pinned_roots.lock().unwrap();
        pinned_roots.get(&object).map_or(0, |n| n.get())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn with_config_rejects_invalid_config()
    {
        let config = HeapConfig{
            collection_threshold: 0,
            automatic_collection: true,
        };
        let result = Heap::with_config(config, |_| ());
        assert_eq!(result, Err(HeapConfigError::ZeroCollectionThreshold));
    }

    #[test]
    fn mutators_are_registered()
    {
        Heap::with(|heap| {
            let mutator_1 = Mutator::new(heap);
            let mutator_2 = Mutator::new(heap);
            assert_eq!(heap.lock_world().mutators.len(), 2);
            drop(mutator_1);
            assert_eq!(heap.lock_world().mutators.len(), 1);
            drop(mutator_2);
            assert_eq!(heap.lock_world().mutators.len(), 0);
        });
    }

    #[test]
    fn dropped_mutator_hands_over_its_block()
    {
        Heap::with(|heap| {
            let before = heap.blocks.lock().unwrap().len();
            drop(Mutator::new(heap));
            let after = heap.blocks.lock().unwrap().len();
            assert_eq!(after, before + 1);
        });
    }
}
