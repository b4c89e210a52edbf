pub use self::roots::*;

use {
    super::{
        BLOCK_ALIGN,
        DEFAULT_BLOCK_SIZE,
        Block,
        BorrowRef,
        CollectionStats,
        Heap,
        Region,
        UnsafeRef,
    },
    scope_exit::scope_exit,
    smallvec::SmallVec,
    std::{
        cell::{RefCell, UnsafeCell},
        marker::PhantomPinned,
        mem::{ManuallyDrop, replace},
        pin::Pin,
        ptr::NonNull,
    },
};

mod roots;

/// Per-thread allocation context of a heap.
///
/// A mutator is the capability to allocate objects and to hold stack roots.
/// It keeps a private block to bump-allocate in, so that the common case
/// takes no locks; it only talks to the heap when that block runs out
/// and at [safe points] while a collection is pending.
///
/// Every allocation is a safe point.
/// Create at most one mutator per thread, or the garbage collector
/// will wait forever for the idle one to reach a safe point.
///
/// [safe points]: `Self::safe_point`
pub struct Mutator<'h>
{
    /// Heap the mutator allocates on.
    pub heap: &'h Heap<'h>,

    // The heap stores a pointer to the mutator.
    _pinned: PhantomPinned,

    /// Block that small objects are bump-allocated in.
    allocator: ManuallyDrop<UnsafeCell<Block>>,

    /// Stack of live root batches, innermost last.
    ///
    /// Pushed and popped by [`with_stack_roots`][`Self::with_stack_roots`].
    stack_root_batches: RefCell<SmallVec<[*const [StackRoot<'h>]; 8]>>,
}

impl<'h> Mutator<'h>
{
    /// Register a new mutator with a heap.
    ///
    /// This allocates a block, so keep the mutator around
    /// rather than creating one per operation.
    /// Blocks while a garbage collection cycle is in progress.
    pub fn new(heap: &'h Heap<'h>) -> Pin<Box<Self>>
    {
        let mutator = Box::pin(Self{
            heap,
            _pinned: PhantomPinned,
            allocator: ManuallyDrop::new(UnsafeCell::new(
                Block::new(heap, Region::Collected),
            )),
            stack_root_batches: RefCell::new(SmallVec::new()),
        });

        // SAFETY: Paired with the unregister in Drop.
        unsafe { heap.register_mutator(NonNull::from(&*mutator)); }

        mutator
    }

    /// Let a pending garbage collection cycle run.
    ///
    /// Returns right away when no cycle is pending.
    /// Otherwise parks the mutator and blocks until the cycle is over,
    /// so that the collector sees a stopped world.
    pub fn safe_point(&self)
    {
        if self.heap.is_collection_requested() {
            // SAFETY: The function touches nothing.
            unsafe { self.safe_point_with(|| ()); }
        }
    }

    /// Park the mutator while running `f`.
    ///
    /// A collection cycle may run concurrently with `f`.
    /// Once `f` returns, this blocks until such a cycle is over.
    /// Use this around blocking calls, so that
    /// other threads can collect garbage in the meantime.
    ///
    /// # Safety
    ///
    /// `f` must not allocate, nor access objects or roots of this mutator.
    pub unsafe fn safe_point_with<F, R>(&self, f: F) -> R
        where F: FnOnce() -> R
    {
        let mut world = self.heap.lock_world();
        world.parked += 1;
        drop(world);
        self.heap.world_changed.notify_all();
        log::trace!("Mutator {:p} parked", self);

        // Unpark once no cycle is in progress, even if f panics.
        scope_exit! {
            let mut world = self.heap.lock_world();
            while world.collecting {
                world = self.heap.world_changed.wait(world).unwrap();
            }
            world.parked -= 1;
            log::trace!("Mutator {:p} unparked", self);
        }

        f()
    }

    /// Stop the world and collect garbage.
    ///
    /// Waits until every other mutator is parked.
    /// If a cycle started by another mutator is already under way,
    /// this parks until that one finishes, then runs its own.
    pub fn collect_garbage(&self) -> CollectionStats
    {
        let mut world = self.heap.lock_world();

        while world.collecting {
            world.parked += 1;
            self.heap.world_changed.notify_all();
            while world.collecting {
                world = self.heap.world_changed.wait(world).unwrap();
            }
            world.parked -= 1;
        }

        world.collecting = true;
        self.heap.set_collection_requested(true);
        while world.parked + 1 < world.mutators.len() {
            world = self.heap.world_changed.wait(world).unwrap();
        }

        // SAFETY: The others are parked, and this one is not allocating.
        let stats = unsafe { self.heap.collect(&world) };

        world.collecting = false;
        self.heap.set_collection_requested(false);
        self.heap.reset_fresh_bytes();
        drop(world);
        self.heap.world_changed.notify_all();

        stats
    }

    /// Obtain zeroed memory for a new object of `size` bytes.
    ///
    /// This is a safe point, and may collect garbage first.
    /// No safe point occurs after the memory is obtained.
    ///
    /// # Safety
    ///
    /// An object must be written to the memory before the next safe point.
    pub unsafe fn alloc(&self, size: usize) -> NonNull<()>
    {
        self.safe_point();

        if size > DEFAULT_BLOCK_SIZE {
            self.alloc_in_own_block(size)
        } else if let Some(ptr) = (*self.allocator.get()).try_alloc(size) {
            ptr
        } else {
            self.alloc_in_fresh_block(size)
        }
    }

    /// Give an oversized object a block of its own.
    #[inline(never)]
    unsafe fn alloc_in_own_block(&self, size: usize) -> NonNull<()>
    {
        self.before_fresh_block(size);
        log::debug!("Allocating large object of {} bytes", size);
        let mut block = Block::with_capacity(self.heap, Region::Collected, size);
        let ptr = block.try_alloc(size).expect("Fresh block should fit object");
        self.heap.add_block(block);
        ptr
    }

    /// Retire the allocation block and continue in a fresh one.
    #[inline(never)]
    unsafe fn alloc_in_fresh_block(&self, size: usize) -> NonNull<()>
    {
        self.before_fresh_block(BLOCK_ALIGN);
        let mut fresh = Block::new(self.heap, Region::Collected);
        let ptr = fresh.try_alloc(size).expect("Fresh block should fit object");
        let retired = replace(&mut *self.allocator.get(), fresh);
        self.heap.add_block(retired);
        ptr
    }

    /// Collect garbage if enough fresh blocks were created since last time.
    ///
    /// Called just before creating a block of about `len` bytes.
    fn before_fresh_block(&self, len: usize)
    {
        if self.heap.account_fresh_block(len) {
            self.collect_garbage();
        }
    }

    /// Run `f` with a batch of `N` fresh stack roots.
    ///
    /// Stack roots are cheaper than [pinned roots]:
    /// the batch lives in this stack frame and is registered
    /// with a single push onto a stack of batches,
    /// which is popped when `f` returns or unwinds.
    /// The price is that the roots cannot escape `f`.
    ///
    /// Each root initially references the
    /// [empty simple vector][`super::PreAlloc::empty_simple_vector`].
    /// `f` may [`set`] the roots at will.
    ///
    /// [pinned roots]: `super::PinnedRoot`
    /// [`set`]: `StackRoot::set`
    pub fn with_stack_roots<const N: usize, F, R>(&self, f: F) -> R
        where F: FnOnce(&[StackRoot<'h>; N]) -> R
    {
        let empty = self.heap.pre_alloc.empty_simple_vector().borrow_ref();
        // SAFETY: The batch is registered before f can use it.
        let batch: [StackRoot<'h>; N] =
            [(); N].map(|()| unsafe { StackRoot::new(empty) });

        self.stack_root_batches.borrow_mut().push(&batch as &[StackRoot<'h>]);
        scope_exit! {
            let popped = self.stack_root_batches.borrow_mut().pop();
            debug_assert!(popped.is_some(), "Stack root batches out of balance");
        }

        f(&batch)
    }

    /// Run `f` with a root to `object` that cannot be reassigned.
    ///
    /// Such a root is a [`PinnedRef`][`super::PinnedRef`],
    /// so the contents of the object can be borrowed through it,
    /// for example with [`SimpleVector::of`][`super::SimpleVector::of`].
    pub fn with_pinned_stack_root<F, R>(&self, object: impl BorrowRef<'h>, f: F)
        -> R
        where F: FnOnce(&PinnedStackRoot<'h>) -> R
    {
        self.with_stack_roots(|[root]: &[StackRoot<'h>; 1]| {
            root.set(object);
            // SAFETY: Nothing else can reassign root.
            let pinned = unsafe { PinnedStackRoot::new(root.borrow_ref()) };
            f(&pinned)
        })
    }

    /// Call `f` with the object of every stack root.
    ///
    /// # Safety
    ///
    /// The mutator must be parked, or be the calling mutator.
    pub (super) unsafe fn for_each_stack_root<F>(&self, mut f: F)
        where F: FnMut(UnsafeRef<'h>)
    {
        for &batch in self.stack_root_batches.borrow().iter() {
            (*batch).iter().for_each(|root| f(root.borrow_ref()));
        }
    }

    /// The block small objects are currently allocated in.
    ///
    /// # Safety
    ///
    /// The mutator must be parked, or be the calling mutator
    /// outside of [`alloc`][`Self::alloc`].
    pub (super) unsafe fn allocation_block(&self) -> &Block
    {
        &*self.allocator.get()
    }
}

impl<'h> Drop for Mutator<'h>
{
    fn drop(&mut self)
    {
        // The objects in the allocation block may still be reachable.
        // SAFETY: The allocator is not used after this.
        let allocator = unsafe { ManuallyDrop::take(&mut self.allocator) };
        self.heap.add_block(allocator.into_inner());

        // SAFETY: Paired with the register in new.
        unsafe { self.heap.unregister_mutator(NonNull::from(&*self)); }
    }
}
