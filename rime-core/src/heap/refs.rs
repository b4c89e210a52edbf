use {
    super::{Heap, HeapId, Region, block_header_at},
    std::{fmt, marker::PhantomData, ptr::NonNull},
};

/* -------------------------------------------------------------------------- */
/*                                  BorrowRef                                 */
/* -------------------------------------------------------------------------- */

/// Reference types that are known not to dangle.
///
/// Safe code uses this trait to get at the [`UnsafeRef`]
/// behind a root or a permanent reference.
///
/// # Safety
///
/// [`borrow_ref`][`Self::borrow_ref`] must return a reference to a live object.
/// Implementations must not change the behavior of the provided methods.
pub unsafe trait BorrowRef<'h>
{
    /// The reference, which is to a live object.
    fn borrow_ref(&self) -> UnsafeRef<'h>;

    /// The heap that owns the object.
    fn heap(&self) -> &'h Heap<'h>
    {
        // SAFETY: The object is live.
        unsafe { self.borrow_ref().heap() }
    }

    /// Root the object in a [`PinnedRoot`].
    fn pin(&self) -> PinnedRoot<'h>
    {
        // SAFETY: The object is live.
        unsafe { PinnedRoot::new(self.borrow_ref()) }
    }
}

// SAFETY: Delegates to R.
unsafe impl<'h, R> BorrowRef<'h> for &R
    where R: BorrowRef<'h> + ?Sized
{
    fn borrow_ref(&self) -> UnsafeRef<'h>
    {
        R::borrow_ref(self)
    }
}

/* -------------------------------------------------------------------------- */
/*                                  PinnedRef                                 */
/* -------------------------------------------------------------------------- */

/// Reference types whose object cannot change or die while borrowed.
///
/// This is what makes it sound to hand out `&` references into objects,
/// as [`SimpleVector::of`][`super::SimpleVector::of`] does.
///
/// # Safety
///
/// Besides upholding the contract of [`BorrowRef`],
/// [`borrow_ref`][`BorrowRef::borrow_ref`] must keep returning
/// the same reference while `self` is borrowed,
/// and the garbage collector must keep that object live meanwhile.
pub unsafe trait PinnedRef<'h>: BorrowRef<'h>
{
}

// SAFETY: Delegates to R.
unsafe impl<'h, R> PinnedRef<'h> for &R
    where R: PinnedRef<'h> + ?Sized
{
}

/* -------------------------------------------------------------------------- */
/*                                  UnsafeRef                                 */
/* -------------------------------------------------------------------------- */

/// Untracked reference to an object on the heap branded `'h`.
///
/// Nothing keeps the object alive; after a safe point the reference
/// may dangle unless the object is rooted or permanent.
///
/// The reference is non-null, so `Option<UnsafeRef>` is a single word
/// and [`None`] is all zero bits. Slots of [simple vectors] rely on this:
/// a zeroed slot is an unassigned slot.
///
/// Comparisons are by object identity.
///
/// [simple vectors]: `super::SimpleVector`
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct UnsafeRef<'h>
{
    heap_id: HeapId<'h>,
    address: NonNull<()>,
}

// SAFETY: Dereferencing requires unsafe code anyway.
unsafe impl<'h> Send for UnsafeRef<'h> { }
unsafe impl<'h> Sync for UnsafeRef<'h> { }

impl<'h> UnsafeRef<'h>
{
    /// Wrap the address of an object.
    pub fn new(address: NonNull<()>) -> Self
    {
        Self{heap_id: PhantomData, address}
    }

    /// The address of the object.
    pub fn as_ptr(self) -> NonNull<()>
    {
        self.address
    }

    /// The heap that owns the object.
    ///
    /// # Safety
    ///
    /// The object must be live.
    pub unsafe fn heap(self) -> &'h Heap<'h>
    {
        (*block_header_at(self)).heap()
    }

    /// Whether the object is in the permanent region.
    ///
    /// # Safety
    ///
    /// The object must be live.
    pub unsafe fn is_permanent(self) -> bool
    {
        (*block_header_at(self)).region == Region::Permanent
    }
}

/* -------------------------------------------------------------------------- */
/*                                PermanentRef                                */
/* -------------------------------------------------------------------------- */

/// Reference to an object in the permanent region.
///
/// Such objects outlive every safe point, so these references
/// are `Copy` and need no rooting.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct PermanentRef<'h>
{
    // INVARIANT: The object is initialized and permanent.
    object: UnsafeRef<'h>,
}

impl<'h> PermanentRef<'h>
{
    /// Assert that an object is permanent.
    ///
    /// # Safety
    ///
    /// The object must be initialized and in the permanent region.
    pub (super) unsafe fn new(object: UnsafeRef<'h>) -> Self
    {
        debug_assert!(object.is_permanent());
        Self{object}
    }
}

// SAFETY: Permanent objects never die.
unsafe impl<'h> BorrowRef<'h> for PermanentRef<'h>
{
    fn borrow_ref(&self) -> UnsafeRef<'h>
    {
        self.object
    }
}

// SAFETY: The field is never reassigned, and the object never dies.
unsafe impl<'h> PinnedRef<'h> for PermanentRef<'h>
{
}

/* -------------------------------------------------------------------------- */
/*                                 PinnedRoot                                 */
/* -------------------------------------------------------------------------- */

/// Root that may be stored anywhere.
///
/// Creating, cloning and dropping one updates a counter in the heap,
/// which takes a lock. Prefer [stack roots] or [pinned stack roots]
/// when the root does not need to escape the current stack frame.
/// A pinned root must not outlive its heap.
///
/// [stack roots]: `super::Mutator::with_stack_roots`
/// [pinned stack roots]: `super::Mutator::with_pinned_stack_root`
pub struct PinnedRoot<'h>
{
    // INVARIANT: Counted in the pinned root registry of the heap.
    object: UnsafeRef<'h>,
}

// SAFETY: The registry is behind a mutex.
unsafe impl<'h> Send for PinnedRoot<'h> { }
unsafe impl<'h> Sync for PinnedRoot<'h> { }

impl<'h> PinnedRoot<'h>
{
    /// Register a pinned root for an object.
    ///
    /// # Safety
    ///
    /// The object must be live.
    pub (super) unsafe fn new(object: UnsafeRef<'h>) -> Self
    {
        object.heap().retain_pinned_root(object);
        Self{object}
    }
}

// SAFETY: The registry keeps the object live.
unsafe impl<'h> BorrowRef<'h> for PinnedRoot<'h>
{
    fn borrow_ref(&self) -> UnsafeRef<'h>
    {
        self.object
    }
}

// SAFETY: The field is never reassigned.
unsafe impl<'h> PinnedRef<'h> for PinnedRoot<'h>
{
}

impl<'h> Clone for PinnedRoot<'h>
{
    fn clone(&self) -> Self
    {
        self.pin()
    }
}

impl<'h> Drop for PinnedRoot<'h>
{
    fn drop(&mut self)
    {
        // SAFETY: Balances the retain in PinnedRoot::new.
        unsafe { self.heap().release_pinned_root(self.object); }
    }
}

/* -------------------------------------------------------------------------- */
/*                                 Debug impls                                */
/* -------------------------------------------------------------------------- */

impl<'h> fmt::Debug for UnsafeRef<'h>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "UnsafeRef({:p})", self.address)
    }
}

impl<'h> fmt::Debug for PermanentRef<'h>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "PermanentRef({:p})", self.object.address)
    }
}

impl<'h> fmt::Debug for PinnedRoot<'h>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "PinnedRoot({:p})", self.object.address)
    }
}

#[cfg(test)]
mod tests
{
    use {super::*, std::mem::{size_of, transmute}};

    #[test]
    fn unassigned_slot_is_a_zero_word()
    {
        assert_eq!(size_of::<Option<UnsafeRef>>(), size_of::<usize>());
        // SAFETY: Same size, as asserted above.
        let bits = unsafe { transmute::<Option<UnsafeRef>, usize>(None) };
        assert_eq!(bits, 0);
    }

    #[test]
    fn pinned_roots_are_counted()
    {
        Heap::with(|heap| {
            let symbol = heap.intern("T");
            let count = || heap.pinned_root_count(symbol.borrow_ref());
            let first = symbol.pin();
            let second = first.clone();
            assert_eq!(count(), 2);
            drop(first);
            assert_eq!(count(), 1);
            drop(second);
            assert_eq!(count(), 0);
        });
    }

    #[test]
    fn permanent_refs_know_their_heap()
    {
        Heap::with(|heap| {
            let symbol = heap.intern("T");
            assert!(std::ptr::eq(symbol.heap(), heap));
            assert!(unsafe { symbol.borrow_ref().is_permanent() });
        });
    }

    #[test]
    fn debug_shows_kind_of_reference()
    {
        Heap::with(|heap| {
            let symbol = heap.intern("T");
            assert!(format!("{symbol:?}").starts_with("PermanentRef(0x"));
            assert!(format!("{:?}", symbol.pin()).starts_with("PinnedRoot(0x"));
        });
    }
}
