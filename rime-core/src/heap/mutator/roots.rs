use {super::super::{BorrowRef, PinnedRef, UnsafeRef}, std::cell::Cell};

/// Root that lives in a stack frame.
///
/// Obtain these from [`Mutator::with_stack_roots`],
/// which also explains when to prefer them over other roots.
/// Constructors write the objects they create into a stack root,
/// so that the objects survive subsequent safe points.
///
/// [`Mutator::with_stack_roots`]: `super::Mutator::with_stack_roots`
pub struct StackRoot<'h>
{
    // INVARIANT: The object is live.
    // Read by the garbage collector while the mutator is parked.
    object: Cell<UnsafeRef<'h>>,
}

impl<'h> StackRoot<'h>
{
    /// Wrap a reference in a stack root.
    ///
    /// # Safety
    ///
    /// The object must be live, and the root must be
    /// in a batch that the mutator reports to the garbage collector.
    pub (super) unsafe fn new(object: UnsafeRef<'h>) -> Self
    {
        Self{object: Cell::new(object)}
    }

    /// Make the root reference a different object.
    pub fn set(&self, object: impl BorrowRef<'h>)
    {
        self.object.set(object.borrow_ref());
    }

    /// Make the root reference a different object.
    ///
    /// # Safety
    ///
    /// The object must be live.
    pub unsafe fn set_unsafe(&self, object: UnsafeRef<'h>)
    {
        self.object.set(object);
    }
}

// SAFETY: The garbage collector keeps the object live.
unsafe impl<'h> BorrowRef<'h> for StackRoot<'h>
{
    fn borrow_ref(&self) -> UnsafeRef<'h>
    {
        self.object.get()
    }
}

/// Stack root that cannot be reassigned.
///
/// Obtain these from [`Mutator::with_pinned_stack_root`].
/// Because the object cannot change, its contents can be borrowed.
///
/// [`Mutator::with_pinned_stack_root`]: `super::Mutator::with_pinned_stack_root`
pub struct PinnedStackRoot<'h>
{
    // INVARIANT: The object is live.
    // No Cell, since borrows of the object may be outstanding.
    object: UnsafeRef<'h>,
}

impl<'h> PinnedStackRoot<'h>
{
    /// Wrap a reference in a pinned stack root.
    ///
    /// # Safety
    ///
    /// The object must stay live for as long as the root is used.
    pub (super) unsafe fn new(object: UnsafeRef<'h>) -> Self
    {
        Self{object}
    }
}

// SAFETY: The garbage collector keeps the object live.
unsafe impl<'h> BorrowRef<'h> for PinnedStackRoot<'h>
{
    fn borrow_ref(&self) -> UnsafeRef<'h>
    {
        self.object
    }
}

// SAFETY: The field is never reassigned.
unsafe impl<'h> PinnedRef<'h> for PinnedStackRoot<'h>
{
}
