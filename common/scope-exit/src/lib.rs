//! Run code when a scope is left.

#![warn(missing_docs)]

/// Guard created by [`scope_exit!`].
///
/// Calls the closure when dropped, including during unwinding.
#[doc(hidden)]
pub struct ScopeExit<F>
    where F: FnOnce()
{
    // INVARIANT: Some until dropped.
    on_exit: Option<F>,
}

impl<F> ScopeExit<F>
    where F: FnOnce()
{
    pub fn new(on_exit: F) -> Self
    {
        Self{on_exit: Some(on_exit)}
    }
}

impl<F> Drop for ScopeExit<F>
    where F: FnOnce()
{
    fn drop(&mut self)
    {
        if let Some(on_exit) = self.on_exit.take() {
            on_exit();
        }
    }
}

/// Perform the given statements when the enclosing scope is left.
///
/// This happens on normal exit as well as when a panic unwinds the scope.
/// Guards in the same scope run in reverse order of appearance.
///
/// # Examples
///
/// ```
/// # use scope_exit::scope_exit;
/// use std::cell::RefCell;
/// let log = RefCell::new(Vec::new());
/// {
///     scope_exit! { log.borrow_mut().push("left"); }
///     log.borrow_mut().push("inside");
/// }
/// assert_eq!(*log.borrow(), ["inside", "left"]);
/// ```
#[macro_export]
macro_rules! scope_exit
{
    { $($tt:tt)* } => {
        let _scope_exit = $crate::ScopeExit::new(|| { $($tt)* });
    };
}

#[cfg(test)]
mod tests
{
    use {super::*, std::{cell::Cell, panic::{AssertUnwindSafe, catch_unwind}}};

    #[test]
    fn runs_when_scope_unwinds()
    {
        let ran = Cell::new(false);
        let result = catch_unwind(AssertUnwindSafe(|| {
            scope_exit! { ran.set(true); }
            panic!("unwinding");
        }));
        assert!(result.is_err());
        assert!(ran.get());
    }

    #[test]
    fn guards_run_in_reverse_order()
    {
        let order = Cell::new(0);
        {
            scope_exit! { assert_eq!(order.replace(2), 1); }
            scope_exit! { assert_eq!(order.replace(1), 0); }
        }
        assert_eq!(order.get(), 2);
    }
}
