use {
    super::{Heap, PermanentRef, SimpleVector, UnsafeRef},
    std::{cell::Cell, ptr::NonNull},
};

macro_rules! declare_pre_alloc
{
    { $($name:ident $what:literal $create_info:expr,)* } => {

        /// Objects that every heap has exactly one of.
        ///
        /// Each heap has its own copy rather than sharing one process-wide.
        /// References are branded by their heap,
        /// so objects of different heaps are never compared anyway.
        /// They are allocated in the permanent region
        /// while the heap is created, and never change afterwards.
        /// The empty simple vector is one: all simple vectors
        /// of length zero are this very object.
        /// Reach them through [`Heap::pre_alloc`].
        pub struct PreAlloc<'h>
        {
            // Set by init, which needs the heap to exist already.
            $($name: Cell<UnsafeRef<'h>>,)*
        }

        // SAFETY: The cells are only written by init,
        //         before the heap is shared.
        unsafe impl<'h> Send for PreAlloc<'h> { }
        unsafe impl<'h> Sync for PreAlloc<'h> { }

        impl<'h> PreAlloc<'h>
        {
            /// Placeholders, to be replaced by init.
            pub (super) fn dangling() -> Self
            {
                Self{
                    $($name: Cell::new(UnsafeRef::new(NonNull::dangling())),)*
                }
            }

            /// Create the objects.
            ///
            /// # Safety
            ///
            /// Call exactly once, while creating the heap.
            pub (super) unsafe fn init(&self, heap: &'h Heap<'h>)
            {
                $({
                    let create_info = $create_info;
                    let ptr = heap.alloc_permanent(create_info.size);
                    (create_info.init)(ptr);
                    self.$name.set(UnsafeRef::new(ptr));
                })*
            }

            $(
                #[doc = concat!("The ", $what, ".")]
                pub fn $name(&self) -> PermanentRef<'h>
                {
                    // SAFETY: init put it in the permanent region.
                    unsafe { PermanentRef::new(self.$name.get()) }
                }
            )*
        }

    };
}

declare_pre_alloc!
{
    empty_simple_vector "empty simple vector"
        SimpleVector::create_info_uninit(0),
}

#[cfg(test)]
mod tests
{
    use {super::*, crate::heap::BorrowRef};

    #[test]
    fn empty_simple_vector_is_permanent_and_empty()
    {
        Heap::with(|heap| {
            let empty = heap.pre_alloc.empty_simple_vector();
            assert!(unsafe { empty.borrow_ref().is_permanent() });
            assert!(std::ptr::eq(empty.heap(), heap));
            assert_eq!(SimpleVector::of(&empty).unwrap().len(), 0);
        });
    }

    #[test]
    fn empty_simple_vector_is_a_singleton()
    {
        Heap::with(|heap| {
            let a = heap.pre_alloc.empty_simple_vector();
            let b = heap.pre_alloc.empty_simple_vector();
            assert_eq!(a.borrow_ref(), b.borrow_ref());
        });
    }

    #[test]
    fn each_heap_has_its_own_empty_simple_vector()
    {
        fn address(heap: &Heap) -> usize
        {
            let empty = heap.pre_alloc.empty_simple_vector();
            empty.borrow_ref().as_ptr().as_ptr() as usize
        }

        Heap::with(|outer| {
            Heap::with(|inner| {
                assert_ne!(address(outer), address(inner));
            });
        });
    }
}
