use super::{super::PinnedRef, Kind, ObjectHeader, SimpleVector, Symbol};

/// Borrowed view of an object, by kind.
///
/// This is convenient for code that must handle objects of any kind,
/// such as printers.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug)]
pub enum View<'a, 'h>
{
    Symbol(&'a str),
    SimpleVector(&'a SimpleVector<'h>),
}

impl<'a, 'h> View<'a, 'h>
{
    /// View the given object.
    pub fn of<R>(object: &'a R) -> Self
        where R: PinnedRef<'h> + ?Sized
    {
        let ptr = object.borrow_ref().as_ptr().cast::<ObjectHeader>();

        // SAFETY: The object is live, as guaranteed by BorrowRef.
        let kind = unsafe { (*ptr.as_ptr()).kind };

        match kind {
            Kind::Symbol => {
                let symbol = Symbol::of(object)
                    .expect("Object kind should be symbol");
                View::Symbol(symbol.name())
            },
            Kind::SimpleVector => {
                let vector = SimpleVector::of(object)
                    .expect("Object kind should be simple vector");
                View::SimpleVector(vector)
            },
        }
    }
}

#[cfg(test)]
mod tests
{
    use {super::*, crate::heap::{BorrowRef, Heap, Mutator}};

    #[test]
    fn view_symbol()
    {
        Heap::with(|heap| {
            let symbol = heap.intern("Float64");
            assert!(matches!(View::of(&symbol), View::Symbol("Float64")));
        });
    }

    #[test]
    fn view_simple_vector()
    {
        Heap::with(|heap| {
            let mutator = Mutator::new(heap);
            let symbol = heap.intern("a");
            mutator.with_stack_roots(|[root]: &[_; 1]| {
                SimpleVector::new_filled(&mutator, root, 2, symbol);
                mutator.with_pinned_stack_root(root, |root| {
                    let View::SimpleVector(vector) = View::of(root)
                        else { panic!("Expected simple vector") };
                    assert_eq!(vector.len(), 2);
                    assert_eq!(vector.get(1), Ok(symbol.borrow_ref()));
                });
            });
        });
    }
}
