use {
    super::{Heap, PermanentRef, Symbol, UnsafeRef},
    std::collections::HashMap,
};

/// Interned symbols of a heap, by name.
pub (super) struct SymbolTable<'h>
{
    by_name: HashMap<Box<str>, PermanentRef<'h>>,
}

impl<'h> SymbolTable<'h>
{
    pub fn new() -> Self
    {
        Self{by_name: HashMap::new()}
    }

    #[cfg(test)]
    pub fn len(&self) -> usize
    {
        self.by_name.len()
    }
}

impl<'h> Heap<'h>
{
    /// Obtain the symbol with the given name.
    ///
    /// If no such symbol exists yet, it is created in the permanent region.
    /// Calling this method multiple times with the same name
    /// returns references to the same object.
    /// This is not a safe point.
    pub fn intern(&self, name: &str) -> PermanentRef<'h>
    {
        let mut symbols = self.symbols.lock().unwrap();

        if let Some(&symbol) = symbols.by_name.get(name) {
            return symbol;
        }

        // SAFETY: The object is initialized right away,
        //         and symbols do not reference any objects.
        let symbol = unsafe {
            let create_info = Symbol::create_info_from_name(name);
            let ptr = self.alloc_permanent(create_info.size);
            (create_info.init)(ptr);
            PermanentRef::new(UnsafeRef::new(ptr))
        };

        symbols.by_name.insert(name.into(), symbol);
        symbol
    }
}

#[cfg(test)]
mod tests
{
    use {super::*, crate::heap::BorrowRef, std::thread};

    #[test]
    fn intern_is_idempotent()
    {
        Heap::with(|heap| {
            let a = heap.intern("a");
            let b = heap.intern("b");
            assert_eq!(heap.intern("a"), a);
            assert_eq!(heap.intern("b"), b);
            assert_ne!(a, b);
            assert_eq!(heap.symbols.lock().unwrap().len(), 2);
        });
    }

    #[test]
    fn intern_long_name()
    {
        Heap::with(|heap| {
            let name = "x".repeat(10_000);
            let symbol = heap.intern(&name);
            assert_eq!(Symbol::of(&symbol).unwrap().name(), name);
            assert_eq!(heap.intern(&name), symbol);
        });
    }

    #[test]
    fn intern_from_many_threads()
    {
        Heap::with(|heap| {
            let symbols: Vec<_> = thread::scope(|s| {
                let handles: Vec<_> =
                    (0 .. 8)
                    .map(|_| s.spawn(|| heap.intern("shared").borrow_ref()))
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });
            assert!(symbols.windows(2).all(|w| w[0] == w[1]));
        });
    }
}
