use {
    super::{
        super::{BorrowRef, Heap, PermanentRef},
        CreateInfo,
        Kind,
        ObjectHeader,
    },
    std::{mem::size_of, ptr::{NonNull, copy_nonoverlapping}, slice, str},
};

/// In-memory representation of symbol objects.
///
/// Symbols are interned: for each name there is at most one symbol per heap.
/// They live in the permanent region, so they are never collected.
/// Create them using [`Heap::intern`].
#[repr(C)]
pub struct Symbol
{
    header: ObjectHeader,

    /// The number of bytes in the name.
    len: usize,

    /// The UTF-8 bytes that make up the name.
    bytes: [u8; 0 /* len */],
}

impl Symbol
{
    pub (in super::super) unsafe fn create_info_from_name<'a>(name: &'a str)
        -> CreateInfo<impl 'a + FnOnce(NonNull<()>)>
    {
        let len = name.len();

        CreateInfo{
            size: Self::size_for(len),
            init: move |ptr| {
                let ptr = ptr.as_ptr().cast::<Self>();

                // Initialize symbol metadata.
                let header = ObjectHeader::new(Kind::Symbol);
                ptr.write(Self{header, len, bytes: []});

                // Initialize symbol name.
                let bytes_ptr = (*ptr).bytes.as_mut_ptr();
                copy_nonoverlapping(name.as_ptr(), bytes_ptr, len);
            },
        }
    }

    fn size_for(len: usize) -> usize
    {
        size_of::<Self>().checked_add(len)
            .expect("Cannot allocate a symbol this large")
    }

    /// The number of bytes occupied by this object.
    pub (in super::super) fn size(&self) -> usize
    {
        Self::size_for(self.len)
    }

    /// Obtain the symbol with the given name.
    ///
    /// This is a shorthand for [`Heap::intern`].
    pub fn new<'h>(heap: &'h Heap<'h>, name: &str) -> PermanentRef<'h>
    {
        heap.intern(name)
    }

    /// Borrow a symbol object, if the object is a symbol.
    pub fn of<'a, 'h, R>(object: &'a R) -> Option<&'a Symbol>
        where R: BorrowRef<'h> + ?Sized
    {
        let ptr = object.borrow_ref().as_ptr().cast::<ObjectHeader>();

        // SAFETY: The object is live, as guaranteed by BorrowRef.
        //         Symbols are permanent, so they stay live after that.
        unsafe {
            match (*ptr.as_ptr()).kind {
                Kind::Symbol => Some(&*ptr.as_ptr().cast::<Symbol>()),
                _            => None,
            }
        }
    }

    /// The name of the symbol.
    pub fn name(&self) -> &str
    {
        // SAFETY: len corresponds to the number of bytes,
        //         which were copied from a str during construction.
        unsafe {
            let bytes = slice::from_raw_parts(self.bytes.as_ptr(), self.len);
            str::from_utf8_unchecked(bytes)
        }
    }
}
