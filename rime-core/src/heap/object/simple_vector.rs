use {
    super::{
        super::{
            BorrowRef,
            Heap,
            Mutator,
            PermanentRef,
            PinnedRef,
            StackRoot,
            UnsafeRef,
        },
        CreateInfo,
        Kind,
        ObjectHeader,
    },
    smallvec::SmallVec,
    std::{cell::Cell, fmt, mem::size_of, ptr::NonNull, slice},
    thiserror::Error,
};

/// A slot of a simple vector.
///
/// [`None`] is the unassigned marker; it is represented by zero.
type Slot<'h> = Cell<Option<UnsafeRef<'h>>>;

/// In-memory representation of simple vector objects.
///
/// A simple vector is a fixed-length sequence of slots,
/// each of which either references an object or is unassigned.
/// The length is decided when the simple vector is created.
/// Slots are only written while the simple vector is being constructed;
/// after that it is treated as immutable.
///
/// Simple vectors do not own the objects they reference.
/// The garbage collector traces every assigned slot.
///
/// All simple vectors of length zero are the same object,
/// namely [the pre-allocated one][`super::super::PreAlloc::empty_simple_vector`].
/// Constructors return it without allocating.
#[repr(C)]
pub struct SimpleVector<'h>
{
    header: ObjectHeader,

    /// The number of slots.
    len: usize,

    /// The slots.
    slots: [Slot<'h>; 0 /* len */],
}

/// Returned when accessing a simple vector fails.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum SimpleVectorError
{
    /// The slot was read before anything was written to it.
    #[error("Access to undefined reference at index {index}")]
    UnassignedReference
    {
        /// Index of the unassigned slot.
        index: usize,
    },

    /// The index was not smaller than the length.
    #[error("Index {index} out of bounds for simple vector of length {len}")]
    OutOfBounds
    {
        /// The offending index.
        index: usize,

        /// The length of the simple vector.
        len: usize,
    },

    /// The object is of a different kind.
    #[error("Object is not a simple vector")]
    NotASimpleVector,
}

/* -------------------------------------------------------------------------- */
/*                               Representation                               */
/* -------------------------------------------------------------------------- */

impl<'h> SimpleVector<'h>
{
    /// Create info for a simple vector with unassigned slots.
    ///
    /// Only the object header and the length are written.
    /// The slots are left alone, as allocated memory is always zeroed.
    pub (in super::super) unsafe fn create_info_uninit(len: usize)
        -> CreateInfo<impl 'h + FnOnce(NonNull<()>)>
    {
        CreateInfo{
            size: Self::size_for(len),
            init: move |ptr| {
                let ptr = ptr.as_ptr().cast::<Self>();
                let header = ObjectHeader::new(Kind::SimpleVector);
                ptr.write(Self{header, len, slots: []});
            },
        }
    }

    fn size_for(len: usize) -> usize
    {
        len.checked_mul(size_of::<Slot<'h>>())
            .and_then(|slots| slots.checked_add(size_of::<Self>()))
            .expect("Cannot allocate a simple vector this large")
    }

    /// The number of bytes occupied by this object.
    pub (in super::super) fn size(&self) -> usize
    {
        Self::size_for(self.len)
    }

    /// Borrow a simple vector object, if the object is a simple vector.
    pub fn of<'a, R>(object: &'a R) -> Result<&'a Self, SimpleVectorError>
        where R: PinnedRef<'h> + ?Sized
    {
        // SAFETY: The object is live, as guaranteed by BorrowRef.
        //         It stays live and in place while borrowed,
        //         as guaranteed by PinnedRef.
        unsafe { Self::from_unsafe_ref(object.borrow_ref()) }
    }

    /// Downcast a reference to a simple vector.
    ///
    /// # Safety
    ///
    /// The object must be live and initialized for all of `'a`.
    unsafe fn from_unsafe_ref<'a>(object: UnsafeRef<'h>)
        -> Result<&'a Self, SimpleVectorError>
    {
        let ptr = object.as_ptr().cast::<ObjectHeader>().as_ptr();
        match (*ptr).kind {
            Kind::SimpleVector => Ok(&*ptr.cast::<Self>()),
            _                  => Err(SimpleVectorError::NotASimpleVector),
        }
    }

    fn slots(&self) -> &[Slot<'h>]
    {
        // SAFETY: There are len slots after the length,
        //         and they were zeroed or written during construction.
        unsafe { slice::from_raw_parts(self.slots.as_ptr(), self.len) }
    }
}

/* -------------------------------------------------------------------------- */
/*                                   Access                                   */
/* -------------------------------------------------------------------------- */

impl<'h> SimpleVector<'h>
{
    /// The number of slots.
    ///
    /// This is not a safe point.
    pub fn len(&self) -> usize
    {
        self.len
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool
    {
        self.len == 0
    }

    fn check_index(&self, index: usize) -> Result<(), SimpleVectorError>
    {
        if index < self.len {
            Ok(())
        } else {
            Err(SimpleVectorError::OutOfBounds{index, len: self.len})
        }
    }

    /// Whether the slot at the given index references an object.
    pub fn is_assigned(&self, index: usize) -> Result<bool, SimpleVectorError>
    {
        self.check_index(index)?;
        // SAFETY: Index was just checked.
        Ok(unsafe { self.is_assigned_unchecked(index) })
    }

    /// Whether the slot at the given index references an object.
    ///
    /// # Safety
    ///
    /// The index must be smaller than the length.
    pub unsafe fn is_assigned_unchecked(&self, index: usize) -> bool
    {
        debug_assert!(index < self.len);
        (*self.slots.as_ptr().add(index)).get().is_some()
    }

    /// The object referenced by the slot at the given index.
    ///
    /// Fails if the index is out of bounds or the slot is unassigned.
    pub fn get(&self, index: usize) -> Result<UnsafeRef<'h>, SimpleVectorError>
    {
        self.check_index(index)?;
        // SAFETY: Index was just checked.
        unsafe { self.get_unchecked(index) }
    }

    /// The object referenced by the slot at the given index.
    ///
    /// Fails if the slot is unassigned.
    ///
    /// # Safety
    ///
    /// The index must be smaller than the length.
    pub unsafe fn get_unchecked(&self, index: usize)
        -> Result<UnsafeRef<'h>, SimpleVectorError>
    {
        debug_assert!(index < self.len);
        (*self.slots.as_ptr().add(index)).get()
            .ok_or(SimpleVectorError::UnassignedReference{index})
    }

    /// The contents of the slot at the given index.
    ///
    /// Unlike [`get`][`Self::get`], this does not fail on unassigned slots.
    pub fn slot(&self, index: usize)
        -> Result<Option<UnsafeRef<'h>>, SimpleVectorError>
    {
        self.check_index(index)?;
        Ok(self.slots()[index].get())
    }

    /// The contents of each slot, in order.
    pub fn iter(&self) -> impl '_ + Iterator<Item=Option<UnsafeRef<'h>>>
    {
        self.slots().iter().map(Cell::get)
    }

    /// Write to the slot at the given index.
    ///
    /// Fails if the index is out of bounds.
    ///
    /// # Safety
    ///
    /// See [`set_unchecked`][`Self::set_unchecked`].
    pub unsafe fn set(&self, index: usize, value: Option<UnsafeRef<'h>>)
        -> Result<(), SimpleVectorError>
    {
        self.check_index(index)?;
        self.set_unchecked(index, value);
        Ok(())
    }

    /// Write to the slot at the given index.
    ///
    /// # Safety
    ///
    /// The index must be smaller than the length.
    /// The simple vector must still be under construction:
    /// nothing may have observed its contents yet.
    /// The value must reference a live object on the same heap.
    /// If the simple vector is permanent, so must be the value.
    pub unsafe fn set_unchecked(&self, index: usize, value: Option<UnsafeRef<'h>>)
    {
        debug_assert!(index < self.len);
        (*self.slots.as_ptr().add(index)).set(value);
    }
}

impl<'h> fmt::Debug for SimpleVector<'h>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        f.debug_list().entries(self.iter()).finish()
    }
}

/* -------------------------------------------------------------------------- */
/*                                Construction                                */
/* -------------------------------------------------------------------------- */

impl<'h> SimpleVector<'h>
{
    /// Allocate a simple vector with unassigned slots.
    ///
    /// If `len` is zero, the allocator is not called
    /// and the pre-allocated empty simple vector is returned.
    /// Otherwise this is a safe point, which happens before
    /// the new simple vector exists. The caller must write it
    /// into a root before the next safe point.
    ///
    /// # Safety
    ///
    /// The returned object must not be used after the next safe point,
    /// unless it was stored into a root.
    unsafe fn alloc_uninit(mutator: &Mutator<'h>, len: usize)
        -> (UnsafeRef<'h>, &'h Self)
    {
        if len == 0 {
            let empty = mutator.heap.pre_alloc.empty_simple_vector();
            let empty = empty.borrow_ref();
            return (empty, &*empty.as_ptr().as_ptr().cast::<Self>());
        }

        let create_info = Self::create_info_uninit(len);
        let ptr = mutator.alloc(create_info.size);
        (create_info.init)(ptr);
        (UnsafeRef::new(ptr), &*ptr.as_ptr().cast::<Self>())
    }

    /// Create a simple vector whose slots are all unassigned.
    ///
    /// The slots are not written at all; they are unassigned
    /// because freshly allocated memory is zeroed.
    /// The intent is that every slot is written
    /// with [`set`][`Self::set`] before the vector is read.
    pub fn new_uninit(mutator: &Mutator<'h>, into: &StackRoot<'h>, len: usize)
    {
        // SAFETY: The object is written into a root right away.
        unsafe {
            let (object, _) = Self::alloc_uninit(mutator, len);
            into.set_unsafe(object);
        }
    }

    /// Create a simple vector whose slots are all unassigned.
    ///
    /// Unlike [`new_uninit`][`Self::new_uninit`],
    /// the intent is that the slots stay unassigned.
    pub fn new_zeroed(mutator: &Mutator<'h>, into: &StackRoot<'h>, len: usize)
    {
        // SAFETY: The object is written into a root right away.
        unsafe {
            let (object, vector) = Self::alloc_uninit(mutator, len);
            for slot in vector.slots() {
                slot.set(None);
            }
            into.set_unsafe(object);
        }
    }

    /// Create a simple vector whose slots all reference the same object.
    pub fn new_filled(
        mutator: &Mutator<'h>,
        into:    &StackRoot<'h>,
        len:     usize,
        value:   impl BorrowRef<'h>,
    )
    {
        // SAFETY: value is borrowed after the safe point,
        //         and the object is written into a root right away.
        unsafe {
            let (object, vector) = Self::alloc_uninit(mutator, len);
            let value = value.borrow_ref();
            for slot in vector.slots() {
                slot.set(Some(value));
            }
            into.set_unsafe(object);
        }
    }

    /// Create a shallow copy of a simple vector.
    ///
    /// The new simple vector references the same objects as the source,
    /// and has the same unassigned slots. Unless the source is empty,
    /// the copy is a different object from the source.
    pub fn new_copy(
        mutator: &Mutator<'h>,
        into:    &StackRoot<'h>,
        source:  impl BorrowRef<'h>,
    ) -> Result<(), SimpleVectorError>
    {
        // SAFETY: source is borrowed again after the safe point,
        //         and the object is written into a root right away.
        unsafe {
            let len = Self::from_unsafe_ref(source.borrow_ref())?.len();
            let (object, vector) = Self::alloc_uninit(mutator, len);
            let source = Self::from_unsafe_ref(source.borrow_ref())?;
            for (to, from) in vector.slots().iter().zip(source.slots()) {
                to.set(from.get());
            }
            into.set_unsafe(object);
        }
        Ok(())
    }

    /// Create a simple vector that references the given objects, in order.
    ///
    /// The [`svec!`][`crate::svec`] macro is a convenient way to call this.
    pub fn new_from_refs(
        mutator: &Mutator<'h>,
        into:    &StackRoot<'h>,
        values:  &[&dyn BorrowRef<'h>],
    )
    {
        // SAFETY: values are borrowed after the safe point,
        //         and the object is written into a root right away.
        unsafe {
            let (object, vector) = Self::alloc_uninit(mutator, values.len());
            for (slot, value) in vector.slots().iter().zip(values) {
                slot.set(Some(value.borrow_ref()));
            }
            into.set_unsafe(object);
        }
    }

    /// Create a simple vector that references one object.
    pub fn new_1(
        mutator: &Mutator<'h>,
        into:    &StackRoot<'h>,
        a:       impl BorrowRef<'h>,
    )
    {
        // SAFETY: a is borrowed after the safe point,
        //         and the object is written into a root right away.
        unsafe {
            let (object, vector) = Self::alloc_uninit(mutator, 1);
            vector.set_unchecked(0, Some(a.borrow_ref()));
            into.set_unsafe(object);
        }
    }

    /// Create a simple vector that references two objects, in order.
    pub fn new_2(
        mutator: &Mutator<'h>,
        into:    &StackRoot<'h>,
        a:       impl BorrowRef<'h>,
        b:       impl BorrowRef<'h>,
    )
    {
        // SAFETY: a and b are borrowed after the safe point,
        //         and the object is written into a root right away.
        unsafe {
            let (object, vector) = Self::alloc_uninit(mutator, 2);
            vector.set_unchecked(0, Some(a.borrow_ref()));
            vector.set_unchecked(1, Some(b.borrow_ref()));
            into.set_unsafe(object);
        }
    }
}

/// Create a simple vector that references the given objects, in order.
///
/// This is shorthand for [`SimpleVector::new_from_refs`].
/// Each value may be of any type that implements [`BorrowRef`].
///
/// ```ignore
/// svec!(&mutator, root, symbol_a, symbol_b, other_root);
/// ```
///
/// [`SimpleVector::new_from_refs`]: `crate::heap::SimpleVector::new_from_refs`
/// [`BorrowRef`]: `crate::heap::BorrowRef`
#[macro_export]
macro_rules! svec
{
    ($mutator:expr, $into:expr $(, $value:expr)* $(,)?) => {
        $crate::heap::SimpleVector::new_from_refs(
            $mutator,
            $into,
            &[$(&$value as &dyn $crate::heap::BorrowRef<'_>),*],
        )
    };
}

impl<'h> Heap<'h>
{
    /// Create a permanent simple vector of symbols with the given names.
    ///
    /// The symbols are [interned][`Self::intern`], in order.
    /// The simple vector is allocated in the permanent region,
    /// so it is never collected and needs no roots.
    /// Calling this repeatedly with the same names creates
    /// a new simple vector each time, unless `names` is empty.
    /// This is not a safe point.
    pub fn new_permanent_symbols(&self, names: &[&str]) -> PermanentRef<'h>
    {
        if names.is_empty() {
            return self.pre_alloc.empty_simple_vector();
        }

        // Intern first, as interning locks the permanent region too.
        let symbols: SmallVec<[PermanentRef<'h>; 8]> =
            names.iter().map(|name| self.intern(name)).collect();

        // SAFETY: The object is initialized right away,
        //         and it only references permanent symbols.
        unsafe {
            let create_info = SimpleVector::create_info_uninit(symbols.len());
            let ptr = self.alloc_permanent(create_info.size);
            (create_info.init)(ptr);

            let vector = &*ptr.as_ptr().cast::<SimpleVector<'h>>();
            for (slot, symbol) in vector.slots().iter().zip(&symbols) {
                slot.set(Some(symbol.borrow_ref()));
            }

            log::trace!("Created permanent simple vector of {} symbols", names.len());
            PermanentRef::new(UnsafeRef::new(ptr))
        }
    }
}
