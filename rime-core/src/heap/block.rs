use {
    super::{Heap, ObjectHeader, UnsafeRef, object::{OBJECT_ALIGN, ObjectAlign}},
    std::{
        alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error},
        mem::size_of,
        ptr::NonNull,
    },
};

/// Every block starts at a multiple of this many bytes.
pub const BLOCK_ALIGN: usize = 4096;

/// Usable bytes in a block of ordinary size.
///
/// Objects that need more than this get a block of their own.
pub const DEFAULT_BLOCK_SIZE: usize = BLOCK_ALIGN - size_of::<BlockHeader>();

/// Offset of the first object in any block.
const FIRST_OBJECT: usize = round_up(size_of::<BlockHeader>(), OBJECT_ALIGN);

/// Zeroed, owned memory in which objects are bump-allocated.
///
/// The memory starts with a [`BlockHeader`], after which objects follow
/// back to back, each starting at a multiple of [`OBJECT_ALIGN`].
/// No object starts beyond the first [`BLOCK_ALIGN`] bytes,
/// so masking the low bits of an object address yields its block header.
/// Only the tail of a large object extends past that point.
///
/// The whole block is zeroed up front and bytes are never handed out twice.
/// Hence [`try_alloc`] always returns zeroed memory.
///
/// [`try_alloc`]: `Self::try_alloc`
pub struct Block
{
    /// Start of the memory, which is where the header lives.
    base: NonNull<BlockHeader>,

    /// Size of the memory in bytes, header included.
    len: usize,

    /// Offset from `base` at which the next object goes.
    ///
    /// Always a multiple of [`OBJECT_ALIGN`].
    cursor: usize,
}

// SAFETY: A block exclusively owns its memory.
unsafe impl Send for Block { }

/// Which part of a heap a block is in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Region
{
    /// Objects in the block are subject to garbage collection.
    Collected,

    /// Objects in the block live as long as the heap.
    Permanent,
}

impl Block
{
    /// Create a block of [`DEFAULT_BLOCK_SIZE`] usable bytes.
    pub fn new(heap: &Heap, region: Region) -> Self
    {
        Self::with_capacity(heap, region, DEFAULT_BLOCK_SIZE)
    }

    /// Create a block with at least `cap` usable bytes.
    ///
    /// Panics if `cap` is absurdly large.
    /// Aborts through [`handle_alloc_error`] if memory is exhausted.
    pub fn with_capacity(heap: &Heap, region: Region, cap: usize) -> Self
    {
        let layout = cap.checked_add(FIRST_OBJECT)
            .and_then(|len| Layout::from_size_align(len, BLOCK_ALIGN).ok())
            .expect("Cannot allocate a block this large");

        // SAFETY: The layout has a non-zero size.
        let base = unsafe { alloc_zeroed(layout) };
        let Some(base) = NonNull::new(base.cast::<BlockHeader>())
            else { handle_alloc_error(layout) };

        let header = BlockHeader{
            heap: NonNull::from(heap).cast(),
            region,
            _object_align: ObjectAlign,
        };

        // SAFETY: The memory is fresh and aligned to BLOCK_ALIGN.
        unsafe { base.as_ptr().write(header); }

        Self{base, len: layout.size(), cursor: FIRST_OBJECT}
    }

    /// The header at the start of the block.
    pub fn block_header(&self) -> &BlockHeader
    {
        // SAFETY: Written by with_capacity.
        unsafe { self.base.as_ref() }
    }

    /// Size of the block in bytes, header included.
    pub fn len(&self) -> usize
    {
        self.len
    }

    /// Carve `size` bytes for a new object off the block.
    ///
    /// Returns [`None`] without side effects when the object does not fit.
    /// Otherwise the memory is zeroed and aligned to [`OBJECT_ALIGN`].
    /// An object header must be written to it
    /// before the block is next walked by the garbage collector.
    pub fn try_alloc(&mut self, size: usize) -> Option<NonNull<()>>
    {
        if self.cursor >= BLOCK_ALIGN {
            return None;
        }

        let end = self.cursor.checked_add(size)?;
        if end > self.len {
            return None;
        }

        // SAFETY: cursor is within the block.
        let object = unsafe { self.base.cast::<u8>().as_ptr().add(self.cursor) };

        // No overflow; end does not exceed the length of an allocation.
        self.cursor = round_up(end, OBJECT_ALIGN);

        NonNull::new(object.cast())
    }

    /// Call `f` with the header of every object in the block, in order.
    ///
    /// # Safety
    ///
    /// Every object handed out by [`try_alloc`] must have been initialized.
    ///
    /// [`try_alloc`]: `Self::try_alloc`
    pub (super) unsafe fn for_each_object<F>(&self, mut f: F)
        where F: FnMut(NonNull<ObjectHeader>)
    {
        let base = self.base.cast::<u8>().as_ptr();
        let mut at = FIRST_OBJECT;
        while at < self.cursor {
            let object = NonNull::new_unchecked(base.add(at)).cast();
            let size = ObjectHeader::object_size(object);
            f(object);
            at = round_up(at + size, OBJECT_ALIGN);
        }
    }
}

impl Drop for Block
{
    fn drop(&mut self)
    {
        // SAFETY: Same layout as in with_capacity.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.len, BLOCK_ALIGN);
            dealloc(self.base.cast().as_ptr(), layout);
        }
    }
}

/// Metadata stored in the first bytes of a block.
pub struct BlockHeader
{
    /// Owning heap, as `*const Heap<'h>` with `'h` erased.
    heap: NonNull<()>,

    /// The region the block is in.
    pub region: Region,

    // Objects directly follow the header.
    _object_align: ObjectAlign,
}

impl BlockHeader
{
    /// The heap that owns the block.
    ///
    /// # Safety
    ///
    /// `'h` must be the brand of the owning heap,
    /// and that heap must not have been dropped.
    pub unsafe fn heap<'h>(&self) -> &'h Heap<'h>
    {
        self.heap.cast::<Heap<'h>>().as_ref()
    }
}

/// Find the header of the block an object was allocated in.
pub fn block_header_at(object: UnsafeRef) -> *const BlockHeader
{
    let addr = object.as_ptr().as_ptr().cast::<u8>();
    let within_block = addr as usize % BLOCK_ALIGN;
    addr.wrapping_sub(within_block).cast()
}

/// Round `n` up to a multiple of `align`, a power of two.
const fn round_up(n: usize, align: usize) -> usize
{
    (n + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests
{
    use {super::*, proptest::proptest, std::mem::align_of};

    #[test]
    fn block_header_fits_alignment()
    {
        assert!(BLOCK_ALIGN.is_power_of_two());
        assert!(align_of::<BlockHeader>() <= BLOCK_ALIGN);
        assert_eq!(FIRST_OBJECT % OBJECT_ALIGN, 0);
    }

    #[test]
    fn try_alloc_returns_zeroed_aligned_memory()
    {
        Heap::with(|heap| {
            let mut block = Block::new(heap, Region::Collected);
            for size in [1, 7, 8, 24, 100] {
                let ptr = block.try_alloc(size).unwrap();
                assert_eq!(ptr.as_ptr() as usize % OBJECT_ALIGN, 0);
                let bytes = unsafe {
                    std::slice::from_raw_parts(ptr.as_ptr().cast::<u8>(), size)
                };
                assert!(bytes.iter().all(|&b| b == 0));
            }
        });
    }

    #[test]
    fn try_alloc_fails_when_full()
    {
        Heap::with(|heap| {
            let mut block = Block::new(heap, Region::Collected);
            assert!(block.try_alloc(DEFAULT_BLOCK_SIZE + 1).is_none());
            while block.try_alloc(64).is_some() { }
            assert!(block.try_alloc(64).is_none());
        });
    }

    #[test]
    fn block_header_remembers_heap_and_region()
    {
        Heap::with(|heap| {
            let block = Block::new(heap, Region::Permanent);
            assert_eq!(block.block_header().region, Region::Permanent);
            let owner = unsafe { block.block_header().heap() };
            assert!(std::ptr::eq(owner, heap));
        });
    }

    proptest!
    {
        #[test]
        fn blocks_are_aligned(cap in 0usize .. 12_000)
        {
            Heap::with(|heap| {
                let block = Block::with_capacity(heap, Region::Collected, cap);
                let header: *const BlockHeader = block.block_header();
                assert_eq!(header as usize % BLOCK_ALIGN, 0);
                assert!(block.len() >= cap);
            });
        }

        #[test]
        fn block_header_at_rounds_down(addr in 1usize ..)
        {
            let object = UnsafeRef::new(NonNull::new(addr as *mut ()).unwrap());
            let header = block_header_at(object) as usize;
            assert_eq!(header % BLOCK_ALIGN, 0);
            assert!(header <= addr && addr - header < BLOCK_ALIGN);
        }

        #[test]
        fn round_up_is_next_multiple(n in 0usize .. usize::MAX / 2, exp in 0 .. 8)
        {
            let align = 1usize << exp;
            assert_eq!(round_up(n, align), n.next_multiple_of(align));
        }
    }
}
