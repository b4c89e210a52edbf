use {
    super::{DEFAULT_BLOCK_SIZE, Block, Heap, Region},
    std::{mem::replace, ptr::NonNull},
};

/// Blocks of objects that are never collected nor moved.
pub (super) struct PermanentRegion
{
    /// Block in which new permanent objects are allocated.
    current: Option<Block>,

    /// Blocks in which no more new allocations take place.
    retired: Vec<Block>,
}

impl PermanentRegion
{
    pub fn new() -> Self
    {
        Self{current: None, retired: Vec::new()}
    }
}

impl<'h> Heap<'h>
{
    /// Allocate memory for a permanent object.
    ///
    /// This is not a safe point; it does not interact
    /// with the garbage collector in any way.
    ///
    /// # Safety
    ///
    /// The caller must initialize the allocated memory
    /// with an object that only references permanent objects.
    pub (super) unsafe fn alloc_permanent(&self, size: usize) -> NonNull<()>
    {
        let mut permanent = self.permanent.lock().unwrap();

        if size > DEFAULT_BLOCK_SIZE {
            let mut block = Block::with_capacity(self, Region::Permanent, size);
            let ptr = block.try_alloc(size)
                .expect("Block should have sufficient space");
            permanent.retired.push(block);
            return ptr;
        }

        if let Some(ptr) = permanent.current.as_mut()
            .and_then(|block| block.try_alloc(size)) {
            return ptr;
        }

        let mut new_block = Block::new(self, Region::Permanent);
        let ptr = new_block.try_alloc(size)
            .expect("Block should have sufficient space");

        if let Some(old_block) = replace(&mut permanent.current, Some(new_block)) {
            permanent.retired.push(old_block);
        }

        ptr
    }
}
