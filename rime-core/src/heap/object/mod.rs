//! Working with objects on garbage-collected heaps.

pub use self::{simple_vector::*, symbol::*, view::*};

use {
    super::UnsafeRef,
    std::{cell::Cell, mem::align_of, ptr::NonNull},
};

mod simple_vector;
mod symbol;
mod view;

/// Ensure that what embeds this is at least object-aligned.
#[repr(align(8))]
pub struct ObjectAlign;

/// Minimum required alignment for objects.
pub const OBJECT_ALIGN: usize = align_of::<ObjectAlign>();

/// Information on how to create an object.
pub (super) struct CreateInfo<F>
    where F: FnOnce(NonNull<()>)
{
    /// How many bytes to allocate for the object.
    pub size: usize,

    /// Function that initializes the object.
    pub init: F,
}

/// Data at the start of each object.
///
/// Every object representation type must begin with a field of this type.
/// And they must use `#[repr(C)]` so that we can downcast from this type.
#[repr(C)]
pub struct ObjectHeader
{
    /// What kind of object this is.
    pub kind: Kind,

    /// Set by the garbage collector when the object is found to be live.
    ///
    /// Only accessed while all mutators are in a safe point.
    pub (in super) marked: Cell<bool>,

    /// Set by the garbage collector when the object is found to be dead.
    ///
    /// The memory of dead objects is not reused until their block is freed.
    pub (in super) dead: Cell<bool>,
}

/// Kind of object.
///
/// This tells you which of the different Rust representation types is used.
/// For example, if [`ObjectHeader::kind`] is set to [`Kind::SimpleVector`],
/// then the object is represented by the [`SimpleVector`] struct.
/// The garbage collector uses it to find the references in an object.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Kind
{
    Symbol = 1,
    SimpleVector = 2,
}

impl ObjectHeader
{
    pub (super) fn new(kind: Kind) -> Self
    {
        Self{kind, marked: Cell::new(false), dead: Cell::new(false)}
    }

    /// The number of bytes occupied by an object.
    ///
    /// # Safety
    ///
    /// The object must be initialized.
    pub (super) unsafe fn object_size(object: NonNull<ObjectHeader>) -> usize
    {
        let ptr = object.as_ptr();
        match (*ptr).kind {
            Kind::Symbol       => (*ptr.cast::<Symbol>()).size(),
            Kind::SimpleVector => (*ptr.cast::<SimpleVector>()).size(),
        }
    }

    /// Call the given function for each reference in an object.
    ///
    /// # Safety
    ///
    /// The object must be initialized.
    pub (super) unsafe fn for_each_reference<'h, F>(
        object: NonNull<ObjectHeader>,
        f: F,
    )
        where F: FnMut(UnsafeRef<'h>)
    {
        let ptr = object.as_ptr();
        match (*ptr).kind {
            Kind::Symbol       => { },
            Kind::SimpleVector => {
                let vector = &*ptr.cast::<SimpleVector<'h>>();
                vector.iter().flatten().for_each(f);
            },
        }
    }

    /// Unassign every reference in a dead object.
    ///
    /// # Safety
    ///
    /// The object must be initialized and unreachable.
    pub (super) unsafe fn clear_references(object: NonNull<ObjectHeader>)
    {
        let ptr = object.as_ptr();
        match (*ptr).kind {
            Kind::Symbol       => { },
            Kind::SimpleVector => {
                let vector = &*ptr.cast::<SimpleVector>();
                for i in 0 .. vector.len() {
                    vector.set_unchecked(i, None);
                }
            },
        }
    }
}
