//! Garbage-collected heaps.
//!
//! Objects live in [blocks][`Block`] owned by a [`Heap`].
//! New objects are bump-allocated by [mutators][`Mutator`],
//! which are the thread-local allocation contexts of the heap.
//! Every allocation is a safe point: before memory is handed out,
//! the mutator may be paused so that a garbage collection cycle can run.
//!
//! The garbage collector is precise and does not move objects.
//! It discovers live objects by tracing from roots:
//!
//!  - [Stack roots][`StackRoot`] and [pinned stack roots][`PinnedStackRoot`],
//!    managed in LIFO batches by each mutator.
//!  - [Pinned roots][`PinnedRoot`], which may be stored anywhere.
//!
//! Objects in the permanent region are never collected,
//! so they need not be reachable from roots.
//! These are symbols, the [pre-allocated objects][`PreAlloc`],
//! and [simple vectors built from symbol names][`Heap::new_permanent_symbols`].
//! Permanent objects must only reference other permanent objects.
//!
//! # Memory safety of fresh objects
//!
//! Blocks are allocated zeroed, and memory is never reused
//! for a new object once handed out. An all-zero slot decodes
//! as the unassigned marker (`None`), so an object that has not been
//! fully initialized is still safe for the garbage collector to trace.

pub use self::{
    block::*,
    collect::*,
    config::*,
    heap::*,
    mutator::*,
    object::*,
    pre_alloc::*,
    refs::*,
};

mod block;
mod collect;
mod config;
mod heap;
mod mutator;
mod object;
mod permanent;
mod pre_alloc;
mod refs;
mod symbol_table;
