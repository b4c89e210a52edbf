//! Object model and allocation core for the Rime runtime.
//!
//! The [`heap`] module implements garbage-collected heaps,
//! the objects that live on them, and the protocol for allocating them.

#![warn(missing_docs)]

pub mod heap;
