#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// An int-keyed map implemented with cuckoo hashing.
///
/// This module provides [`IntMap`] — four candidate slots per key, bounded
/// random-walk eviction, and a small stash for problematic keys — along with
/// its iterator types.
pub mod int_map;

pub use int_map::IntMap;
