//! A SwissTable-style hash map that probes eight slots at a time.
//!
//! Most open-addressed hash tables interleave their bookkeeping with their
//! data: to find out whether a slot is worth looking at, you have to load
//! the slot. This crate keeps the bookkeeping separate, the way Google's
//! [SwissTable] does. The table is an array of *groups*, each holding eight
//! `(key, value)` slots and eight *control bytes* packed into a single
//! 64-bit word. A control byte records whether its slot is empty, deleted,
//! or full — and when full, it also stores seven bits of the resident key's
//! hash. One word-sized load therefore answers "which of these eight slots
//! could hold my key?" before any key is ever compared.
//!
//! Lookup splits a key's hash in two: `h1`, everything above the low seven
//! bits, picks a starting group; `h2`, the low seven bits, is the tag
//! matched against control bytes. Groups are scanned in order (wrapping at
//! the end) until either a tag match confirms the key or a group with an
//! empty byte proves the key absent. The byte-parallel matching is plain
//! SWAR — SIMD within a register — so it needs no target-specific
//! intrinsics and runs everywhere `u64` does.
//!
//! Removals leave *tombstones* when their group is otherwise full, so that
//! probe chains running through the group stay intact. The table grows
//! (or, when tombstones dominate, rebuilds at the same size) once the
//! number of used slots passes seven eighths of capacity.
//!
//! # Example
//!
//! ```
//! use raclette::HashMap;
//!
//! let mut ages = HashMap::new();
//! ages.insert("ada", 36);
//! ages.insert("grace", 45);
//! assert_eq!(ages.get("ada"), Some(&36));
//! assert_eq!(ages.len(), 2);
//! ```
//!
//! # Benchmarks
//!
//! `benches/comparison.rs` pits this map against `std::collections::HashMap`
//! and `hashbrown` on seeded random integer and string workloads:
//!
//! ```console
//! $ cargo bench --bench comparison
//! insert/int/raclette     time: [...]
//! insert/int/std          time: [...]
//! lookup/int/raclette     time: [...]
//! ```
//!
//! # Concurrency
//!
//! The map performs no internal synchronization. Rust's borrow rules
//! already enforce the intended discipline: any number of simultaneous
//! readers through `&HashMap`, or exactly one writer through
//! `&mut HashMap`, never both.
//!
//! # Why raclette?
//!
//! It's the Swiss(Table) cheese you melt on a griddle.
//!
//! [SwissTable]: https://abseil.io/blog/20180927-swisstables

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

mod map;
pub mod raw;

pub mod hash_map {
    //! The public map API: [`HashMap`] and its iterators.
    pub use crate::map::*;
}

pub use crate::map::{DefaultHashBuilder, HashMap};
