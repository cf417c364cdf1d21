#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Capacity normalization, growth limits and allocation sizes.
pub mod capacity;

/// Control bytes, group matching and the probe sequence.
///
/// A table keeps one control byte per slot. Lookups compare the 7-bit tag of
/// a hash against a whole group of control bytes at once, and walk groups in
/// a triangular sequence until one contains an `EMPTY` byte.
pub mod control;

mod diagnostics;
mod error;

/// The capability bundle that describes how a table hashes and compares.
pub mod policy;

#[cfg(feature = "reference-table")]
mod swiss_table;

/// Read-only views of table storage.
pub mod table;

pub use control::DefaultGroup;
pub use control::Group;
pub use control::Group8;
pub use control::Group16;
pub use diagnostics::ProbeHistogram;
pub use diagnostics::ProbeSummary;
pub use diagnostics::allocated_bytes;
pub use diagnostics::lower_bound_allocated_bytes;
pub use diagnostics::lower_bound_allocated_bytes_for;
pub use diagnostics::probe_count;
pub use diagnostics::probe_histogram;
pub use diagnostics::probe_summary;
pub use diagnostics::try_lower_bound_allocated_bytes;
pub use error::CapacityOverflow;
#[cfg(any(feature = "foldhash", feature = "std"))]
pub use policy::DefaultHashBuilder;
pub use policy::MapPolicy;
pub use policy::Policy;
pub use policy::SetPolicy;
#[cfg(feature = "reference-table")]
pub use swiss_table::SwissTable;
pub use table::TableRef;
