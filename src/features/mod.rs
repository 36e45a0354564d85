//! Feature implementations for binar-sync.

pub mod sync;
