//! Calls that lower to target primitives instead of emitted functions.
//!
//! Each table is consulted before user functions. A table answers `None` when it does not know
//! the name, so the caller can fall through to the next resolution step.

pub mod global;
pub mod maps;
pub mod structs;
