//! Domain model for the organizational unit tree.
//!
//! # Invariants
//! - Units are identified by stable integer ids; `ID_ROOT` is the sentinel root.
//! - The parent relation is acyclic.

pub mod unit;
pub mod user;
