//! # Herald Store
//!
//! In-memory implementation of [`herald_core::AccountStore`]: accounts,
//! tiers, bearer tokens and topic reservations, plus the administrative
//! operations used to seed them.

pub mod memory;

pub use memory::MemoryStore;
