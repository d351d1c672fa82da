//! Privacy helpers

pub mod commitment;

pub use commitment::CommitmentStore;
