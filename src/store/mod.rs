//! Entity storage.
//!
//! The store owns every entity record and its handle. It knows nothing about
//! relationships; those live in [`crate::index`].

pub mod memory;

pub use memory::EntityStore;
