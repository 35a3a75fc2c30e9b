//! External service integrations

pub mod object_store;

pub use object_store::{compensate, delete_quietly, MemoryObjectStore, ObjectStore, Upload};
