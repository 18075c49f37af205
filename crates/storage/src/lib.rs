#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{CourseCatalog, InMemoryRepository, ProgressStore, Storage, StorageError};
