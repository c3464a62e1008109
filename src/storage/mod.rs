pub mod collection;
pub mod engine;
pub mod memory;

pub use collection::Collection;
pub use engine::DocumentStore;
pub use memory::{IdGenerator, MemoryStore, MemoryStoreConfig};
