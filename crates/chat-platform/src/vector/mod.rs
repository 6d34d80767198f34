pub mod memory;

pub use memory::MemoryVectorStore;
