// In-memory реализации внешних коллабораторов (directory, sink, статистика)

pub mod memory;

pub use memory::{MemoryDirectory, MemorySink};
