//! Ready-made surfaces.

pub mod memory;

pub use memory::MemoryInput;
