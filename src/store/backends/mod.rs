//! Step storage backends

pub mod file;
pub mod memory;

pub use file::FileStepStorage;
pub use memory::MemoryStepStorage;
