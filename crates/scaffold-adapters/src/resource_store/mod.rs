//! Resource store adapters.

mod directory;
mod memory;

pub use directory::DirectoryResourceStore;
pub use memory::InMemoryResourceStore;
