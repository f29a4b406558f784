//! Tool implementations module

pub mod filesystem;

// Re-export for convenience
pub use filesystem::{list_directory, read_file, write_file};
