mod file_registry;

pub use file_registry::*;
