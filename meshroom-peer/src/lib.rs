mod config;
mod directory;
mod error;
mod mesh;
mod registry;
mod relay;
mod room;
mod transport;

pub use config::*;
pub use directory::*;
pub use error::*;
pub use mesh::*;
pub use registry::*;
pub use relay::*;
pub use room::*;
pub use transport::*;
