mod peer_link;
mod peer_mesh;

pub use peer_link::*;
pub use peer_mesh::*;
