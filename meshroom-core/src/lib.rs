pub mod model;
pub mod protocol;

pub use model::*;
pub use protocol::{ProtocolError, RoomMessage, TransferFrame};
