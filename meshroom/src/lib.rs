pub use meshroom_core::model::{FileId, MemberId, RoomId};

pub mod model {
    pub use meshroom_core::model::*;
}

pub mod protocol {
    pub use meshroom_core::protocol::*;
}

#[cfg(feature = "peer")]
pub mod peer {
    pub use meshroom_peer::*;
}
