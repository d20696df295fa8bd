pub mod recording_transport;
pub mod test_room;

pub use notification_helpers::*;
pub use recording_transport::*;
pub use scripted_relay::*;
pub use test_room::*;
