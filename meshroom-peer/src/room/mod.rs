mod coordinator;
mod room;
mod room_command;
mod room_handle;
mod room_notification;

pub use coordinator::*;
pub use room::*;
pub use room_command::*;
pub use room_handle::*;
pub use room_notification::*;
