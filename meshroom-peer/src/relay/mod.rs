mod local_relay;
mod relay_channel;

pub use local_relay::*;
pub use relay_channel::*;
