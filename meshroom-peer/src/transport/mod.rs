mod loopback;
mod transport_config;
mod transport_engine;
mod transport_event;
mod webrtc_engine;

pub use loopback::*;
pub use transport_config::*;
pub use transport_engine::*;
pub use transport_event::*;
pub use webrtc_engine::*;
