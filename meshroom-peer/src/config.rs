use crate::transport::TransportConfig;

/// Settings for a [`RoomCoordinator`](crate::RoomCoordinator) and the sessions it spawns.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub transport: TransportConfig,
    /// Capacity of the command queue between a `RoomHandle` and its session.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            command_buffer: 100,
        }
    }
}

impl RoomConfig {
    /// Defaults plus TURN settings from the `MESHROOM_TURN_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            transport: TransportConfig::from_env(),
            ..Self::default()
        }
    }
}
