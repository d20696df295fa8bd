use meshroom_core::IceServerConfig;
use std::env;

const DEFAULT_STUN: &str = "stun:stun.l.google.com:19302";

/// Settings for peer transports (STUN/TURN, transfer framing).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Largest data-channel message carrying file bytes.
    pub chunk_size: usize,
    /// Largest file a remote member may announce to us.
    pub max_file_size: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN)],
            chunk_size: 16 * 1024,
            max_file_size: 1 << 30,
        }
    }
}

impl TransportConfig {
    /// Adds a TURN server from `MESHROOM_TURN_URL`, `MESHROOM_TURN_USERNAME`
    /// and `MESHROOM_TURN_CREDENTIAL` when the url is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("MESHROOM_TURN_URL") {
            config.ice_servers.push(IceServerConfig {
                urls: vec![url],
                username: env::var("MESHROOM_TURN_USERNAME").ok(),
                credential: env::var("MESHROOM_TURN_CREDENTIAL").ok(),
            });
        }
        config
    }
}
