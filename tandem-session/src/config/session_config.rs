use serde::Deserialize;
use std::time::Duration;
use tandem_core::IceServerConfig;

/// Per-call settings shared by both negotiation paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub ice_candidate_pool_size: u8,
    /// `None` waits for the remote answer forever.
    pub answer_timeout_secs: Option<u64>,
    pub inbox_capacity: usize,
}

impl SessionConfig {
    pub fn answer_timeout(&self) -> Option<Duration> {
        self.answer_timeout_secs.map(Duration::from_secs)
    }

    /// Host candidates only. Used for LAN calls and tests.
    pub fn without_ice_servers() -> Self {
        Self {
            ice_servers: Vec::new(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::new(vec![
                "stun:stun1.l.google.com:19302".to_owned(),
                "stun:stun2.l.google.com:19302".to_owned(),
            ])],
            ice_candidate_pool_size: 10,
            answer_timeout_secs: Some(120),
            inbox_capacity: 256,
        }
    }
}

/// Which capture devices a call asks for.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}
