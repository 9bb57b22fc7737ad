use crate::game::constants::{DEFAULT_PROTOCOL_VERSION, SKIN_MAX};
use rand::Rng;
use std::env;

const DEFAULT_SERVER_URL: &str = "ws://95.216.38.155:444/slither";
const DEFAULT_NICKNAME: &str = "rusty";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub nickname: String,
    pub skin: u8,
    pub protocol_version: u8,
    pub custom_skin: Option<Vec<u8>>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let server_url = env::var("SLITHER_SERVER_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let nickname = env::var("SLITHER_NICKNAME")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_NICKNAME.to_string());
        let skin = env::var("SLITHER_SKIN")
            .ok()
            .and_then(|value| value.parse::<u8>().ok())
            .filter(|&value| value <= SKIN_MAX)
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..=SKIN_MAX));

        Self {
            server_url,
            nickname,
            skin,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            custom_skin: None,
        }
    }
}
