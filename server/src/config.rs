use std::env;
use std::str::FromStr;
use std::time::Duration;

pub use ski_shared::config::WorldConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Period of the liveness sweep that prunes sessions whose socket closed silently
    pub sweep_interval: Duration,
    /// Per-session queue of outbound messages waiting for the socket writer
    pub outbound_buffer: usize,
    /// Queue of connection events waiting for the relay loop
    pub command_buffer: usize,
    pub world: WorldConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            sweep_interval: Duration::from_secs(30),
            outbound_buffer: 256,
            command_buffer: 1024,
            world: WorldConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build a config from `SKI_RELAY_*` environment variables.
    /// Missing or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let world = WorldConfig {
            seed: env::var("SKI_RELAY_SEED").ok().or(defaults.world.seed.clone()),
            coin_count: env_or("SKI_RELAY_COINS", defaults.world.coin_count),
            power_up_count: env_or("SKI_RELAY_POWER_UPS", defaults.world.power_up_count),
            ramp_count: env_or("SKI_RELAY_RAMPS", defaults.world.ramp_count),
            map_size: env_or("SKI_RELAY_MAP_SIZE", defaults.world.map_size),
        };

        Self {
            listen_addr: env::var("SKI_RELAY_ADDR").unwrap_or(defaults.listen_addr),
            sweep_interval: Duration::from_secs(env_or(
                "SKI_RELAY_SWEEP_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            outbound_buffer: env_or("SKI_RELAY_OUTBOUND_BUFFER", defaults.outbound_buffer),
            command_buffer: env_or("SKI_RELAY_COMMAND_BUFFER", defaults.command_buffer),
            world,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.trim().is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.sweep_interval.is_zero() {
            return Err("sweep_interval must be > 0".to_string());
        }
        if self.outbound_buffer == 0 {
            return Err("outbound_buffer must be > 0".to_string());
        }
        if self.command_buffer == 0 {
            return Err("command_buffer must be > 0".to_string());
        }
        self.world.validate()
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
