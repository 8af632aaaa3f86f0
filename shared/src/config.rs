/// World layout configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    /// Fixed world seed. A random one is generated when unset.
    pub seed: Option<String>,
    pub coin_count: u32,
    pub power_up_count: u32,
    pub ramp_count: u32,
    /// Edge length of the square map, centred on the origin (world units)
    pub map_size: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: None,
            coin_count: 200,
            power_up_count: 50,
            ramp_count: 50,
            map_size: 1000.0,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.map_size.is_finite() || self.map_size <= 0.0 {
            return Err("map_size must be finite and > 0".to_string());
        }
        if self.map_size > 1_000_000.0 {
            return Err("map_size must be <= 1000000".to_string());
        }
        if let Some(seed) = &self.seed {
            if seed.trim().is_empty() {
                return Err("seed must not be empty when set".to_string());
            }
        }
        Ok(())
    }

    /// Half extent of the map on x and z
    pub fn half_extent(&self) -> f64 {
        self.map_size / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_world_config_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_map_size_invalid() {
        let config = WorldConfig {
            map_size: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_seed_invalid() {
        let config = WorldConfig {
            seed: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_layout_is_allowed() {
        let config = WorldConfig {
            coin_count: 0,
            power_up_count: 0,
            ramp_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
