//! Control parameters: the options table a session is configured with,
//! loaded from an optional TOML document.

use serde::Deserialize;

/// Errors raised while loading or validating [`ControlParameters`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse control parameters: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid control parameters: {0}")]
    Invalid(String),
}

/// The letter used for the fourth axis, when `use_four_axis` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FourthAxisType {
    E,
    A,
    B,
    C,
}

impl FourthAxisType {
    pub fn letter(self) -> char {
        match self {
            FourthAxisType::E => 'E',
            FourthAxisType::A => 'A',
            FourthAxisType::B => 'B',
            FourthAxisType::C => 'C',
        }
    }
}

/// The full set of recognized session options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ControlParameters {
    pub use_four_axis: bool,
    pub fourth_axis_type: FourthAxisType,
    pub use_mm: bool,
    pub char_send_delay_ms: u64,
    pub wait_time: u64,
    pub filter_file_commands: bool,
    pub reduce_precision: bool,
    pub grbl_line_buffer_len: usize,
    pub z_rate_limit: bool,
    pub z_rate_limit_amount: f64,
    pub xy_rate_amount: f64,
    pub use_z_leveling_data: bool,
    pub z_leveling_offset: f64,
    pub g0_feed: f64,
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            use_four_axis: false,
            fourth_axis_type: FourthAxisType::E,
            use_mm: true,
            char_send_delay_ms: 0,
            wait_time: 100,
            filter_file_commands: true,
            reduce_precision: false,
            grbl_line_buffer_len: 50,
            z_rate_limit: false,
            z_rate_limit_amount: 100.0,
            xy_rate_amount: 2000.0,
            use_z_leveling_data: false,
            z_leveling_offset: 0.0,
            g0_feed: 300.0,
        }
    }
}

/// Parses a TOML document into validated [`ControlParameters`].
pub fn parse(toml_str: &str) -> Result<ControlParameters, ConfigError> {
    let params: ControlParameters = toml::from_str(toml_str)?;
    validate(&params)?;
    Ok(params)
}

fn validate(params: &ControlParameters) -> Result<(), ConfigError> {
    if params.grbl_line_buffer_len < 8 {
        return Err(ConfigError::Invalid(
            "grbl_line_buffer_len must be at least 8".to_string(),
        ));
    }
    if params.z_rate_limit && params.z_rate_limit_amount <= 0.0 {
        return Err(ConfigError::Invalid(
            "z_rate_limit_amount must be positive when z_rate_limit is enabled".to_string(),
        ));
    }
    if params.xy_rate_amount <= 0.0 {
        return Err(ConfigError::Invalid(
            "xy_rate_amount must be positive".to_string(),
        ));
    }
    Ok(())
}
