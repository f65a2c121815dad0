use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-criterion multipliers applied when the scored layers are summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub landcover: f64,
    pub topo: f64,
    pub roads: f64,
    pub buildings: f64,
    pub three_phase: f64,
    pub water: f64,
    pub boundary: f64,
    pub rail: f64,
    pub driveway: f64,
    pub accumulation: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            landcover: 0.8,
            topo: 1.0,
            roads: 0.5,
            buildings: 1.5,
            three_phase: 0.8,
            water: 1.0,
            boundary: 1.0,
            rail: 1.0,
            driveway: 1.0,
            accumulation: 1.0,
        }
    }
}

impl ScoreWeights {
    fn all(&self) -> [(&'static str, f64); 10] {
        [
            ("landcover", self.landcover),
            ("topo", self.topo),
            ("roads", self.roads),
            ("buildings", self.buildings),
            ("three_phase", self.three_phase),
            ("water", self.water),
            ("boundary", self.boundary),
            ("rail", self.rail),
            ("driveway", self.driveway),
            ("accumulation", self.accumulation),
        ]
    }
}

/// Knobs of the window search. The defaults trade resolution for cost and
/// should only be shrunk for small synthetic parcels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Step between successive window corners, in cells.
    pub stride: usize,
    pub min_height: usize,
    pub min_width: usize,
    /// Lower bound on both width/height and height/width.
    pub min_aspect: f64,
    /// Angle step of the tightest-fit sweep over [0, 90).
    pub rotation_step: u32,
    /// Offsets from the primary rotation that get a full window search.
    pub rotation_offsets: Vec<u32>,
    /// Multiplier on positive cells at the primary rotation.
    pub primary_boost: f64,
    pub rectangularity_threshold: f64,
    /// Scale factor at the threshold; rises linearly to 1.0 at full coverage.
    pub rectangularity_floor: f64,
    /// Parcels with at least this many acres of data are not searched.
    pub max_parcel_acres: f64,
    pub deadline_ms: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            stride: 70,
            min_height: 30,
            min_width: 10,
            min_aspect: 0.2,
            rotation_step: 5,
            rotation_offsets: vec![0, 15, 30, 45, 60, 75],
            primary_boost: 1.07,
            rectangularity_threshold: 0.30,
            rectangularity_floor: 0.8,
            max_parcel_acres: 500.0,
            deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub min_acres: f64,
    pub max_acres: f64,
    /// Dilation passes applied to the projected footprint.
    pub footprint_smoothing: usize,
    pub weights: ScoreWeights,
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_acres: 20.0,
            max_acres: 40.0,
            footprint_smoothing: 10,
            weights: ScoreWeights::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_acres.is_finite() && self.max_acres.is_finite()) {
            return Err(ConfigError::Invalid("acreage must be finite".into()));
        }
        if self.min_acres < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_acres {} is negative",
                self.min_acres
            )));
        }
        if self.min_acres > self.max_acres {
            return Err(ConfigError::Invalid(format!(
                "min_acres {} exceeds max_acres {}",
                self.min_acres, self.max_acres
            )));
        }
        if let Some((name, w)) = self.weights.all().into_iter().find(|(_, w)| !w.is_finite()) {
            return Err(ConfigError::Invalid(format!("weight '{name}' is {w}")));
        }
        self.search.validate()
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stride == 0 {
            return Err(ConfigError::Invalid("stride must be at least 1".into()));
        }
        if self.min_height == 0 || self.min_width == 0 {
            return Err(ConfigError::Invalid(
                "minimum window dimensions must be non-zero".into(),
            ));
        }
        if self.rotation_step == 0 {
            return Err(ConfigError::Invalid("rotation_step must be at least 1".into()));
        }
        if self.rotation_offsets.is_empty() {
            return Err(ConfigError::Invalid("rotation_offsets is empty".into()));
        }
        if !(self.min_aspect > 0.0 && self.min_aspect <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "min_aspect {} outside (0, 1]",
                self.min_aspect
            )));
        }
        if !(self.rectangularity_threshold > 0.0 && self.rectangularity_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "rectangularity_threshold {} outside (0, 1)",
                self.rectangularity_threshold
            )));
        }
        if !(self.rectangularity_floor > 0.0 && self.rectangularity_floor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "rectangularity_floor {} outside (0, 1]",
                self.rectangularity_floor
            )));
        }
        if !self.primary_boost.is_finite() || self.primary_boost <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "primary_boost {} must be positive",
                self.primary_boost
            )));
        }
        Ok(())
    }
}
