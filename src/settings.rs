//! Process-wide presentation settings and the collaborator's configuration file.
//!
//! The engine only observes two scalars: the denominator limit used when
//! rationals are rendered, and the number of decimals used when transient
//! decimal values are rendered. Neither ever changes a stored value.

use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicU32, Ordering::Relaxed},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};

pub const DISPLAY_LIMITS: [u32; 3] = [100, 500, 1000];
pub const DECIMAL_PRECISIONS: [u32; 3] = [3, 6, 9];

static DISPLAY_LIMIT: AtomicU32 = AtomicU32::new(DISPLAY_LIMITS[0]);
static DECIMAL_PRECISION: AtomicU32 = AtomicU32::new(DECIMAL_PRECISIONS[0]);

/// The largest denominator used when a rational is rendered for display.
pub fn display_limit() -> u32 {
    DISPLAY_LIMIT.load(Relaxed)
}

/// Set the display denominator limit. Only 100, 500 and 1000 are accepted.
pub fn set_display_limit(limit: u32) -> Result<()> {
    if !DISPLAY_LIMITS.contains(&limit) {
        return Err(Error::Config(format!(
            "display denominator limit must be one of {:?}, not {}",
            DISPLAY_LIMITS, limit
        )));
    }

    info!(limit, "display denominator limit set");
    DISPLAY_LIMIT.store(limit, Relaxed);
    Ok(())
}

/// The number of decimals used when decimal approximations are rendered.
pub fn decimal_precision() -> u32 {
    DECIMAL_PRECISION.load(Relaxed)
}

/// Set the decimal precision. Only 3, 6 and 9 are accepted.
pub fn set_decimal_precision(precision: u32) -> Result<()> {
    if !DECIMAL_PRECISIONS.contains(&precision) {
        return Err(Error::Config(format!(
            "decimal precision must be one of {:?}, not {}",
            DECIMAL_PRECISIONS, precision
        )));
    }

    info!(precision, "decimal precision set");
    DECIMAL_PRECISION.store(precision, Relaxed);
    Ok(())
}

/// Round `x` to the process-wide decimal precision.
pub fn round_to_precision(x: f64) -> f64 {
    let scale = 10f64.powi(decimal_precision() as i32);
    (x * scale).round() / scale
}

/// The configuration file shared with the collaborator.
///
/// Only `display_limit` and `decimal_precision` are read by the engine; the
/// other fields belong to the user interface and are carried through untouched,
/// as are any keys this version does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_ui_scale")]
    pub ui_scale: f64,
    #[serde(default = "Config::default_appearance_mode")]
    pub appearance_mode: String,
    #[serde(default = "Config::default_theme")]
    pub theme: String,
    #[serde(default = "Config::default_display_limit")]
    pub display_limit: u32,
    #[serde(default = "Config::default_decimal_precision")]
    pub decimal_precision: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ui_scale: Self::default_ui_scale(),
            appearance_mode: Self::default_appearance_mode(),
            theme: Self::default_theme(),
            display_limit: Self::default_display_limit(),
            decimal_precision: Self::default_decimal_precision(),
            extra: Map::new(),
        }
    }
}

impl Config {
    fn default_ui_scale() -> f64 {
        1.0
    }

    fn default_appearance_mode() -> String {
        "system".to_owned()
    }

    fn default_theme() -> String {
        "blue".to_owned()
    }

    fn default_display_limit() -> u32 {
        DISPLAY_LIMITS[0]
    }

    fn default_decimal_precision() -> u32 {
        DECIMAL_PRECISIONS[0]
    }

    /// Load the configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Push the values the engine observes into the process-wide settings.
    pub fn apply(&self) -> Result<()> {
        set_display_limit(self.display_limit)?;
        set_decimal_precision(self.decimal_precision)
    }
}
