use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Runtime options of one solver run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Tetrahedral grid subdivisions along each axis of the domain box.
    pub resolution: u32,
    pub aabb_min: [f64; 3],
    pub aabb_max: [f64; 3],
    /// Arrangement lookup-table file; the general kernel is used when
    /// absent.
    #[serde(default)]
    pub lut_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self { resolution: 16, aabb_min: [-1.0; 3], aabb_max: [1.0; 3], lut_path: None }
    }
}

impl Config {
    /// Read from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfiguration(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidConfiguration(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range options.
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(Error::InvalidConfiguration("resolution must be positive".into()));
        }
        if !self
            .aabb_min
            .iter()
            .zip(&self.aabb_max)
            .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo < hi)
        {
            return Err(Error::InvalidConfiguration(
                "aabb_min must be componentwise below aabb_max".into(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn aabb_min(&self) -> DVec3 {
        DVec3::from_array(self.aabb_min)
    }

    #[inline]
    pub fn aabb_max(&self) -> DVec3 {
        DVec3::from_array(self.aabb_max)
    }
}
