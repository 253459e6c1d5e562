//! Streaming configuration
//!
//! [`RenderConfig`] is the serializable form, loaded from JSON. It converts into
//! [`RenderSettings`], the live values a renderer observes while running.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::observer::Setting;
use crate::core::types::Result;
use crate::streaming::budget::FrameBudget;
use crate::streaming::distance::MAX_RENDER_DISTANCE;

/// Streaming parameters as stored on disk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// View distance in cubes
    pub render_distance: f32,
    /// Draw lines along the world's edges
    pub show_boundaries: bool,
    /// Draw the block texture atlas over the view
    pub debug_texture_allocation: bool,
    /// Build budget per frame with a short backlog (milliseconds)
    pub small_budget_ms: u64,
    /// Build budget per frame with a long backlog (milliseconds)
    pub large_budget_ms: u64,
    /// Add-queue length above which the large budget applies
    pub backlog_threshold: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_distance: 100.0,
            show_boundaries: false,
            debug_texture_allocation: false,
            small_budget_ms: FrameBudget::DEFAULT_SMALL.as_millis() as u64,
            large_budget_ms: FrameBudget::DEFAULT_LARGE.as_millis() as u64,
            backlog_threshold: FrameBudget::DEFAULT_BACKLOG_THRESHOLD,
        }
    }
}

impl RenderConfig {
    /// Parse and validate JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded render config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let distance = self.render_distance;
        if distance.is_nan() || distance <= 0.0 || distance > MAX_RENDER_DISTANCE {
            return Err(Error::Config(format!(
                "render_distance must be in (0, {}], got {}",
                MAX_RENDER_DISTANCE, distance
            )));
        }
        if self.small_budget_ms == 0 || self.large_budget_ms == 0 {
            return Err(Error::Config("frame budgets must be at least 1 ms".to_string()));
        }
        if self.large_budget_ms < self.small_budget_ms {
            return Err(Error::Config(format!(
                "large_budget_ms ({}) is below small_budget_ms ({})",
                self.large_budget_ms, self.small_budget_ms
            )));
        }
        Ok(())
    }

    pub fn frame_budget(&self) -> FrameBudget {
        FrameBudget::new(
            Duration::from_millis(self.small_budget_ms),
            Duration::from_millis(self.large_budget_ms),
            self.backlog_threshold,
        )
    }
}

/// Live settings shared between the host and a renderer
#[derive(Debug)]
pub struct RenderSettings {
    pub render_distance: Setting<f32>,
    pub debug_texture_allocation: Setting<bool>,
    pub show_boundaries: bool,
    pub budget: FrameBudget,
}

impl RenderSettings {
    /// Snapshot back into the serializable form
    pub fn to_config(&self) -> RenderConfig {
        RenderConfig {
            render_distance: self.render_distance.get(),
            show_boundaries: self.show_boundaries,
            debug_texture_allocation: self.debug_texture_allocation.get(),
            small_budget_ms: self.budget.small().as_millis() as u64,
            large_budget_ms: self.budget.large().as_millis() as u64,
            backlog_threshold: self.budget.backlog_threshold(),
        }
    }
}

impl From<&RenderConfig> for RenderSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            render_distance: Setting::new(config.render_distance),
            debug_texture_allocation: Setting::new(config.debug_texture_allocation),
            show_boundaries: config.show_boundaries,
            budget: config.frame_budget(),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}
