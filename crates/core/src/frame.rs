//! Per-frame chart configuration.
//!
//! A [`FrameConfig`] describes the chart state that a single animation frame
//! should show. Sequences of configs are owned by the job that requested
//! them and never mutated after submission.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default seconds-per-transition for chart animations.
pub const DEFAULT_ANIMATION_SPEED: f64 = 2.0;

/// Chart rendering style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Scatter,
    Line,
    Bar,
}

impl ChartType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scatter => "scatter",
            Self::Line => "line",
            Self::Bar => "bar",
        }
    }
}

/// Chart parameters for one animation frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    pub x_column: String,
    pub y_column: String,
    #[serde(default)]
    pub category_column: Option<String>,
    #[serde(default)]
    pub size_column: Option<String>,
    #[serde(default)]
    pub color_column: Option<String>,
    #[serde(default)]
    pub chart_type: ChartType,
    #[serde(default = "default_true")]
    pub animation_enabled: bool,
    #[serde(default = "default_speed")]
    pub animation_speed: f64,
    #[serde(default)]
    pub x_columns: Vec<String>,
    #[serde(default)]
    pub y_columns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_speed() -> f64 {
    DEFAULT_ANIMATION_SPEED
}

impl FrameConfig {
    /// Build a plain scatter frame for the given axis pair.
    pub fn new(x_column: impl Into<String>, y_column: impl Into<String>) -> Self {
        Self {
            x_column: x_column.into(),
            y_column: y_column.into(),
            category_column: None,
            size_column: None,
            color_column: None,
            chart_type: ChartType::default(),
            animation_enabled: true,
            animation_speed: DEFAULT_ANIMATION_SPEED,
            x_columns: Vec::new(),
            y_columns: Vec::new(),
        }
    }

    /// Check the required axis columns and the animation speed.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.x_column.trim().is_empty() {
            return Err(CoreError::Validation("x_column must not be empty".into()));
        }
        if self.y_column.trim().is_empty() {
            return Err(CoreError::Validation("y_column must not be empty".into()));
        }
        if !(self.animation_speed.is_finite() && self.animation_speed > 0.0) {
            return Err(CoreError::Validation(format!(
                "animation_speed must be a positive number, got {}",
                self.animation_speed
            )));
        }
        Ok(())
    }

    /// Every column name this frame reads, in declaration order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.x_column.as_str(), self.y_column.as_str()];
        for optional in [&self.category_column, &self.size_column, &self.color_column] {
            if let Some(name) = optional {
                columns.push(name.as_str());
            }
        }
        columns
    }
}

/// Validate an ordered frame list, reporting the first offending index.
pub fn validate_frames(frames: &[FrameConfig]) -> Result<(), CoreError> {
    if frames.is_empty() {
        return Err(CoreError::Validation(
            "At least one frame configuration is required".into(),
        ));
    }
    for (index, frame) in frames.iter().enumerate() {
        frame.validate().map_err(|e| match e {
            CoreError::Validation(msg) => CoreError::Validation(format!("frame {index}: {msg}")),
            other => other,
        })?;
    }
    Ok(())
}

/// Pair up per-axis column lists into frames, as the recorder does.
///
/// The shorter list is padded by repeating its last entry; an empty list
/// falls back to the other axis' column so every frame stays valid.
pub fn frames_from_axis_lists(x_columns: &[String], y_columns: &[String]) -> Vec<FrameConfig> {
    let len = x_columns.len().max(y_columns.len());
    (0..len)
        .map(|i| {
            let x = x_columns
                .get(i)
                .or_else(|| x_columns.last())
                .or_else(|| y_columns.get(i))
                .cloned()
                .unwrap_or_default();
            let y = y_columns
                .get(i)
                .or_else(|| y_columns.last())
                .or_else(|| x_columns.get(i))
                .cloned()
                .unwrap_or_default();
            FrameConfig::new(x, y)
        })
        .collect()
}
