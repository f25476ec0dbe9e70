//! # Emission Configuration
//!
//! Tunables for the emission core, parsed from JSON.

use serde::{Deserialize, Serialize};

use crate::error::EmissionError;

/// Emission tunables
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EmissionConfig {
    /// Positional/rotational change that enables interpolation across a frame
    #[serde(rename = "interpPositionTolerance")]
    pub interp_position_tolerance: f32,

    /// Scale change that enables interpolation across a frame
    #[serde(rename = "interpScaleTolerance")]
    pub interp_scale_tolerance: f32,

    /// Per-frame emission cap for one sub-emitter
    #[serde(rename = "maxEmitCount")]
    pub max_emit_count: u32,

    /// Upper bound of the density compensation multiplier
    #[serde(rename = "maxDensityAdjust")]
    pub max_density_adjust: f32,

    /// Shortest allowed pulse period (seconds)
    #[serde(rename = "minPulsePeriod")]
    pub min_pulse_period: f32,

    /// Relative change before a force area is repositioned
    #[serde(rename = "forceTolerance")]
    pub force_tolerance: f32,

    /// Nudge length for a degenerate final beam step
    #[serde(rename = "beamSegmentEpsilon")]
    pub beam_segment_epsilon: f32,

    /// Most segments one beam is split into
    #[serde(rename = "maxBeamSegments")]
    pub max_beam_segments: u32,

    /// Rejection sampling attempts for rounded emitter offsets
    #[serde(rename = "maxOffsetAttempts")]
    pub max_offset_attempts: u32,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            interp_position_tolerance: 0.0045,
            interp_scale_tolerance: 1e-5,
            max_emit_count: 2000,
            max_density_adjust: 32.0,
            min_pulse_period: 0.1,
            force_tolerance: 0.01,
            beam_segment_epsilon: 1e-3,
            max_beam_segments: 1000,
            max_offset_attempts: 16,
        }
    }
}

impl EmissionConfig {
    /// Parse config from bytes (JSON)
    pub fn from_bytes(data: &[u8]) -> Result<Self, EmissionError> {
        if data.is_empty() {
            log::warn!("Empty emission config, using defaults");
            return Ok(Self::default());
        }

        Ok(serde_json::from_slice(data)?)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_uses_defaults() {
        let config = EmissionConfig::from_bytes(b"").unwrap();
        assert_eq!(config, EmissionConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EmissionConfig::from_bytes(br#"{"maxEmitCount": 50}"#).unwrap();
        assert_eq!(config.max_emit_count, 50);
        assert_eq!(config.interp_position_tolerance, 0.0045);
        assert_eq!(config.max_beam_segments, 1000);

        let config = EmissionConfig::from_bytes(br#"{"maxBeamSegments": 64}"#).unwrap();
        assert_eq!(config.max_beam_segments, 64);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            EmissionConfig::from_bytes(b"{not json"),
            Err(EmissionError::Config(_))
        ));
    }
}
