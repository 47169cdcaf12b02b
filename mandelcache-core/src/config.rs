//! Cache and recurrence configuration.
//!
//! `DEFAULT_CACHE_CONFIG` is the canonical source of truth for the tunables;
//! collaborators may override any subset of fields from JSON.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Numeric containment applied to the recurrence state after every step.
///
/// Containment keeps diverging iterates finite so that the derived value stays
/// displayable everywhere. Once it fires the state no longer follows the true
/// recurrence: it is a visual stability trade-off, not a precision guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Containment {
    /// Raw recurrence; diverging points overflow and hit the sentinel.
    Off,
    /// A component whose magnitude exceeds `threshold` is replaced by the
    /// natural log of its magnitude.
    Logarithmic { threshold: f64 },
    /// A component whose magnitude exceeds `cutoff` is squashed to
    /// `tanh(z / cutoff) * cutoff`.
    SoftSaturation { cutoff: f64 },
}

impl Containment {
    /// Clamp a single state component.
    ///
    /// Returns the contained value and whether containment fired.
    #[inline]
    pub fn apply(&self, component: f64) -> (f64, bool) {
        match *self {
            Containment::Off => (component, false),
            Containment::Logarithmic { threshold } => {
                if component > threshold || component < -threshold {
                    (component.abs().ln(), true)
                } else {
                    (component, false)
                }
            }
            Containment::SoftSaturation { cutoff } => {
                if component > cutoff || component < -cutoff {
                    ((component / cutoff).tanh() * cutoff, true)
                } else {
                    (component, false)
                }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Containment::Off)
    }
}

impl Default for Containment {
    fn default() -> Self {
        DEFAULT_CACHE_CONFIG.containment
    }
}

/// Tunables for the recurrence evaluator, the evaluation cache and the grid
/// evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Containment policy for the recurrence state.
    pub containment: Containment,
    /// Substituted for any derived value that is not finite.
    pub divergence_sentinel: f64,
    /// Fraction of the viewport width/height kept on each side by
    /// viewport-based eviction.
    pub retention_margin: f64,
    /// Largest iteration gap across which an entry is still kept as a resume
    /// point for an active target.
    pub resume_window: u32,
    /// Number of distinct recent iteration targets treated as active.
    pub recent_targets: usize,
    /// Dispatch grid rows across the rayon thread pool.
    pub parallel: bool,
}

/// Default configuration.
pub static DEFAULT_CACHE_CONFIG: CacheConfig = CacheConfig {
    containment: Containment::Logarithmic { threshold: 1000.0 },
    divergence_sentinel: 1000.0,
    retention_margin: 0.5,
    resume_window: 10_000,
    recent_targets: 4,
    parallel: false,
};

impl Default for CacheConfig {
    fn default() -> Self {
        DEFAULT_CACHE_CONFIG
    }
}

impl CacheConfig {
    /// Parse a config from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.containment {
            Containment::Off => {}
            Containment::Logarithmic { threshold } => {
                // ln(threshold) must stay below threshold or containment
                // would keep firing on its own output.
                if !(threshold.is_finite() && threshold > 1.0) {
                    return Err(ConfigError::Invalid(format!(
                        "logarithmic containment threshold must be finite and > 1, got {threshold}"
                    )));
                }
            }
            Containment::SoftSaturation { cutoff } => {
                if !(cutoff.is_finite() && cutoff > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "soft saturation cutoff must be finite and > 0, got {cutoff}"
                    )));
                }
            }
        }
        if !self.divergence_sentinel.is_finite() {
            return Err(ConfigError::Invalid(
                "divergence sentinel must be finite".to_string(),
            ));
        }
        if !(self.retention_margin.is_finite() && self.retention_margin >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "retention margin must be finite and >= 0, got {}",
                self.retention_margin
            )));
        }
        Ok(())
    }

    pub fn with_containment(self, containment: Containment) -> Self {
        Self {
            containment,
            ..self
        }
    }

    pub fn with_parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = CacheConfig::default();
        assert_eq!(
            config.containment,
            Containment::Logarithmic { threshold: 1000.0 }
        );
        assert_eq!(config.divergence_sentinel, 1000.0);
        assert_eq!(config.retention_margin, 0.5);
        assert_eq!(config.recent_targets, 4);
        assert!(!config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn logarithmic_containment_compresses_large_components() {
        let containment = Containment::Logarithmic { threshold: 1000.0 };
        assert_eq!(containment.apply(999.0), (999.0, false));
        let (value, fired) = containment.apply(-1.0e6);
        assert!(fired);
        assert!((value - 1.0e6_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn soft_saturation_stays_below_cutoff() {
        let containment = Containment::SoftSaturation { cutoff: 100.0 };
        assert_eq!(containment.apply(50.0), (50.0, false));
        let (value, fired) = containment.apply(1.0e300);
        assert!(fired);
        assert!(value <= 100.0 && value > 76.0);
        let (value, _) = containment.apply(-1.0e300);
        assert!(value >= -100.0 && value < -76.0);
    }

    #[test]
    fn containment_off_passes_through() {
        assert_eq!(Containment::Off.apply(1.0e308), (1.0e308, false));
        assert!(!Containment::Off.is_enabled());
    }

    #[test]
    fn from_json_fills_missing_fields_with_defaults() {
        let config = CacheConfig::from_json(r#"{ "parallel": true }"#).unwrap();
        assert!(config.parallel);
        assert_eq!(config.divergence_sentinel, 1000.0);
        assert_eq!(config.containment, DEFAULT_CACHE_CONFIG.containment);
    }

    #[test]
    fn from_json_parses_tagged_containment() {
        let config = CacheConfig::from_json(
            r#"{ "containment": { "kind": "soft_saturation", "cutoff": 50.0 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.containment,
            Containment::SoftSaturation { cutoff: 50.0 }
        );

        let config = CacheConfig::from_json(r#"{ "containment": { "kind": "off" } }"#).unwrap();
        assert_eq!(config.containment, Containment::Off);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(matches!(
            CacheConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn from_json_rejects_invalid_tunables() {
        let result = CacheConfig::from_json(
            r#"{ "containment": { "kind": "logarithmic", "threshold": 0.5 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = CacheConfig::from_json(r#"{ "retention_margin": -1.0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn builder_helpers_override_single_fields() {
        let config = CacheConfig::default()
            .with_containment(Containment::Off)
            .with_parallel(true);
        assert_eq!(config.containment, Containment::Off);
        assert!(config.parallel);
        assert_eq!(config.resume_window, DEFAULT_CACHE_CONFIG.resume_window);
    }
}
