use serde::{Deserialize, Serialize};

/// Rendering and parser configuration for a script session.
///
/// Scripts are not subject to CPU or memory quotas. The depth limits below
/// only keep a pathological script from overflowing the host stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Resolution, in dots per inch, for figures that don't set their own.
    pub dpi: f64,
    /// Physical size `(width, height)` in inches for `figure()`.
    pub default_size: (f64, f64),
    /// Maximum call stack depth.
    pub max_call_levels: usize,
    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,
    /// Maximum depth for function expressions.
    pub max_function_expr_depth: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            dpi: 100.0,
            default_size: (6.4, 4.8),
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
        }
    }
}

impl ScriptConfig {
    /// Set the default resolution.
    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    /// Set the default figure size in inches.
    pub fn with_default_size(mut self, width: f64, height: f64) -> Self {
        self.default_size = (width, height);
        self
    }

    /// Pixel dimensions of a default-size figure.
    pub fn default_size_pixels(&self) -> (u32, u32) {
        (
            (self.default_size.0 * self.dpi).round() as u32,
            (self.default_size.1 * self.dpi).round() as u32,
        )
    }

    /// Check that the rendering defaults describe a drawable figure.
    pub fn validate(&self) -> Result<(), String> {
        let (w, h) = self.default_size;
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(format!("dpi must be a positive number, got {}", self.dpi));
        }
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(format!(
                "default_size must be positive, got ({w}, {h})"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_size_pixels() {
        let config = ScriptConfig::default();
        assert_eq!(config.default_size_pixels(), (640, 480));

        let config = ScriptConfig::default().with_dpi(150.0);
        assert_eq!(config.default_size_pixels(), (960, 720));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: ScriptConfig = serde_json::from_str(r#"{"dpi": 72}"#).unwrap();
        assert_eq!(config.dpi, 72.0);
        assert_eq!(config.default_size, (6.4, 4.8));
        assert_eq!(config.max_call_levels, 64);
    }

    #[test]
    fn test_validate() {
        assert!(ScriptConfig::default().validate().is_ok());
        assert!(ScriptConfig::default().with_dpi(0.0).validate().is_err());
        assert!(
            ScriptConfig::default()
                .with_default_size(-1.0, 2.0)
                .validate()
                .is_err()
        );
    }
}
