use serde::{Deserialize, Serialize};

const DEFAULT_PLACEHOLDER: &str = "Toggle";
const DEFAULT_CONTENT: &str = "Empty toggle. Click or drop blocks inside.";
const DEFAULT_MAX_SETTLE_ITERATIONS: usize = 10_000;

pub const ENABLE_LINE_BREAKS: bool = true;
pub const READ_ONLY_SUPPORTED: bool = true;

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_content() -> String {
    DEFAULT_CONTENT.to_string()
}

/// User-facing options of the toggle tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleConfig {
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default = "default_content")]
    pub default_content: String,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
            default_content: default_content(),
        }
    }
}

impl ToggleConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub read_only: bool,
    pub max_settle_iterations: usize,
}

impl EngineOptions {
    pub fn with_defaults(mut self) -> Self {
        if self.max_settle_iterations == 0 {
            self.max_settle_iterations = DEFAULT_MAX_SETTLE_ITERATIONS;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolbox {
    pub title: String,
    pub icon: String,
}

impl Default for Toolbox {
    fn default() -> Self {
        Self {
            title: "Toggle".to_string(),
            icon: "toggle-icon".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = ToggleConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ToggleConfig::default());
        assert_eq!(config.placeholder, "Toggle");
        assert_eq!(
            config.default_content,
            "Empty toggle. Click or drop blocks inside."
        );
    }

    #[test]
    fn provided_fields_override_defaults() {
        let config =
            ToggleConfig::from_json_str(r#"{"placeholder":"Details","defaultContent":"Nothing"}"#)
                .unwrap();
        assert_eq!(config.placeholder, "Details");
        assert_eq!(config.default_content, "Nothing");
    }

    #[test]
    fn zero_settle_bound_uses_default() {
        let options = EngineOptions::default().with_defaults();
        assert_eq!(options.max_settle_iterations, DEFAULT_MAX_SETTLE_ITERATIONS);
        assert!(!options.read_only);
    }
}
