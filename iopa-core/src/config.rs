//! Reconstruction configuration

/// Default cap on `null` slots a single operation may pad an array with
pub const DEFAULT_MAX_ARRAY_PADDING: usize = 10_000;

/// Environment variable enabling strict path handling
pub const ENV_STRICT_PATHS: &str = "IOPA_STRICT_PATHS";

/// Environment variable overriding the array padding cap
pub const ENV_MAX_ARRAY_PADDING: &str = "IOPA_MAX_ARRAY_PADDING";

/// Options for trace reconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructConfig {
    /// Reject malformed operations instead of skipping them
    pub strict_paths: bool,
    /// Largest number of `null` slots one operation may pad an array with
    pub max_array_padding: usize,
}

impl ReconstructConfig {
    /// Create a new configuration builder
    pub fn builder() -> ReconstructConfigBuilder {
        ReconstructConfigBuilder::default()
    }

    /// Defaults overridden by `IOPA_STRICT_PATHS` and `IOPA_MAX_ARRAY_PADDING`
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut builder = Self::builder();
        if let Some(raw) = lookup(ENV_STRICT_PATHS) {
            match parse_flag(&raw) {
                Some(strict) => builder = builder.strict_paths(strict),
                None => tracing::warn!("Ignoring {}={:?}: expected a boolean", ENV_STRICT_PATHS, raw),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_ARRAY_PADDING) {
            match raw.trim().parse::<usize>() {
                Ok(limit) => builder = builder.max_array_padding(limit),
                Err(_) => tracing::warn!("Ignoring {}={:?}: expected a number", ENV_MAX_ARRAY_PADDING, raw),
            }
        }
        builder.build()
    }
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            strict_paths: false,
            max_array_padding: DEFAULT_MAX_ARRAY_PADDING,
        }
    }
}

/// Builder for ReconstructConfig
#[derive(Debug, Default)]
pub struct ReconstructConfigBuilder {
    strict_paths: Option<bool>,
    max_array_padding: Option<usize>,
}

impl ReconstructConfigBuilder {
    /// Reject malformed operations
    pub fn strict_paths(mut self, strict: bool) -> Self {
        self.strict_paths = Some(strict);
        self
    }

    /// Set the array padding cap
    pub fn max_array_padding(mut self, limit: usize) -> Self {
        self.max_array_padding = Some(limit);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ReconstructConfig {
        ReconstructConfig {
            strict_paths: self.strict_paths.unwrap_or(false),
            max_array_padding: self.max_array_padding.unwrap_or(DEFAULT_MAX_ARRAY_PADDING),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
