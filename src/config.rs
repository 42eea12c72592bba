//! Configuration for proto-importer.
//!
//! Process-wide defaults picked up by every new
//! [`Importer`](crate::compile::Importer). Use [`ConfigBuilder`] once at
//! application startup; an importer can still be given its own [`Config`]
//! with [`Importer::with_config`](crate::compile::Importer::with_config).

use std::sync::OnceLock;

use crate::diagnostic::DiagnosticOptions;

/// Global configuration, initialized via [`ConfigBuilder::init`].
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Default schema file extension.
pub const DEFAULT_EXTENSION: &str = "proto";

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Extension (without the dot) of schema files found by directory
    /// discovery.
    pub extension: String,
    /// Warn about imports whose declarations are never referenced.
    pub warn_unused_imports: bool,
    /// How diagnostics are rendered by default.
    pub diagnostics: DiagnosticOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_owned(),
            warn_unused_imports: false,
            diagnostics: DiagnosticOptions::default(),
        }
    }
}

/// Configuration builder for fluent API.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    extension: Option<String>,
    warn_unused_imports: Option<bool>,
    diagnostics: Option<DiagnosticOptions>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema file extension used for discovery.
    ///
    /// A leading dot is ignored. Default: `proto`.
    ///
    /// # Example
    ///
    /// ```
    /// use proto_importer::config::ConfigBuilder;
    ///
    /// let config = ConfigBuilder::new().extension(".protodevel").build();
    /// assert_eq!(config.extension, "protodevel");
    /// ```
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = Some(extension.trim_start_matches('.').to_owned());
        self
    }

    /// Enable or disable unused-import warnings. Default: off.
    pub fn warn_unused_imports(mut self, enabled: bool) -> Self {
        self.warn_unused_imports = Some(enabled);
        self
    }

    /// Set the default diagnostic rendering.
    pub fn diagnostics(mut self, options: DiagnosticOptions) -> Self {
        self.diagnostics = Some(options);
        self
    }

    /// Build a configuration without installing it globally.
    pub fn build(self) -> Config {
        let defaults = Config::default();
        Config {
            extension: self.extension.unwrap_or(defaults.extension),
            warn_unused_imports: self.warn_unused_imports.unwrap_or(defaults.warn_unused_imports),
            diagnostics: self.diagnostics.unwrap_or(defaults.diagnostics),
        }
    }

    /// Build and initialize the global configuration.
    ///
    /// This can only be called once. Subsequent calls are ignored.
    /// Returns `true` if configuration was set, `false` if already initialized.
    pub fn init(self) -> bool {
        CONFIG.set(self.build()).is_ok()
    }
}

/// Initialize with default configuration.
///
/// This is equivalent to `ConfigBuilder::new().init()`.
pub fn init_default() -> bool {
    ConfigBuilder::new().init()
}

/// Get the current configuration, or default if not initialized.
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DisplayStyle;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.extension, "proto");
        assert!(!config.warn_unused_imports);
    }

    #[test]
    fn test_builder() {
        let config = ConfigBuilder::new()
            .extension(".proto3")
            .warn_unused_imports(true)
            .diagnostics(DiagnosticOptions::short())
            .build();
        assert_eq!(config.extension, "proto3");
        assert!(config.warn_unused_imports);
        assert_eq!(config.diagnostics.style, DisplayStyle::Short);
    }
}
