//! Tome configuration system.
//!
//! TOML-based configuration with validation, a closed locale registry,
//! and an explicit shared-settings object that publishes change events.
//! All sections use sensible defaults so partial configs work out of the
//! box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tome_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("api base: {}", config.api.base_url);
//! ```

pub mod locale;
pub mod schema;
pub mod settings;
pub mod toml_loader;
pub mod validation;

pub use locale::{DictionaryLoader, Locale, LocaleRegistry};
pub use schema::{ApiConfig, AuthConfig, LocaleConfig, TomeConfig};
pub use settings::Settings;
pub use toml_loader::{create_default_config, default_config_path, load_from_path};

use tome_common::ConfigError;

/// Load config from the platform default path and validate it.
///
/// A missing file creates a commented default first; an invalid one fails
/// here rather than at first use.
pub fn load_config() -> Result<TomeConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}
