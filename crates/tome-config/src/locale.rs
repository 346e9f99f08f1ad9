//! Locale registry.
//!
//! The set of supported locales is a closed enum: parsing an unknown tag
//! is a `ConfigError::UnknownLocale`, never a silent fallthrough.
//! Dictionary content itself is a host concern; this module only maps each
//! locale to the loader capability the host registered for it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tome_common::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "zh-CN")]
    ZhCn,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::EnUs, Locale::ZhCn];

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::EnUs => "en-US",
            Locale::ZhCn => "zh-CN",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::ALL
            .into_iter()
            .find(|l| l.tag() == s)
            .ok_or_else(|| ConfigError::UnknownLocale(s.to_string()))
    }
}

/// Produces the dictionary payload for one locale.
pub type DictionaryLoader = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

/// Finite map from locale to dictionary loader.
#[derive(Default)]
pub struct LocaleRegistry {
    loaders: HashMap<Locale, DictionaryLoader>,
}

impl LocaleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, locale: Locale, loader: DictionaryLoader) {
        self.loaders.insert(locale, loader);
    }

    /// Look up the loader for a locale. A supported locale with no
    /// registered loader is a configuration error, surfaced immediately.
    pub fn loader(&self, locale: Locale) -> Result<&DictionaryLoader, ConfigError> {
        self.loaders.get(&locale).ok_or_else(|| {
            ConfigError::ValidationError(format!("no dictionary registered for {locale}"))
        })
    }
}
