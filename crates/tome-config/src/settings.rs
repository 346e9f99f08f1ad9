//! Shared settings state.
//!
//! `Settings` owns the loaded config and the event bus, and is passed into
//! components explicitly instead of living behind a global. All settings
//! changes are published from here, so "the locale changed" has exactly
//! one source.

use tokio::sync::broadcast;
use tracing::info;

use tome_common::{AppEvent, EventBus};

use crate::locale::Locale;
use crate::schema::TomeConfig;

pub struct Settings {
    config: TomeConfig,
    bus: EventBus,
}

impl Settings {
    pub fn new(config: TomeConfig) -> Self {
        Self {
            config,
            bus: EventBus::default(),
        }
    }

    pub fn config(&self) -> &TomeConfig {
        &self.config
    }

    /// Current locale. The tag was validated on load, so an unparseable
    /// value here means the config was mutated without validation.
    pub fn locale(&self) -> Result<Locale, tome_common::ConfigError> {
        self.config.locale.default.parse()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.bus.subscribe()
    }

    pub fn set_locale(&mut self, locale: Locale) {
        if self.config.locale.default == locale.tag() {
            return;
        }
        self.config.locale.default = locale.tag().to_string();
        info!("locale changed to {locale}");
        self.bus.publish(AppEvent::LocaleChanged(locale.tag().into()));
    }

    /// Replace the whole config, e.g. after the file changed on disk.
    pub fn reload(&mut self, config: TomeConfig) {
        let locale_changed = self.config.locale.default != config.locale.default;
        self.config = config;
        self.bus.publish(AppEvent::ConfigReloaded);
        if locale_changed {
            self.bus
                .publish(AppEvent::LocaleChanged(self.config.locale.default.clone()));
        }
    }
}
