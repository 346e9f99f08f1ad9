//! Config validation.

use tome_common::ConfigError;

use crate::locale::Locale;
use crate::schema::TomeConfig;

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::ValidationError(format!("{field} is empty")));
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "{field} must start with http:// or https://, got '{value}'"
        )));
    }
    Ok(())
}

pub fn validate(config: &TomeConfig) -> Result<(), ConfigError> {
    check_url("api.base_url", &config.api.base_url)?;
    check_url("api.backend_origin", &config.api.backend_origin)?;

    if config.api.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "api.connect_timeout_secs must be greater than zero".into(),
        ));
    }
    if config.api.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "api.request_timeout_secs must be greater than zero".into(),
        ));
    }

    // Fail fast on an unknown locale tag instead of letting lookups miss later.
    config.locale.default.parse::<Locale>()?;

    Ok(())
}
