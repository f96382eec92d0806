//! Typed reads over the current snapshot.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::store::Config;
use crate::value::FromValue;

impl Config {
    /// Look up `key` and convert it to `T`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::KeyNotFound`] when absent, [`ConfigError::TypeMismatch`]
    /// when the stored value cannot be converted.
    pub fn get<T: FromValue>(&self, key: &str) -> ConfigResult<T> {
        let data = self.current();
        let value = data.get(key).ok_or_else(|| ConfigError::KeyNotFound {
            key: key.to_string(),
        })?;
        T::from_value(value).map_err(|cause| ConfigError::mismatch(key, cause))
    }

    /// Like [`Config::get`], returning `fallback` on any error.
    pub fn get_or<T: FromValue>(&self, key: &str, fallback: T) -> T {
        self.get(key).unwrap_or(fallback)
    }

    /// Like [`Config::get`] for configuration the process cannot start without.
    ///
    /// # Panics
    ///
    /// Panics if the key is missing or has the wrong type. Use at startup,
    /// not on request paths.
    pub fn must_get<T: FromValue>(&self, key: &str) -> T {
        match self.get(key) {
            Ok(value) => value,
            Err(e) => panic!("layerconf: {}", e),
        }
    }
}
