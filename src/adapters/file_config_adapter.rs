//! INI file configuration adapter.
//!
//! Values are trimmed and a key with an empty value (`tickers =`) reads as
//! absent, so commenting out the right-hand side restores the default.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    ini: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut ini = Ini::new();
        ini.load(path.as_ref()).map_err(std::io::Error::other)?;
        Ok(Self { ini })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut ini = Ini::new();
        ini.read(content.to_string())?;
        Ok(Self { ini })
    }

    /// Empty configuration; every getter falls back to its default.
    pub fn empty() -> Self {
        Self { ini: Ini::new() }
    }

    fn value(&self, section: &str, key: &str) -> Option<String> {
        self.ini
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.value(section, key)
    }

    /// Accepts integral floats such as `10.0`.
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        let Some(raw) = self.value(section, key) else {
            return default;
        };
        raw.parse::<i64>()
            .ok()
            .or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                    .map(|v| v as i64)
            })
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.value(section, key)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(default)
    }
}
