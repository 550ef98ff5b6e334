//! INI file configuration adapter.

use crate::domain::decimal::parse_decimal;
use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use rust_decimal::Decimal;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| EngineError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_decimal(&self, section: &str, key: &str, default: Decimal) -> Decimal {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(parse_decimal)
            .unwrap_or(default)
    }
}
