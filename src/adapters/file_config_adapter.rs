//! INI file configuration adapter.

use crate::domain::error::LadderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LadderError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LadderError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", path.display()),
            )));
        }
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| LadderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, LadderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| LadderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// No sections; every lookup falls back to its default.
    pub fn empty() -> Self {
        Self { config: Ini::new() }
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
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

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_sections() {
        let content = r#"
[strategy]
leverage = 25
maker_fee = 0.0002

[signals]
thresholds = 5:0.01,10:0.015

[backtest]
month = 2025-03
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_int("strategy", "leverage", 0), 25);
        assert_eq!(
            adapter.get_string("signals", "thresholds"),
            Some("5:0.01,10:0.015".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "month"),
            Some("2025-03".to_string())
        );
    }

    #[test]
    fn missing_keys_fall_back() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nleverage = 20\n").unwrap();
        assert_eq!(adapter.get_string("strategy", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_int("strategy", "missing", 42), 42);
        assert_eq!(adapter.get_double("strategy", "missing", 99.9), 99.9);
    }

    #[test]
    fn non_numeric_values_fall_back() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nleverage = abc\nmaker_fee = x\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "leverage", 20), 20);
        assert_eq!(adapter.get_double("strategy", "maker_fee", 0.5), 0.5);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\ninitial_margin = 2000.5\n").unwrap();
        assert_eq!(adapter.get_double("strategy", "initial_margin", 0.0), 2000.5);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("backtest", "a", false));
        assert!(adapter.get_bool("backtest", "b", false));
        assert!(adapter.get_bool("backtest", "c", false));
        assert!(!adapter.get_bool("backtest", "d", true));
        assert!(!adapter.get_bool("backtest", "e", true));
        assert!(!adapter.get_bool("backtest", "f", true));
        assert!(adapter.get_bool("backtest", "missing", true));
    }

    #[test]
    fn get_double_list_parses_commas() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\ndrop_fractions = 0.01, 0.02,0.03\nbad = 0.01,x\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_double_list("strategy", "drop_fractions"),
            Some(Ok(vec![0.01, 0.02, 0.03]))
        );
        assert_eq!(
            adapter.get_double_list("strategy", "bad"),
            Some(Err("x".to_string()))
        );
        assert_eq!(adapter.get_double_list("strategy", "missing"), None);
    }

    #[test]
    fn empty_adapter_has_no_values() {
        let adapter = FileConfigAdapter::empty();
        assert_eq!(adapter.get_string("strategy", "leverage"), None);
        assert_eq!(adapter.get_int("strategy", "leverage", 20), 20);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[report]\ntimezone = Asia/Seoul\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("report", "timezone"),
            Some("Asia/Seoul".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(LadderError::Io(_))));
    }
}
