use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "command-argus";
pub const STORE_ENV: &str = "ARGUS_STORE";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub execution: ExecutionConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    // Registry file; platform data dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub default_use_shell: bool,
    // Interpreter and its "run this string" flag, e.g. ["bash", "-c"]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<Vec<String>>,
    pub shim_program: String,
    pub shim_args: Vec<String>,
    // Appended to PATH when missing
    pub extra_path_dirs: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let extra_path_dirs = if cfg!(target_os = "macos") {
            ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin", "/usr/sbin", "/sbin"]
                .iter()
                .map(PathBuf::from)
                .collect()
        } else {
            Vec::new()
        };

        Self {
            default_use_shell: false,
            shell: None,
            shim_program: "mise".to_string(),
            shim_args: vec!["exec".to_string(), "--".to_string()],
            extra_path_dirs,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { language: "auto".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "warn".to_string() }
    }
}

impl Config {
    /// Loads the user config, writing the defaults on first use.
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Registry location: `ARGUS_STORE`, then `storage.path`, then the data dir.
    pub fn store_path(&self) -> PathBuf {
        if let Some(path) = std::env::var_os(STORE_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        self.storage
            .path
            .clone()
            .unwrap_or_else(Self::default_store_path)
    }

    pub fn default_store_path() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("commands.json")
    }

    pub fn get_effective_language(&self) -> String {
        if self.display.language == "auto" {
            std::env::var("LANG")
                .unwrap_or_else(|_| "en_US".to_string())
                .split('.')
                .next()
                .unwrap_or("en")
                .to_string()
        } else {
            self.display.language.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_roundtrip_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::default();
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[execution]\nshell = [\"bash\", \"-lc\"]\n\n[storage]\npath = \"/tmp/cmds.json\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.execution.shell, Some(vec!["bash".to_string(), "-lc".to_string()]));
        assert_eq!(config.execution.shim_program, "mise");
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/cmds.json")));
        assert_eq!(config.logging.filter, "warn");
        assert_eq!(config.display.language, "auto");
    }

    #[test]
    fn test_unparseable_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[execution\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_explicit_language_wins() {
        let mut config = Config::default();
        config.display.language = "zh".to_string();
        assert_eq!(config.get_effective_language(), "zh");
    }
}
