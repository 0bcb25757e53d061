use serde::{Deserialize, Serialize};
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use crate::storage::buffer::DEFAULT_POOL_PAGES;
use crate::storage::page::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub page_size: usize,
    pub buffer_pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub color: bool,
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_size: DEFAULT_POOL_PAGES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            color: true,
            log_to_file: false,
            log_file: "log/heapdb.log".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.page_size == 0 {
            bail!("storage.page_size must be greater than zero");
        }
        if self.storage.buffer_pool_size == 0 {
            bail!("storage.buffer_pool_size must be greater than zero");
        }
        Ok(())
    }
}

pub struct ConfigManager {
    pub root_dir: PathBuf,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let root_dir = directories::ProjectDirs::from("com", "heapdb", "heapdb")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".heapdb"));
        Ok(Self::with_root(root_dir))
    }

    pub fn with_root(root_dir: PathBuf) -> Self {
        let config_dir = root_dir.join("config");
        let data_dir = root_dir.join("data");
        Self {
            root_dir,
            config_dir,
            data_dir,
        }
    }

    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_dir)?;
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.root_dir.join("log"))?;

        if !self.config_path().exists() {
            self.save_config(&Config::default())?;
        }
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_path(&self, config: &Config) -> PathBuf {
        self.root_dir.join(&config.logging.log_file)
    }

    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        if path.exists() {
            Config::load_from_file(path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let content = toml::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.page_size, 4096);
        assert_eq!(config.storage.buffer_pool_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_manager_init_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_root(temp_dir.path().to_path_buf());

        // No file yet: falls back to defaults
        assert_eq!(manager.load_config().unwrap(), Config::default());

        manager.init().unwrap();
        assert!(manager.config_path().exists());
        assert!(manager.data_dir().exists());

        let mut config = manager.load_config().unwrap();
        config.storage.buffer_pool_size = 8;
        manager.save_config(&config).unwrap();

        let reloaded = manager.load_config().unwrap();
        assert_eq!(reloaded.storage.buffer_pool_size, 8);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(
            &path,
            "[storage]\npage_size = 4096\nbuffer_pool_size = 0\n\n[logging]\ncolor = false\nlog_to_file = false\nlog_file = \"x.log\"\n",
        )
        .unwrap();

        assert!(Config::load_from_file(&path).is_err());
    }
}
