use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub coldlist: ColdlistConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub leads: LeadsConfig,
}

/// Core settings
#[derive(Debug, Clone, Deserialize)]
pub struct ColdlistConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory holding the numbered `.sql` schema migrations.
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

/// Import pipeline tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Leads per insert call handed to the store.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Leads removed per statement when a list is deleted.
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delete_batch_size: default_delete_batch_size(),
        }
    }
}

/// Lead comparison settings
#[derive(Debug, Clone, Deserialize)]
pub struct LeadsConfig {
    /// National dialling prefix stripped before phone numbers are compared (e.g. "370").
    #[serde(default)]
    pub phone_prefix: Option<String>,
    #[serde(default = "default_min_phone_digits")]
    pub min_phone_digits: usize,
    /// Shorter company codes are not compared.
    #[serde(default = "default_min_company_code_len")]
    pub min_company_code_len: usize,
}

impl Default for LeadsConfig {
    fn default() -> Self {
        Self {
            phone_prefix: None,
            min_phone_digits: default_min_phone_digits(),
            min_company_code_len: default_min_company_code_len(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_batch_size() -> usize {
    100
}

fn default_delete_batch_size() -> usize {
    500
}

fn default_min_phone_digits() -> usize {
    6
}

fn default_min_company_code_len() -> usize {
    5
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in COLDLIST_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("COLDLIST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.import.batch_size == 0 {
            anyhow::bail!("import.batch_size must be greater than 0");
        }

        if self.import.delete_batch_size == 0 {
            anyhow::bail!("import.delete_batch_size must be greater than 0");
        }

        if self.leads.min_phone_digits == 0 {
            anyhow::bail!("leads.min_phone_digits must be greater than 0");
        }

        if self.leads.min_company_code_len == 0 {
            anyhow::bail!("leads.min_company_code_len must be greater than 0");
        }

        if let Some(prefix) = &self.leads.phone_prefix {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
                anyhow::bail!("leads.phone_prefix must contain digits only, got {:?}", prefix);
            }
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.coldlist.db_path
    }

    /// Get migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.coldlist.migrations_dir
    }
}
