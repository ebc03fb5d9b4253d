use derive_builder::Builder;
use serde::Deserialize;
use serde_with::{DisplayFromStr, DurationMilliSeconds, serde_as};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::search::DEFAULT_RECENT_LIMIT;
use crate::{Error, Result};

#[serde_as]
#[derive(Deserialize, Debug, Clone, Builder)]
#[serde(default)]
#[builder(default)]
pub struct Config {
    /// Endpoint of the spreadsheet-backed store; every action is a POST here.
    pub store_url: Url,

    /// Additional attempts after a transport failure.
    pub max_retries: u32,

    #[serde(rename = "retry_base_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_base_delay: Duration,

    #[builder(setter(into, strip_option))]
    pub cache_path: Option<PathBuf>,

    pub tagging_url: Url,

    #[builder(setter(into, strip_option))]
    pub tagging_api_key: Option<String>,

    #[builder(setter(into))]
    pub tagging_model: String,

    /// Abort the save when keyword tagging fails instead of storing no tags.
    pub tagging_required: bool,

    pub recent_limit: usize,

    #[serde_as(as = "DisplayFromStr")]
    pub log: tracing::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: Url::from_str("http://localhost:8080/exec").unwrap(),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1000),
            cache_path: None,
            tagging_url: Url::from_str("https://api.openai.com/v1").unwrap(),
            tagging_api_key: None,
            tagging_model: String::from("gpt-4o-mini"),
            tagging_required: false,
            recent_limit: DEFAULT_RECENT_LIMIT,
            log: tracing::Level::INFO,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(config::Config::builder()
            .add_source(config::Environment::with_prefix("DOCREG"))
            .build()
            .and_then(|c| c.try_deserialize::<Config>())?)
    }

    /// Environment variables override values from the optional file, which
    /// is read as TOML whatever its extension.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("DOCREG"))
            .build()
            .and_then(|c| c.try_deserialize::<Config>())?)
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .ok_or(Error::Other("Could not determine data directory"))?;

        Ok(data_dir.join("doc-registry").join("cache.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.recent_limit, DEFAULT_RECENT_LIMIT);
        assert!(!config.tagging_required);
    }

    #[test]
    fn test_builder_keeps_defaults() {
        let config = ConfigBuilder::default()
            .max_retries(5)
            .cache_path("/tmp/registry.db")
            .build()
            .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_base_delay, Duration::from_millis(1000));
        assert_eq!(
            config.cache_path().unwrap(),
            PathBuf::from("/tmp/registry.db")
        );
    }

    #[test]
    fn test_load_toml() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("docreg-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "store_url = \"https://script.example.com/exec\"\n\
             retry_base_delay_ms = 250\n\
             tagging_required = true\n\
             log = \"debug\"\n",
        )?;

        let config = Config::load(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(config.store_url.as_str(), "https://script.example.com/exec");
        assert_eq!(config.retry_base_delay, Duration::from_millis(250));
        assert!(config.tagging_required);
        assert_eq!(config.log, tracing::Level::DEBUG);
        assert_eq!(config.max_retries, 2);

        Ok(())
    }

    #[test]
    fn test_load_file_without_extension() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("docreg-{}-conf", std::process::id()));
        std::fs::write(&path, "max_retries = 4\nrecent_limit = 25\n")?;

        let config = Config::load(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(config.max_retries, 4);
        assert_eq!(config.recent_limit, 25);

        Ok(())
    }
}
