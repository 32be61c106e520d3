use dotenv::dotenv;
use log::*;

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

/**
 * Runtime settings, read from the environment (and `.env` if present)
 */
#[derive(Clone, Debug)]
pub struct Config {
    /**
     * Without a database the application keeps everything in memory
     */
    pub database_url: Option<String>,
    pub listen_addr: String,
    pub views_dir: PathBuf,
    pub polls_per_page: u64,
    /**
     * Grant `add_poll` to everybody who registers
     */
    pub open_poll_creation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            listen_addr: "127.0.0.1:8000".to_string(),
            views_dir: PathBuf::from("views"),
            polls_per_page: 5,
            open_poll_creation: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(dir) = lookup("VIEWS_DIR") {
            config.views_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("POLLS_PER_PAGE") {
            config.polls_per_page = match value.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "POLLS_PER_PAGE",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("OPEN_POLL_CREATION") {
            config.open_poll_creation = parse_flag("OPEN_POLL_CREATION", value)?;
        }

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
