use clap::Parser;
use lib_telemetry::core::history::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "AquaStream water-quality telemetry gateway", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "AQUA_PORT", help = "Port to listen on for probe and dashboard connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "AQUA_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "AQUA_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "AQUA_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "AQUA_HISTORY_CAPACITY", help = "Readings retained in memory before head eviction.")]
    pub history_capacity: Option<usize>,

    #[clap(long, env = "DATABASE_URL", help = "PostgreSQL URL for the durable reading store. Persistence is disabled when absent.")]
    pub database_url: Option<String>,

    #[clap(long, env = "AQUA_DB_MAX_CONNECTIONS", help = "Maximum pooled connections to the durable store.")]
    pub db_max_connections: Option<u32>,

    #[clap(long, env = "TLS_CERT_PATH", help = "Path to the TLS certificate file.")]
    pub tls_cert_path: Option<PathBuf>,

    #[clap(long, env = "TLS_KEY_PATH", help = "Path to the TLS private key file.")]
    pub tls_key_path: Option<PathBuf>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            history_capacity: other.history_capacity.or(self.history_capacity),
            database_url: other.database_url.or(self.database_url),
            db_max_connections: other.db_max_connections.or(self.db_max_connections),
            tls_cert_path: other.tls_cert_path.or(self.tls_cert_path),
            tls_key_path: other.tls_key_path.or(self.tls_key_path),
        }
    }

    // Resolved accessors so defaults live in exactly one place.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(5000)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity.unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections.unwrap_or(5)
    }
}

pub fn load_config() -> Config {
    // 1. Parse CLI early to allow overriding the default config file path.
    let cli_args = Config::parse();

    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_aqua.conf"));

    let mut current_config = Config::default();

    // 2. Load from the config file if present.
    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                eprintln!(
                    "Failed to parse config file: {}. Falling back to other sources.",
                    config_file_path.display()
                );
            }
        } else {
            eprintln!(
                "Failed to read config file: {}. Falling back to other sources.",
                config_file_path.display()
            );
        }
    }

    // 3. Environment variables and CLI arguments override the file.
    //    clap handles both; the merge keeps file values where neither is set.
    current_config.merge(cli_args)
}
