use clap::Parser;
use serde::{Deserialize, Serialize};

/**
 * Command-line arguments for the application.
 */
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ApplicationArguments {
    /**
     * Path to the configuration file.
     */
    #[arg(short, long)]
    pub config_file: String,
}

/**
 * Represents the configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /**
     * Logging configuration for the application.
     */
    pub logging: LoggingConfig,
    /**
     * Access keys for the protected operations.
     */
    #[serde(default)]
    pub security: AppSecurity,
    /**
     * Server configuration for the application.
     */
    pub server: Server,
    /**
     * Database configuration for the application.
     */
    pub database: Database,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /**
     * Whether to log the target of the log message.
     */
    pub target: bool,
    /**
     * Whether to log thread IDs .
     */
    pub thread_ids: bool,
    /**
     * Whether to log thread names.
     */
    pub thread_names: bool,
    /**
     * Whether to log line numbers.
     */
    pub line_number: bool,
    /**
     * Whether to log the log level.
     */
    pub level: bool,
    /**
     * Whether to use ANSI colors in logs.
     */
    pub ansi: bool,
    /**
     * Whether to log the source file.
     */
    pub file: bool,
    /**
     * Optional path of a log file written in addition to stdout.
     */
    pub logfile: Option<String>,
    /**
     * Additional directives for logging configuration.
     */
    #[serde(default)]
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { target: true, thread_ids: true, thread_names: true, line_number: true, level: true, ansi: true, file: true, logfile: None, directives: vec![] }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /**
     * Type of the database (e.g., `PostgreSQL`).
     */
    pub db_type: DatabaseType,
    /**
     * Apply the embedded migrations on startup.
     */
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatabaseType {
    /**
     * `PostgreSQL` database type. Timeouts are in milliseconds.
     */
    #[serde(rename_all = "camelCase")]
    Postgresql { connection_string: String, max_connections: u32, min_connections: u32, acquire_timeout: u64, acquire_slow_threshold: u64, idle_timeout: u64, max_lifetime: u64 },
}

/**
 * Shared keys presented as bearer tokens. An absent key leaves the operation open.
 */
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AppSecurity {
    /**
     * Key required to register donors.
     */
    pub registration_key: Option<String>,
    /**
     * Key required to delete donors.
     */
    pub deletion_key: Option<String>,
}

/**
 * Represents the server configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /**
     * Number of worker threads for the server.
     */
    pub workers: usize,
    /**
     * Address the listeners bind to.
     */
    #[serde(default = "default_host")]
    pub host: String,
    /**
     * HTTP port for the server.
     */
    pub http_port: Option<u16>,
    /**
     * HTTPS configuration for the server.
     */
    pub https_config: Option<HttpsConfig>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/**
 * Represents the HTTPS configuration for the server.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsConfig {
    /**
     * Port for the HTTPS server.
     */
    pub port: u16,
    /**
     * Path to the certificate file.
     */
    pub certificate_file: String,
    /**
     * Path to the private key file.
     */
    pub private_key_file: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = Config {
            logging: LoggingConfig::default(),
            database: Database {
                db_type: DatabaseType::Postgresql {
                    connection_string: "".to_string(),
                    max_connections: 5,
                    min_connections: 1,
                    acquire_timeout: 30,
                    acquire_slow_threshold: 60,
                    idle_timeout: 300,
                    max_lifetime: 3600,
                },
                run_migrations: true,
            },
            security: AppSecurity { registration_key: Some("register".to_string()), deletion_key: None },
            server: Server { workers: 4, host: "0.0.0.0".to_string(), http_port: Some(8080), https_config: None },
        };
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.logging.logfile, None);
        assert_eq!(deserialized.logging.directives, config.logging.directives);
        assert_eq!(config.server.workers, deserialized.server.workers);
        assert_eq!(config.server.host, deserialized.server.host);
        assert_eq!(config.server.http_port, deserialized.server.http_port);
        assert!(deserialized.server.https_config.is_none());
        assert!(deserialized.database.run_migrations);
        assert_eq!(deserialized.security, config.security);
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(include_str!("../../config/blood_donation_api.toml")).unwrap();
        assert_eq!(config.server.workers, 4);
        assert_eq!(config.server.http_port, Some(8080));
        assert!(config.database.run_migrations);
        assert!(config.security.registration_key.is_some());
        assert!(config.security.deletion_key.is_some());
        let DatabaseType::Postgresql { max_connections, .. } = config.database.db_type;
        assert_eq!(max_connections, 10);
    }

    #[test]
    fn test_defaults_when_optional_sections_missing() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            target = false
            threadIds = false
            threadNames = false
            lineNumber = false
            level = true
            ansi = false
            file = false

            [server]
            workers = 1

            [database.dbType.postgresql]
            connectionString = "postgres://localhost/test"
            maxConnections = 1
            minConnections = 1
            acquireTimeout = 1
            acquireSlowThreshold = 1
            idleTimeout = 1
            maxLifetime = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.http_port.is_none());
        assert!(!config.database.run_migrations);
        assert!(config.logging.directives.is_empty());
        assert!(config.logging.logfile.is_none());
        assert_eq!(config.security, AppSecurity::default());
    }
}
