/// Configuration management for HerdWatch
use crate::error::{HerdError, HerdResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
    pub authentication: AuthConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Maximum accepted image size in bytes
    pub upload_limit: usize,
    /// Browser origins allowed to call the API with credentials
    pub cors_origins: Vec<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub upload_directory: PathBuf,
}

/// External classifier service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL, e.g. http://localhost:5000
    pub base_url: String,
    /// Path of the prediction endpoint relative to `base_url`
    pub predict_path: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl ClassifierConfig {
    pub fn predict_url(&self) -> String {
        join_url(&self.base_url, &self.predict_path)
    }

    pub fn model_info_url(&self) -> String {
        join_url(&self.base_url, "/model_info")
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            predict_path: "/predict_from_path".to_string(),
            timeout_secs: 30,
            user_agent: format!("HerdWatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret of the token issuer
    pub jwt_secret: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> HerdResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HERDWATCH_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("HERDWATCH_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| HerdError::Config("Invalid port number".to_string()))?;
        let upload_limit = parse_upload_limit(env::var("HERDWATCH_UPLOAD_LIMIT").ok())?;
        let cors_origins = env::var("HERDWATCH_CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let data_directory: PathBuf = env::var("HERDWATCH_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("HERDWATCH_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("herdwatch.sqlite"));
        let upload_directory = env::var("HERDWATCH_UPLOAD_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("uploads"));

        let classifier_defaults = ClassifierConfig::default();
        let classifier = ClassifierConfig {
            base_url: env::var("HERDWATCH_CLASSIFIER_URL").unwrap_or(classifier_defaults.base_url),
            predict_path: env::var("HERDWATCH_CLASSIFIER_PREDICT_PATH")
                .unwrap_or(classifier_defaults.predict_path),
            timeout_secs: env::var("HERDWATCH_CLASSIFIER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(classifier_defaults.timeout_secs),
            user_agent: classifier_defaults.user_agent,
        };

        let jwt_secret = env::var("HERDWATCH_JWT_SECRET")
            .map_err(|_| HerdError::Config("JWT secret required".to_string()))?;

        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "herdwatch=debug,tower_http=debug".to_string());
        let format = match env::var("HERDWATCH_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                upload_limit,
                cors_origins,
            },
            storage: StorageConfig {
                data_directory,
                database,
                upload_directory,
            },
            classifier,
            authentication: AuthConfig { jwt_secret },
            logging: LoggingConfig { level, format },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> HerdResult<()> {
        if self.service.hostname.is_empty() {
            return Err(HerdError::Config("Hostname cannot be empty".to_string()));
        }

        if self.service.upload_limit == 0 {
            return Err(HerdError::Config("Upload limit must be positive".to_string()));
        }

        // Credentialed CORS cannot answer with a wildcard origin
        if self.service.cors_origins.iter().any(|origin| origin == "*") {
            return Err(HerdError::Config(
                "CORS origins must be explicit; \"*\" cannot be used with credentials".to_string(),
            ));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(HerdError::Config(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if !self.classifier.base_url.starts_with("http://")
            && !self.classifier.base_url.starts_with("https://")
        {
            return Err(HerdError::Config(format!(
                "Classifier URL must be http(s): {}",
                self.classifier.base_url
            )));
        }

        if self.classifier.timeout_secs == 0 {
            return Err(HerdError::Config("Classifier timeout must be positive".to_string()));
        }

        Ok(())
    }
}

/// Upload limit in bytes, 10 MiB when unset
fn parse_upload_limit(raw: Option<String>) -> HerdResult<usize> {
    match raw {
        None => Ok(10 * 1024 * 1024),
        Some(value) => value.trim().parse().map_err(|_| {
            HerdError::Config(format!("Invalid upload limit: {:?}", value))
        }),
    }
}

#[cfg(test)]
pub(crate) fn test_config(data_directory: PathBuf) -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 0,
            upload_limit: 1024 * 1024,
            cors_origins: vec!["http://localhost:3000".to_string()],
        },
        storage: StorageConfig {
            database: data_directory.join("test.sqlite"),
            upload_directory: data_directory.join("uploads"),
            data_directory,
        },
        classifier: ClassifierConfig::default(),
        authentication: AuthConfig {
            jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
        },
    }
}
