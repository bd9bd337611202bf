//! Configuration module
//!
//! Configuration structures for the API: server, database, storage, authentication,
//! upload limits and QR code rendering.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 3000;
const API_PREFIX: &str = "/api";
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24 * 7;
const HTTP_CONCURRENCY_LIMIT: usize = 256;
const TRUSTED_PROXY_COUNT: usize = 1;
const MAX_FILE_SIZE: usize = 52_428_800;
const ALLOWED_FILE_TYPES: &str = "pdf,doc,docx,xls,xlsx,ppt,pptx,jpg,jpeg,png,gif,txt,csv";
const QR_CODE_SIZE: u32 = 300;
const AUDIT_QUEUE_CAPACITY: usize = 1024;

/// QR code error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrErrorCorrection {
    Low,
    #[default]
    Medium,
    Quartile,
    High,
}

impl FromStr for QrErrorCorrection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "L" => Ok(QrErrorCorrection::Low),
            "M" => Ok(QrErrorCorrection::Medium),
            "Q" => Ok(QrErrorCorrection::Quartile),
            "H" => Ok(QrErrorCorrection::High),
            _ => Err(anyhow::anyhow!(
                "Invalid QR error correction level: {} (expected L, M, Q or H)",
                s
            )),
        }
    }
}

impl Display for QrErrorCorrection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let level = match self {
            QrErrorCorrection::Low => "L",
            QrErrorCorrection::Medium => "M",
            QrErrorCorrection::Quartile => "Q",
            QrErrorCorrection::High => "H",
        };
        f.write_str(level)
    }
}

/// Server-level configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub http_concurrency_limit: usize,
    pub trusted_proxy_count: usize,
    pub environment: String,
    pub log_format: String,
}

/// Document service configuration
#[derive(Clone, Debug)]
pub struct DocqrConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub documents_bucket: String,
    pub qr_codes_bucket: String,
    pub s3_region: Option<String>,
    pub aws_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub local_storage_path: String,
    pub public_base_url: String,
    // Upload limits
    pub max_file_size_bytes: usize,
    pub allowed_file_types: Vec<String>,
    // QR codes
    pub qr_code_size: u32,
    pub qr_error_correction: QrErrorCorrection,
    pub app_base_url: String,
    // Audit
    pub audit_queue_capacity: usize,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<DocqrConfig>);

impl Config {
    fn as_docqr(&self) -> &DocqrConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.as_docqr().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = DocqrConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_docqr().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_docqr().base.server_port
    }

    pub fn api_prefix(&self) -> &str {
        &self.as_docqr().base.api_prefix
    }

    pub fn jwt_secret(&self) -> &str {
        &self.as_docqr().base.jwt_secret
    }

    pub fn jwt_expiry_hours(&self) -> i64 {
        self.as_docqr().base.jwt_expiry_hours
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_docqr().base.cors_origins
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.as_docqr().base.http_concurrency_limit
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.as_docqr().base.trusted_proxy_count
    }

    pub fn environment(&self) -> &str {
        &self.as_docqr().base.environment
    }

    pub fn log_format(&self) -> &str {
        &self.as_docqr().base.log_format
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_docqr().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_docqr().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.as_docqr().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_docqr().storage_backend
    }

    pub fn documents_bucket(&self) -> &str {
        &self.as_docqr().documents_bucket
    }

    pub fn qr_codes_bucket(&self) -> &str {
        &self.as_docqr().qr_codes_bucket
    }

    /// S3 region, falling back to the standard AWS variable.
    pub fn s3_region(&self) -> Option<&str> {
        self.as_docqr()
            .s3_region
            .as_deref()
            .or(self.as_docqr().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_docqr().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> &str {
        &self.as_docqr().local_storage_path
    }

    pub fn public_base_url(&self) -> &str {
        &self.as_docqr().public_base_url
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.as_docqr().max_file_size_bytes
    }

    pub fn allowed_file_types(&self) -> &[String] {
        &self.as_docqr().allowed_file_types
    }

    pub fn qr_code_size(&self) -> u32 {
        self.as_docqr().qr_code_size
    }

    pub fn qr_error_correction(&self) -> QrErrorCorrection {
        self.as_docqr().qr_error_correction
    }

    pub fn app_base_url(&self) -> &str {
        &self.as_docqr().app_base_url
    }

    pub fn audit_queue_capacity(&self) -> usize {
        self.as_docqr().audit_queue_capacity
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Split a comma-separated list, trimming and lowercasing entries and dropping empties.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl DocqrConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str =
            env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string());
        if is_production_name(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut api_prefix = env::var("API_PREFIX").unwrap_or_else(|_| API_PREFIX.to_string());
        if !api_prefix.starts_with('/') {
            api_prefix.insert(0, '/');
        }
        let api_prefix = api_prefix.trim_end_matches('/').to_string();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            api_prefix,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| JWT_EXPIRY_HOURS.to_string())
                .parse()
                .unwrap_or(JWT_EXPIRY_HOURS),
            http_concurrency_limit: env::var("HTTP_CONCURRENCY_LIMIT")
                .unwrap_or_else(|_| HTTP_CONCURRENCY_LIMIT.to_string())
                .parse()
                .unwrap_or(HTTP_CONCURRENCY_LIMIT),
            trusted_proxy_count: env::var("TRUSTED_PROXY_COUNT")
                .unwrap_or_else(|_| TRUSTED_PROXY_COUNT.to_string())
                .parse()
                .unwrap_or(TRUSTED_PROXY_COUNT),
            environment,
            log_format: env::var("LOG_FORMAT")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|_| "pretty".to_string()),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::Local,
        };

        let qr_error_correction = match env::var("QR_CODE_ERROR_CORRECTION") {
            Ok(value) => value.parse()?,
            Err(_) => QrErrorCorrection::default(),
        };

        let config = DocqrConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            documents_bucket: env::var("STORAGE_BUCKET_DOCUMENTS")
                .unwrap_or_else(|_| "documents".to_string()),
            qr_codes_bucket: env::var("STORAGE_BUCKET_QR_CODES")
                .unwrap_or_else(|_| "qr-codes".to_string()),
            s3_region: env::var("S3_REGION").ok().filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_REGION").ok().filter(|s| !s.is_empty()),
            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./uploads".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", SERVER_PORT)),
            max_file_size_bytes: env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| MAX_FILE_SIZE.to_string())
                .parse()
                .unwrap_or(MAX_FILE_SIZE),
            allowed_file_types: split_list(
                &env::var("ALLOWED_FILE_TYPES").unwrap_or_else(|_| ALLOWED_FILE_TYPES.to_string()),
            ),
            qr_code_size: env::var("QR_CODE_SIZE")
                .unwrap_or_else(|_| QR_CODE_SIZE.to_string())
                .parse()
                .unwrap_or(QR_CODE_SIZE),
            qr_error_correction,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            audit_queue_capacity: env::var("AUDIT_QUEUE_CAPACITY")
                .unwrap_or_else(|_| AUDIT_QUEUE_CAPACITY.to_string())
                .parse()
                .unwrap_or(AUDIT_QUEUE_CAPACITY),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.database_url.starts_with("postgresql://")
            || self.database_url.starts_with("postgres://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.documents_bucket == self.qr_codes_bucket {
            return Err(anyhow::anyhow!(
                "STORAGE_BUCKET_DOCUMENTS and STORAGE_BUCKET_QR_CODES must differ"
            ));
        }

        if self.allowed_file_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_FILE_TYPES must not be empty"));
        }

        if self.audit_queue_capacity == 0 {
            return Err(anyhow::anyhow!("AUDIT_QUEUE_CAPACITY must be positive"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocqrConfig {
        DocqrConfig {
            base: BaseConfig {
                server_port: 3000,
                api_prefix: "/api".to_string(),
                cors_origins: vec!["http://localhost:5173".to_string()],
                db_max_connections: 5,
                db_timeout_seconds: 5,
                jwt_secret: "x".repeat(32),
                jwt_expiry_hours: 1,
                http_concurrency_limit: 16,
                trusted_proxy_count: 1,
                environment: "development".to_string(),
                log_format: "pretty".to_string(),
            },
            database_url: "postgres://docqr@localhost/docqr".to_string(),
            storage_backend: StorageBackend::Local,
            documents_bucket: "documents".to_string(),
            qr_codes_bucket: "qr-codes".to_string(),
            s3_region: None,
            aws_region: None,
            s3_endpoint: None,
            local_storage_path: "./uploads".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            max_file_size_bytes: 1024,
            allowed_file_types: vec!["pdf".to_string()],
            qr_code_size: 300,
            qr_error_correction: QrErrorCorrection::Medium,
            app_base_url: "http://localhost:5173".to_string(),
            audit_queue_capacity: 8,
        }
    }

    #[test]
    fn valid_sample_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_rejected() {
        let mut cfg = sample();
        cfg.base.jwt_secret = "short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn s3_requires_region() {
        let mut cfg = sample();
        cfg.storage_backend = StorageBackend::S3;
        assert!(cfg.validate().is_err());

        cfg.aws_region = Some("us-east-1".to_string());
        assert!(cfg.validate().is_ok());
        assert_eq!(Config(Box::new(cfg)).s3_region(), Some("us-east-1"));
    }

    #[test]
    fn non_postgres_url_rejected() {
        let mut cfg = sample();
        cfg.database_url = "mysql://localhost/docqr".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn split_list_normalizes_entries() {
        assert_eq!(split_list(" PDF, .Docx ,,txt"), vec!["pdf", "docx", "txt"]);
    }

    #[test]
    fn qr_levels_parse() {
        assert_eq!("h".parse::<QrErrorCorrection>().unwrap(), QrErrorCorrection::High);
        assert_eq!(QrErrorCorrection::default().to_string(), "M");
        assert!("X".parse::<QrErrorCorrection>().is_err());
    }

    #[test]
    fn production_detection() {
        let mut cfg = sample();
        cfg.base.environment = "Prod".to_string();
        assert!(Config(Box::new(cfg)).is_production());
    }
}
