use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Storage endpoint, with or without scheme (`minio:9000`).
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Use https towards the storage endpoint.
    pub secure: bool,
    pub bucket: String,
    pub region: String,
    pub max_upload_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "HTTP gateway for a single object-storage bucket")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage endpoint (overrides MINIO_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Storage access key (overrides MINIO_ACCESS_KEY)
    #[arg(long)]
    pub access_key: Option<String>,

    /// Storage secret key (overrides MINIO_SECRET_KEY)
    #[arg(long)]
    pub secret_key: Option<String>,

    /// Talk https to the storage endpoint (overrides MINIO_SECURE)
    #[arg(long)]
    pub secure: Option<bool>,

    /// Bucket to serve (overrides MINIO_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Storage region (overrides MINIO_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Largest accepted request body in bytes (overrides GATEWAY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name))
    }

    /// Merge `args` over the variables visible through `lookup` over defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let var = |name: &str, default: &str| -> Result<String> {
            match lookup(name) {
                Ok(value) => Ok(value),
                Err(env::VarError::NotPresent) => Ok(default.to_string()),
                Err(err) => Err(err).with_context(|| format!("reading {name}")),
            }
        };

        let env_port = var("GATEWAY_PORT", "8000")?;
        let env_port = env_port
            .parse::<u16>()
            .with_context(|| format!("parsing GATEWAY_PORT value `{}`", env_port))?;
        let env_max_upload = var(
            "GATEWAY_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;
        let env_max_upload = env_max_upload
            .parse::<u64>()
            .with_context(|| format!("parsing GATEWAY_MAX_UPLOAD_BYTES value `{}`", env_max_upload))?;
        let env_secure = var("MINIO_SECURE", "false")?.eq_ignore_ascii_case("true");

        // --- Merge ---
        let cfg = Self {
            host: args.host.map_or_else(|| var("GATEWAY_HOST", "0.0.0.0"), Ok)?,
            port: args.port.unwrap_or(env_port),
            endpoint: args
                .endpoint
                .map_or_else(|| var("MINIO_ENDPOINT", "minio:9000"), Ok)?,
            access_key: args
                .access_key
                .map_or_else(|| var("MINIO_ACCESS_KEY", "minioadmin"), Ok)?,
            secret_key: args
                .secret_key
                .map_or_else(|| var("MINIO_SECRET_KEY", "minioadmin"), Ok)?,
            secure: args.secure.unwrap_or(env_secure),
            bucket: args.bucket.map_or_else(|| var("MINIO_BUCKET", "mybucket"), Ok)?,
            region: args.region.map_or_else(|| var("MINIO_REGION", "us-east-1"), Ok)?,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        if cfg.bucket.is_empty() {
            anyhow::bail!("bucket name must not be empty");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Endpoint as a URL; a bare `host:port` gets a scheme from `secure`.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.clone();
        }
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint)
    }

    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_upload_bytes).unwrap_or(usize::MAX)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}
