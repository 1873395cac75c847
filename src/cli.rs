//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS};
use crate::media::{CloudinaryConfig, CloudinaryStore, MediaStore, MemoryMediaStore};
use crate::password::DEFAULT_BCRYPT_COST;
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum MediaBackend {
    /// Upload to Cloudinary
    #[default]
    Cloudinary,
    /// Keep uploads in memory (development only, lost on restart)
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vidtube", about = "Video sharing backend")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "vidtube.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET
    #[arg(long)]
    pub access_token_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET
    #[arg(long)]
    pub refresh_token_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = ACCESS_TOKEN_DURATION_SECS)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = REFRESH_TOKEN_DURATION_SECS)]
    pub refresh_token_ttl: u64,

    /// Send cookies without the Secure flag, for local HTTP development
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Log out every session and reject older access tokens when a password changes
    #[arg(long)]
    pub revoke_sessions_on_password_change: bool,

    /// Disable per-IP rate limits on login and registration
    #[arg(long)]
    pub no_rate_limit: bool,

    /// bcrypt cost factor for password hashes
    #[arg(long, default_value_t = DEFAULT_BCRYPT_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Where uploaded files are stored
    #[arg(long, default_value = "cloudinary")]
    pub media_backend: MediaBackend,

    /// Cloudinary cloud name
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    /// Cloudinary API key. The API secret is read from CLOUDINARY_API_SECRET
    #[arg(long, env = "CLOUDINARY_API_KEY")]
    pub cloudinary_api_key: Option<String>,

    /// Cloudinary API root
    #[arg(long, default_value = "https://api.cloudinary.com/v1_1/")]
    pub cloudinary_api_base: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Read a secret from `env_var`, removing it from the environment, or from
/// `file`. Logs and returns None if neither is usable.
fn load_secret(env_var: &str, file: Option<&str>, flag: &str) -> Option<String> {
    if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        return Some(secret);
    }

    if let Some(path) = file {
        return match std::fs::read_to_string(path) {
            Ok(content) => Some(content.trim().to_string()),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                None
            }
        };
    }

    error!(
        "{} is required. Set the environment variable (recommended) or use {}",
        env_var, flag
    );
    None
}

/// Load the access and refresh token secrets.
/// Returns None and logs an error if either is missing, too short, or they match.
pub fn load_token_secrets(
    access_file: Option<&str>,
    refresh_file: Option<&str>,
) -> Option<(String, String)> {
    let access = load_secret(
        "ACCESS_TOKEN_SECRET",
        access_file,
        "--access-token-secret-file",
    )?;
    let refresh = load_secret(
        "REFRESH_TOKEN_SECRET",
        refresh_file,
        "--refresh-token-secret-file",
    )?;

    for (name, secret) in [("Access", &access), ("Refresh", &refresh)] {
        if secret.len() < MIN_TOKEN_SECRET_LENGTH {
            error!(
                "{} token secret is shorter than {} characters. Use a longer secret",
                name, MIN_TOKEN_SECRET_LENGTH
            );
            return None;
        }
    }

    if access == refresh {
        error!("Access and refresh token secrets must differ");
        return None;
    }

    Some((access, refresh))
}

/// Build the configured media store.
/// Returns None and logs an error if Cloudinary settings are incomplete.
pub fn build_media_store(args: &Args) -> Option<Arc<dyn MediaStore>> {
    match args.media_backend {
        MediaBackend::Memory => {
            warn!("Using in-memory media store, uploads are lost on restart");
            Some(Arc::new(MemoryMediaStore::new()))
        }
        MediaBackend::Cloudinary => {
            let (Some(cloud_name), Some(api_key)) = (
                args.cloudinary_cloud_name.clone(),
                args.cloudinary_api_key.clone(),
            ) else {
                error!("CLOUDINARY_CLOUD_NAME and CLOUDINARY_API_KEY are required");
                return None;
            };
            let api_secret = load_secret("CLOUDINARY_API_SECRET", None, "CLOUDINARY_API_SECRET")?;
            let api_base = match Url::parse(&args.cloudinary_api_base) {
                Ok(url) => url,
                Err(e) => {
                    error!(url = %args.cloudinary_api_base, error = %e, "Invalid Cloudinary API URL");
                    return None;
                }
            };

            info!(cloud_name = %cloud_name, "Using Cloudinary media store");
            Some(Arc::new(CloudinaryStore::new(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
                api_base,
            })))
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    secrets: (String, String),
    media: Arc<dyn MediaStore>,
) -> ServerConfig {
    let (access_secret, refresh_secret) = secrets;

    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        access_ttl: args.access_token_ttl,
        refresh_ttl: args.refresh_token_ttl,
        media,
        bcrypt_cost: args.bcrypt_cost,
        secure_cookies: !args.insecure_cookies,
        rate_limit: !args.no_rate_limit,
        revoke_sessions_on_password_change: args.revoke_sessions_on_password_change,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["vidtube"]).unwrap();
        assert_eq!(args.access_token_ttl, ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(args.refresh_token_ttl, REFRESH_TOKEN_DURATION_SECS);
        assert_eq!(args.media_backend, MediaBackend::Cloudinary);
        assert!(!args.insecure_cookies);
        assert!(!args.revoke_sessions_on_password_change);
    }

    #[test]
    fn test_rejects_bcrypt_cost_out_of_range() {
        assert!(Args::try_parse_from(["vidtube", "--bcrypt-cost", "2"]).is_err());
        assert!(Args::try_parse_from(["vidtube", "--bcrypt-cost", "12"]).is_ok());
    }

    #[test]
    fn test_memory_media_backend() {
        let args = Args::try_parse_from(["vidtube", "--media-backend", "memory"]).unwrap();
        assert!(build_media_store(&args).is_some());
    }
}
