use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

use crate::error::{AppError, AppResult};

/// Default destination number for request summaries (warehouse line)
pub const DEFAULT_WAREHOUSE_PHONE: &str = "573001234567";

/// Storage bucket that holds warranty evidence photos
pub const DEFAULT_EVIDENCE_BUCKET: &str = "imagenes-repuestos-garantias";

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: Option<String>,
    pub state_dir: PathBuf,
    pub warehouse_phone: String,
    pub evidence_bucket: String,
    pub db_max_connections: u32,
    pub query_stale_after: Duration,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            supabase_url: required("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            state_dir: match env::var("MINCA_STATE_DIR") {
                Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => default_state_dir()?,
            },
            warehouse_phone: env::var("WAREHOUSE_PHONE")
                .unwrap_or_else(|_| DEFAULT_WAREHOUSE_PHONE.to_string()),
            evidence_bucket: env::var("EVIDENCE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_EVIDENCE_BUCKET.to_string()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            query_stale_after: Duration::from_secs(
                env::var("QUERY_STALE_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            ),
        })
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.supabase_url)
    }
}

fn required(key: &str) -> AppResult<String> {
    env::var(key).map_err(|_| AppError::Config(format!("{} is not set", key)))
}

fn default_state_dir() -> AppResult<PathBuf> {
    ProjectDirs::from("com", "minca", "minca-inventory")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .ok_or_else(|| AppError::Config("could not resolve a home directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            database_url: "postgres://localhost/minca".to_string(),
            supabase_url: "https://project.supabase.co".to_string(),
            supabase_anon_key: "anon".to_string(),
            jwt_secret: None,
            state_dir: PathBuf::from("/tmp/minca"),
            warehouse_phone: DEFAULT_WAREHOUSE_PHONE.to_string(),
            evidence_bucket: DEFAULT_EVIDENCE_BUCKET.to_string(),
            db_max_connections: 10,
            query_stale_after: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_service_urls() {
        let config = sample();
        assert_eq!(config.auth_url(), "https://project.supabase.co/auth/v1");
        assert_eq!(config.storage_url(), "https://project.supabase.co/storage/v1");
    }
}
