use std::env;
use std::path::PathBuf;

/// Runtime configuration for the uploads service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory every stored file lives under (default: "./uploads")
    pub upload_root: PathBuf,

    /// URL prefix the upload root is served from (default: "/uploads")
    pub public_base_path: String,

    /// Page size used when a listing request omits it (default: 50)
    pub default_page_size: u64,

    /// Largest page size a listing request may ask for (default: 100)
    pub max_page_size: u64,

    /// Upper bound for a whole multipart request body in bytes (default: 160 MB)
    pub max_request_size: usize,

    /// JWT Secret Key (Required)
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            public_base_path: "/uploads".to_string(),
            default_page_size: 50,
            max_page_size: 100,
            // 10 files of 15 MB plus multipart overhead
            max_request_size: 160 * 1024 * 1024,
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let default = Self::default();

        let public_base_path = match env::var("PUBLIC_BASE_PATH") {
            Ok(raw) => normalize_base_path(&raw)?,
            Err(_) => default.public_base_path,
        };

        Ok(Self {
            upload_root: env::var("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.upload_root),

            public_base_path,

            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default.default_page_size),

            max_page_size: env::var("MAX_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default.max_page_size),

            max_request_size: env::var("MAX_REQUEST_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_request_size),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        })
    }

    /// Config for local development and tests, rooted at `upload_root`
    pub fn development(upload_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            jwt_secret: "dev-secret".to_string(),
            ..Self::default()
        }
    }
}

/// The static mount must sit below the site root.
fn normalize_base_path(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("PUBLIC_BASE_PATH must not be the root path, got '{}'", raw);
    }
    Ok(format!("/{}", trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.public_base_path, "/uploads");
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development("/tmp/uploads-test");
        assert_eq!(config.upload_root, PathBuf::from("/tmp/uploads-test"));
        assert_eq!(config.jwt_secret, "dev-secret");
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path("files/").unwrap(), "/files");
        assert_eq!(normalize_base_path("/static/uploads").unwrap(), "/static/uploads");
    }

    #[test]
    fn test_root_base_path_is_rejected() {
        for raw in ["/", "", "  ", "//"] {
            assert!(normalize_base_path(raw).is_err(), "accepted {raw:?}");
        }
    }
}
