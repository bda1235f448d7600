//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Google OAuth client settings.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`, or `PORT` to change only the port.
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./gifter.db`
    pub database_path: PathBuf,

    /// Secret used to sign session cookies.
    /// Env: `SESSION_SECRET`
    /// Default: `default-session-secret` (development only).
    pub session_secret: String,

    /// Domain attribute of the session cookie.
    /// Env: `SESSION_COOKIE_DOMAIN`
    /// Default: `localhost`
    pub cookie_domain: String,

    /// Mark cookies `Secure`.
    /// Env: `ENV=production`
    pub secure_cookies: bool,

    /// Lifetime of a session.
    /// Env: `SESSION_MAX_AGE_SECS`
    /// Default: 30 days.
    pub session_max_age: Duration,

    /// Where to send the browser after a successful login or signup.
    /// Env: `REDIRECT_SECURE`
    pub redirect_secure: String,

    /// Where to send the browser after logout.
    /// Env: `REDIRECT_LOGOUT`
    pub redirect_logout: String,

    /// Google OAuth settings; `None` disables `/auth` and `/auth/callback`.
    /// Env: `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_CALLBACK_URL`
    pub google: Option<OAuthConfig>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("session_secret", &"<redacted>")
            .field("cookie_domain", &self.cookie_domain)
            .field("secure_cookies", &self.secure_cookies)
            .field("session_max_age", &self.session_max_age)
            .field("redirect_secure", &self.redirect_secure)
            .field("redirect_logout", &self.redirect_logout)
            .field("google", &self.google)
            .finish()
    }
}

pub const DEFAULT_SESSION_SECRET: &str = "default-session-secret";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: PathBuf::from("./gifter.db"),
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
            cookie_domain: "localhost".to_string(),
            secure_cookies: false,
            session_max_age: Duration::from_secs(86400 * 30), // 30 days
            redirect_secure: "http://localhost:5173/events".to_string(),
            redirect_logout: "http://localhost:5173/".to_string(),
            google: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(p) => config.http_addr.set_port(p),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, ignoring"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        match lookup("SESSION_SECRET") {
            Some(secret) if !secret.is_empty() => config.session_secret = secret,
            _ => tracing::warn!("SESSION_SECRET not set, using development default"),
        }

        if let Some(domain) = lookup("SESSION_COOKIE_DOMAIN") {
            if !domain.is_empty() {
                config.cookie_domain = domain;
            }
        }

        config.secure_cookies = lookup("ENV").as_deref() == Some("production");

        if let Some(val) = lookup("SESSION_MAX_AGE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.session_max_age = Duration::from_secs(secs);
            }
        }

        if let Some(url) = lookup("REDIRECT_SECURE") {
            if !url.is_empty() {
                config.redirect_secure = url;
            }
        }

        if let Some(url) = lookup("REDIRECT_LOGOUT") {
            if !url.is_empty() {
                config.redirect_logout = url;
            }
        }

        let client_id = lookup("GOOGLE_CLIENT_ID").unwrap_or_default();
        let client_secret = lookup("GOOGLE_CLIENT_SECRET").unwrap_or_default();
        let callback_url = lookup("GOOGLE_CALLBACK_URL").unwrap_or_default();
        if client_id.is_empty() || client_secret.is_empty() || callback_url.is_empty() {
            tracing::warn!("Google OAuth environment variables are not set, OAuth login disabled");
        } else {
            config.google = Some(OAuthConfig {
                client_id,
                client_secret,
                callback_url,
            });
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = from_map(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.session_secret, DEFAULT_SESSION_SECRET);
        assert!(!config.secure_cookies);
        assert!(config.google.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = from_map(&[
            ("PORT", "3000"),
            ("ENV", "production"),
            ("SESSION_SECRET", "s3cret"),
            ("DATABASE_PATH", "/var/lib/gifter/db.sqlite"),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_CALLBACK_URL", "https://gifter.example/auth/callback"),
        ]);
        assert_eq!(config.http_addr.port(), 3000);
        assert!(config.secure_cookies);
        assert_eq!(config.session_secret, "s3cret");
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/gifter/db.sqlite")
        );
        assert_eq!(config.google.unwrap().client_id, "id");
    }

    #[test]
    fn test_partial_oauth_config_disables_oauth() {
        let config = from_map(&[("GOOGLE_CLIENT_ID", "id")]);
        assert!(config.google.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = from_map(&[("SESSION_SECRET", "s3cret")]);
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
