//! Google OAuth 2.0 authorization-code flow.
//!
//! Only the pieces the login needs: the authorization redirect, the code
//! exchange, and the userinfo lookup.

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use gifter_store::NewUser;

use crate::config::OAuthConfig;
use crate::error::ServerError;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuth {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// URL of the consent screen for a given CSRF `state`.
    pub fn authorize_url(&self, state: &str) -> Result<Url, ServerError> {
        Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", "email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| ServerError::Internal(format!("Invalid OAuth URL: {e}")))
    }

    /// Exchange an authorization code for the user's profile.
    pub async fn fetch_user(&self, code: &str) -> Result<NewUser, ServerError> {
        let token: TokenResponse = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServerError::Internal(format!("OAuth code exchange failed: {e}")))?
            .json()
            .await
            .map_err(|e| ServerError::Internal(format!("Invalid OAuth token response: {e}")))?;

        let info: UserInfo = self
            .http
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServerError::Internal(format!("OAuth userinfo request failed: {e}")))?
            .json()
            .await
            .map_err(|e| ServerError::Internal(format!("Invalid OAuth userinfo response: {e}")))?;

        debug!(email = %info.email, "oauth profile fetched");
        Ok(to_new_user(info))
    }
}

fn to_new_user(info: UserInfo) -> NewUser {
    let name = info
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| info.email.split('@').next().unwrap_or_default().to_string());
    NewUser {
        name,
        email: info.email,
        picture: info.picture.filter(|p| !p.is_empty()),
    }
}
