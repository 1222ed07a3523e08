//! Resolution of the username/token pair used for remote operations.

use crate::settings::Settings;

/// Environment fallback for the username.
pub const USERNAME_ENV: &str = "DASHBOARD_SYNC_GIT_USERNAME";

/// Environment fallback for the token.
pub const TOKEN_ENV: &str = "DASHBOARD_SYNC_GIT_TOKEN";

/// Username sent when a token is configured without one. Token-based remotes
/// accept any non-empty user; the secret is carried entirely by the token.
pub const PLACEHOLDER_USERNAME: &str = "git";

/// Ephemeral credentials for a single network operation. Never persisted here.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    /// True when only anonymous access should be attempted.
    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }
}

// Keeps the token out of any `{:?}` that ends up in a log line.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token_len", &self.token.len())
            .finish()
    }
}

/// Resolve credentials from the settings snapshot, then the environment.
///
/// Settings win when they carry a username or a token. Otherwise the
/// environment variables are consulted. A blank token yields empty
/// credentials; a token without a username gets [`PLACEHOLDER_USERNAME`].
pub fn resolve(settings: &Settings) -> Credentials {
    resolve_with(settings, |key| std::env::var(key).ok())
}

fn resolve_with(settings: &Settings, env: impl Fn(&str) -> Option<String>) -> Credentials {
    let user = settings.git_username.trim();
    let token = settings.git_token.trim();

    let (user, token) = if !user.is_empty() || !token.is_empty() {
        (user.to_string(), token.to_string())
    } else {
        (
            env(USERNAME_ENV).unwrap_or_default().trim().to_string(),
            env(TOKEN_ENV).unwrap_or_default().trim().to_string(),
        )
    };

    if token.is_empty() {
        log::warn!(
            "No git credentials configured (username/token). Only anonymous access will be attempted."
        );
        return Credentials::default();
    }

    let username = if user.is_empty() {
        PLACEHOLDER_USERNAME.to_string()
    } else {
        user
    };

    log::info!(
        "Using git credentials: user='{}', tokenLen={}",
        username,
        token.len()
    );

    Credentials { username, token }
}
