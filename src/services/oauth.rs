use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Url;
use tracing::{debug, warn};

use crate::{routes::Destination, services::session::SessionManager};

/// Query parameters the OAuth provider redirect lands with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let mut params = Self::default();
        let Ok(url) = Url::parse(&format!("http://callback.invalid/?{query}")) else {
            return params;
        };
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "token" | "accessToken" => params.token = value,
                "refreshToken" => params.refresh_token = value,
                "error" => params.error = value,
                _ => {}
            }
        }
        params
    }
}

/// Handles one OAuth redirect. The handler may be invoked repeatedly by the
/// hosting UI; only the first invocation does any work.
#[derive(Debug, Default)]
pub struct OAuthCallback {
    processed: AtomicBool,
}

impl OAuthCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self) -> bool {
        self.processed.load(Ordering::SeqCst)
    }

    /// Returns `None` when the redirect was already handled, otherwise where
    /// to navigate. Failures send the user back to the login page.
    pub async fn handle(
        &self,
        session: &SessionManager,
        params: &CallbackParams,
    ) -> Option<Destination> {
        if self.processed.swap(true, Ordering::SeqCst) {
            debug!("OAuth callback already processed");
            return None;
        }

        if let Some(error) = &params.error {
            warn!("OAuth provider returned an error: {error}");
            return Some(Destination::Login);
        }
        let Some(token) = params.token.as_deref() else {
            warn!("OAuth callback without a token");
            return Some(Destination::Login);
        };

        match session.complete_oauth_login(token, params.refresh_token.as_deref()).await {
            Ok(destination) => Some(destination),
            Err(e) => {
                warn!("OAuth sign-in failed: {e}");
                Some(Destination::Login)
            }
        }
    }
}
