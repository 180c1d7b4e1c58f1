//! Authentication session lifecycle.
//!
//! [`SessionManager`] owns the access/refresh token pair and the cached
//! account snapshot. It is created once by the composition root and shared
//! (behind an `Arc`) with whatever needs to read the session or attach the
//! access token to outgoing requests. State changes are published on a
//! `watch` channel; see [`SessionManager::subscribe`].
//!
//! Every transition degrades to [`SessionState::Anonymous`] on failure, so a
//! half-restored session is never observable. Mutating operations are
//! serialized: a logout issued while a refresh is in flight runs after it.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    models::account::AccountSummary,
    routes::Destination,
    services::{
        api::{ApiError, AuthApi},
        storage::{
            SessionStore, StorageError, ACCESS_TOKEN_KEY, LEGACY_KEYS, REFRESH_TOKEN_KEY, USER_KEY,
        },
        token::{self, TokenError},
    },
};

pub const LOGIN_FAILED_MESSAGE: &str = "Email hoặc mật khẩu không chính xác";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Đã xảy ra lỗi, vui lòng thử lại sau";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Shown to the user as-is.
    #[error("{0}")]
    Login(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("session expired, sign in again")]
    SessionExpired,

    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("account is locked")]
    AccountLocked,

    #[error("account profile unavailable: {0}")]
    ProfileUnavailable(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Credentials of the signed-in account. Token and profile always travel
/// together.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: AccountSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self { api, store, state, op_lock: Mutex::new(()) }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<AccountSummary> {
        self.state.borrow().session().map(|s| s.user.clone())
    }

    /// Current access token, expired or not.
    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().session().map(|s| s.access_token.clone())
    }

    /// Restore the session from persisted credentials.
    ///
    /// A live token with a cached profile is restored without any network
    /// call. An expired token is refreshed once; if that fails, every
    /// persisted credential is removed.
    pub async fn initialize(&self) -> SessionState {
        let _guard = self.op_lock.lock().await;

        for key in LEGACY_KEYS {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to remove legacy key {key}: {e}");
            }
        }

        let next = match self.restore().await {
            Ok(Some(session)) => {
                info!(account_id = session.user.id, "Session restored");
                SessionState::Authenticated(session)
            }
            Ok(None) => {
                debug!("No persisted session");
                self.clear_persisted();
                SessionState::Anonymous
            }
            Err(e) => {
                warn!("Session restore failed, signing out: {e}");
                self.clear_persisted();
                SessionState::Anonymous
            }
        };
        self.publish(next.clone());
        next
    }

    async fn restore(&self) -> Result<Option<Session>, SessionError> {
        let Some(mut access_token) = self.store.get(ACCESS_TOKEN_KEY) else {
            return Ok(None);
        };
        let refresh_token = self.store.get(REFRESH_TOKEN_KEY);

        if token::is_token_expired(&access_token) {
            debug!("Persisted access token expired, refreshing");
            access_token = self
                .refresh_access_token(&access_token, refresh_token.as_deref())
                .await?;
        }

        let user = match self.cached_user() {
            Some(user) => user,
            None => {
                let user = self.fetch_profile(&access_token).await?;
                self.persist_user(&user)?;
                user
            }
        };
        if user.is_locked {
            return Err(SessionError::AccountLocked);
        }

        Ok(Some(Session { access_token, refresh_token, user }))
    }

    /// Sign in with email and password.
    ///
    /// Returns where the caller should navigate next. A locked account is
    /// signed straight back out and sent to [`Destination::AccountLocked`].
    pub async fn login(&self, email: &str, password: &str) -> Result<Destination, SessionError> {
        let _guard = self.op_lock.lock().await;

        let data = match self.api.login(email, password).await {
            Ok(resp) => {
                let message = resp.message.clone();
                match resp.into_data() {
                    Some(data) => data,
                    None => {
                        info!("Login rejected by server");
                        let message = message
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string());
                        return Err(SessionError::Login(message));
                    }
                }
            }
            Err(ApiError::Server { message, .. }) if !message.trim().is_empty() => {
                info!("Login rejected by server");
                return Err(SessionError::Login(message));
            }
            Err(e) => {
                warn!("Login request failed: {e}");
                return Err(SessionError::Login(UNEXPECTED_ERROR_MESSAGE.to_string()));
            }
        };

        match self.establish(&data.token, Some(&data.refresh_token)).await {
            Ok(user) => {
                let roles = if data.roles.is_empty() { &user.roles } else { &data.roles };
                let destination = Destination::for_roles(roles);
                info!(account_id = user.id, ?destination, "Signed in");
                self.publish_session(Session {
                    access_token: data.token,
                    refresh_token: Some(data.refresh_token),
                    user,
                });
                Ok(destination)
            }
            Err(SessionError::AccountLocked) => {
                warn!("Locked account attempted to sign in");
                self.logout_locked().await;
                Ok(Destination::AccountLocked)
            }
            Err(e) => {
                warn!("Sign-in could not load the account profile: {e}");
                self.clear_persisted();
                self.publish(SessionState::Anonymous);
                Err(SessionError::Login(UNEXPECTED_ERROR_MESSAGE.to_string()))
            }
        }
    }

    /// Adopt a token pair issued by an external OAuth provider callback.
    pub async fn complete_oauth_login(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Destination, SessionError> {
        let _guard = self.op_lock.lock().await;

        match self.establish(access_token, refresh_token).await {
            Ok(user) => {
                let destination = Destination::for_roles(&user.roles);
                info!(account_id = user.id, ?destination, "Signed in via OAuth");
                self.publish_session(Session {
                    access_token: access_token.to_string(),
                    refresh_token: refresh_token.map(str::to_string),
                    user,
                });
                Ok(destination)
            }
            Err(SessionError::AccountLocked) => {
                warn!("Locked account returned from OAuth callback");
                self.logout_locked().await;
                Ok(Destination::AccountLocked)
            }
            Err(e) => {
                self.clear_persisted();
                self.publish(SessionState::Anonymous);
                Err(e)
            }
        }
    }

    /// Persist the token pair, load the profile and persist it unless locked.
    async fn establish(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<AccountSummary, SessionError> {
        self.store.set(ACCESS_TOKEN_KEY, access_token)?;
        match refresh_token {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh)?,
            None => self.store.remove(REFRESH_TOKEN_KEY)?,
        }

        let user = self.fetch_profile(access_token).await?;
        if user.is_locked {
            return Err(SessionError::AccountLocked);
        }
        self.persist_user(&user)?;
        Ok(user)
    }

    /// Sign out locally, then tell the server. The server call is
    /// best-effort; local credentials are always removed.
    pub async fn logout(&self) {
        let _guard = self.op_lock.lock().await;
        self.logout_locked().await;
    }

    async fn logout_locked(&self) {
        let access_token = self.store.get(ACCESS_TOKEN_KEY);
        self.clear_persisted();
        self.publish(SessionState::Anonymous);

        if let Some(token) = access_token {
            if let Err(e) = self.api.logout(&token).await {
                warn!("Server logout failed (ignored): {e}");
            }
        }
        info!("Signed out");
    }

    /// Refetch the account profile, refreshing the access token first when
    /// it has expired. A failed refresh signs the user out.
    pub async fn refresh_user_data(&self) -> Result<AccountSummary, SessionError> {
        let _guard = self.op_lock.lock().await;

        let mut session = self.live_session().await?;

        let user = match self.fetch_profile(&session.access_token).await {
            Ok(user) => user,
            Err(SessionError::Api(ApiError::Unauthorized)) => {
                warn!("Access token rejected by server, signing out");
                self.logout_locked().await;
                return Err(SessionError::SessionExpired);
            }
            Err(e) => return Err(e),
        };

        if user.is_locked {
            warn!(account_id = user.id, "Account locked, tearing down session");
            self.logout_locked().await;
            return Err(SessionError::AccountLocked);
        }

        self.persist_user(&user)?;
        session.user = user.clone();
        self.publish_session(session);
        debug!(account_id = user.id, "Account profile refreshed");
        Ok(user)
    }

    /// Access token for an outgoing request, refreshed when expired.
    /// A failed refresh signs the user out.
    pub async fn valid_access_token(&self) -> Result<String, SessionError> {
        let _guard = self.op_lock.lock().await;
        self.live_session().await.map(|s| s.access_token)
    }

    /// Current session with a non-expired access token.
    async fn live_session(&self) -> Result<Session, SessionError> {
        let Some(mut session) = self.state.borrow().session().cloned() else {
            return Err(SessionError::NotAuthenticated);
        };
        if !token::is_token_expired(&session.access_token) {
            return Ok(session);
        }

        match self
            .refresh_access_token(&session.access_token, session.refresh_token.as_deref())
            .await
        {
            Ok(fresh) => {
                session.access_token = fresh;
                self.publish_session(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!("Token refresh failed, signing out: {e}");
                self.logout_locked().await;
                Err(SessionError::SessionExpired)
            }
        }
    }

    /// Exchange the refresh token for a new access token and persist it.
    /// The subject id comes from the (possibly expired) current token.
    async fn refresh_access_token(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<String, SessionError> {
        let refresh_token = refresh_token.ok_or(SessionError::MissingRefreshToken)?;
        let account_id = token::subject_id_of(access_token)?;

        let fresh = self
            .api
            .refresh_token(account_id, refresh_token)
            .await?
            .into_data()
            .map(|d| d.token)
            .ok_or(SessionError::SessionExpired)?;

        self.store.set(ACCESS_TOKEN_KEY, &fresh)?;
        info!(account_id, "Access token refreshed");
        Ok(fresh)
    }

    /// React to another process changing the shared store.
    ///
    /// Re-reads the persisted credentials without any network call and
    /// republishes the resulting state.
    pub async fn handle_storage_event(&self, key: &str) {
        if ![ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY].contains(&key) {
            return;
        }
        let _guard = self.op_lock.lock().await;

        if let Err(e) = self.store.reload() {
            warn!("Could not reload session store: {e}");
            return;
        }

        let access_token = self.store.get(ACCESS_TOKEN_KEY);
        let user = self.cached_user();
        let next = match (access_token, user) {
            (Some(access_token), Some(user)) if !user.is_locked => {
                SessionState::Authenticated(Session {
                    access_token,
                    refresh_token: self.store.get(REFRESH_TOKEN_KEY),
                    user,
                })
            }
            _ => SessionState::Anonymous,
        };
        debug!(key, authenticated = next.is_authenticated(), "Session synchronized from store");
        self.publish(next);
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<AccountSummary, SessionError> {
        let account_id = token::subject_id_of(access_token)?;
        let resp = self.api.fetch_account(access_token, account_id).await?;
        let message = resp.message.clone();
        resp.into_data().ok_or_else(|| {
            SessionError::ProfileUnavailable(message.unwrap_or_else(|| "empty response".into()))
        })
    }

    fn cached_user(&self) -> Option<AccountSummary> {
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring unreadable cached profile: {e}");
                None
            }
        }
    }

    fn persist_user(&self, user: &AccountSummary) -> Result<(), SessionError> {
        let raw = serde_json::to_string(user)
            .map_err(|e| SessionError::Storage(StorageError::Serde(e)))?;
        self.store.set(USER_KEY, &raw)?;
        Ok(())
    }

    fn clear_persisted(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to remove {key} from session store: {e}");
            }
        }
    }

    fn publish_session(&self, session: Session) {
        self.publish(SessionState::Authenticated(session));
    }

    fn publish(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}
