#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::Notify;

use hotel_booking_client::{
    models::{
        account::{AccountSummary, Role},
        auth::{ApiResponse, LoginData, RefreshData},
        booking::{Booking, CreateBookingRequest},
    },
    services::{
        api::{ApiError, AuthApi},
        session::SessionManager,
        storage::{MemoryStore, SessionStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY},
    },
};

/// Signed like the server would; the client never checks the signature.
pub fn mint_token(account_id: i64, expires_in: i64) -> String {
    sign(&json!({
        "accountId": account_id,
        "exp": Utc::now().timestamp() + expires_in,
        "iat": Utc::now().timestamp(),
    }))
}

pub fn sign(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(b"booking-api-secret"),
    )
    .unwrap()
}

pub fn live_token(account_id: i64) -> String {
    mint_token(account_id, 3600)
}

pub fn expired_token(account_id: i64) -> String {
    mint_token(account_id, -30)
}

pub fn account(id: i64, roles: Vec<Role>) -> AccountSummary {
    AccountSummary {
        id,
        username: format!("user{id}"),
        email: format!("user{id}@example.com"),
        roles,
        is_locked: false,
        customer: None,
        employee: None,
    }
}

pub fn locked(mut account: AccountSummary) -> AccountSummary {
    account.is_locked = true;
    account
}

pub enum LoginBehavior {
    Succeed(LoginData),
    Reject(Option<String>),
    Fail,
}

/// In-process stand-in for the booking API that records every call.
pub struct FakeApi {
    pub login: Mutex<LoginBehavior>,
    pub refreshed_token: Mutex<Option<String>>,
    pub account: Mutex<Option<AccountSummary>>,
    pub account_unauthorized: Mutex<bool>,
    pub logout_fails: Mutex<bool>,
    pub booking: Mutex<Option<Booking>>,
    pub booking_unauthorized: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
    pub bearer_tokens: Mutex<Vec<String>>,
    pub booking_requests: Mutex<Vec<CreateBookingRequest>>,
    /// When set, `refresh_token` waits here before answering.
    pub refresh_gate: Mutex<Option<Arc<Notify>>>,
    pub refresh_started: Notify,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            login: Mutex::new(LoginBehavior::Reject(None)),
            refreshed_token: Mutex::new(None),
            account: Mutex::new(None),
            account_unauthorized: Mutex::new(false),
            logout_fails: Mutex::new(false),
            booking: Mutex::new(None),
            booking_unauthorized: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
            bearer_tokens: Mutex::new(Vec::new()),
            booking_requests: Mutex::new(Vec::new()),
            refresh_gate: Mutex::new(None),
            refresh_started: Notify::new(),
        }
    }
}

impl FakeApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn bearer(&self, token: &str) {
        self.bearer_tokens.lock().unwrap().push(token.to_string());
    }
}

fn ok<T>(data: T) -> ApiResponse<T> {
    ApiResponse { is_success: true, data: Some(data), message: None }
}

fn refused<T>(message: Option<String>) -> ApiResponse<T> {
    ApiResponse { is_success: false, data: None, message }
}

#[async_trait::async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<ApiResponse<LoginData>, ApiError> {
        self.record("login");
        match &*self.login.lock().unwrap() {
            LoginBehavior::Succeed(data) => Ok(ok(data.clone())),
            LoginBehavior::Reject(message) => Ok(refused(message.clone())),
            LoginBehavior::Fail => Err(ApiError::Decode("connection reset".into())),
        }
    }

    async fn refresh_token(
        &self,
        _account_id: i64,
        _refresh_token: &str,
    ) -> Result<ApiResponse<RefreshData>, ApiError> {
        self.record("refresh");
        self.refresh_started.notify_one();
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(match self.refreshed_token.lock().unwrap().clone() {
            Some(token) => ok(RefreshData { token }),
            None => refused(Some("Refresh token không hợp lệ".into())),
        })
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.record("logout");
        self.bearer(access_token);
        if *self.logout_fails.lock().unwrap() {
            return Err(ApiError::Server { status: 500, message: "boom".into() });
        }
        Ok(())
    }

    async fn fetch_account(
        &self,
        access_token: &str,
        _account_id: i64,
    ) -> Result<ApiResponse<AccountSummary>, ApiError> {
        self.record("account");
        self.bearer(access_token);
        if *self.account_unauthorized.lock().unwrap() {
            return Err(ApiError::Unauthorized);
        }
        Ok(match self.account.lock().unwrap().clone() {
            Some(account) => ok(account),
            None => refused(Some("Không tìm thấy tài khoản".into())),
        })
    }

    async fn create_booking(
        &self,
        access_token: &str,
        request: &CreateBookingRequest,
    ) -> Result<ApiResponse<Booking>, ApiError> {
        self.record("create_booking");
        self.bearer(access_token);
        self.booking_requests.lock().unwrap().push(request.clone());
        if *self.booking_unauthorized.lock().unwrap() {
            return Err(ApiError::Unauthorized);
        }
        Ok(match self.booking.lock().unwrap().clone() {
            Some(booking) => ok(booking),
            None => refused(Some("Hết phòng".into())),
        })
    }

    async fn confirm_booking(
        &self,
        access_token: &str,
        booking_id: i64,
    ) -> Result<ApiResponse<Booking>, ApiError> {
        self.record("confirm_booking");
        self.bearer(access_token);
        Ok(match self.booking.lock().unwrap().clone() {
            Some(mut booking) if booking.id == booking_id => {
                booking.status = "Confirmed".into();
                ok(booking)
            }
            _ => refused(None),
        })
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryStore>,
    pub session: Arc<SessionManager>,
}

impl Harness {
    pub fn new(api: FakeApi, store: MemoryStore) -> Self {
        let api = Arc::new(api);
        let store = Arc::new(store);
        let session = Arc::new(SessionManager::new(api.clone(), store.clone()));
        Self { api, store, session }
    }

    /// Persisted credentials as a previous run would have left them.
    pub fn persisted(api: FakeApi, access: &str, refresh: Option<&str>, user: Option<&AccountSummary>) -> Self {
        let store = MemoryStore::new();
        store.set(ACCESS_TOKEN_KEY, access).unwrap();
        if let Some(refresh) = refresh {
            store.set(REFRESH_TOKEN_KEY, refresh).unwrap();
        }
        if let Some(user) = user {
            store.set(USER_KEY, &serde_json::to_string(user).unwrap()).unwrap();
        }
        Self::new(api, store)
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    pub fn credentials_cleared(&self) -> bool {
        [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY]
            .iter()
            .all(|k| self.store.get(k).is_none())
    }
}
