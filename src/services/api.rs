//! Client for the external booking REST API.
//!
//! Session and booking services talk to the API through the [`AuthApi`]
//! trait so they can be exercised against an in-process fake. [`HttpApi`]
//! is the reqwest-backed implementation used by the binary.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::models::{
    account::AccountSummary,
    auth::{ApiResponse, LoginData, LoginRequest, RefreshData, RefreshTokenRequest},
    booking::{Booking, CreateBookingRequest},
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("decode: {0}")]
    Decode(String),
}

#[async_trait::async_trait]
pub trait AuthApi: Send + Sync + 'static {
    async fn login(&self, email: &str, password: &str) -> Result<ApiResponse<LoginData>, ApiError>;

    async fn refresh_token(
        &self,
        account_id: i64,
        refresh_token: &str,
    ) -> Result<ApiResponse<RefreshData>, ApiError>;

    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;

    async fn fetch_account(
        &self,
        access_token: &str,
        account_id: i64,
    ) -> Result<ApiResponse<AccountSummary>, ApiError>;

    async fn create_booking(
        &self,
        access_token: &str,
        request: &CreateBookingRequest,
    ) -> Result<ApiResponse<Booking>, ApiError>;

    async fn confirm_booking(
        &self,
        access_token: &str,
        booking_id: i64,
    ) -> Result<ApiResponse<Booking>, ApiError>;
}

pub struct HttpApi {
    http: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Send a request and unwrap the API envelope, mapping HTTP errors.
    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<ApiResponse<T>, ApiError> {
        let resp = req.send().await?;
        Self::parse(resp).await
    }

    async fn parse<T: DeserializeOwned>(resp: Response) -> Result<ApiResponse<T>, ApiError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            // Only an envelope message is fit for display; proxies send HTML
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|r| r.message)
                .unwrap_or_default();
            return Err(ApiError::Server { status: status.as_u16(), message });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("response body: {e}")))
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, email: &str, password: &str) -> Result<ApiResponse<LoginData>, ApiError> {
        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        let req = self.http.post(self.url("Auth/login")).json(&body);
        let resp = req.send().await?;
        // Bad credentials come back as 401 with an envelope; keep its message.
        if resp.status() == StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            return Ok(serde_json::from_str(&body).unwrap_or(ApiResponse {
                is_success: false,
                data: None,
                message: None,
            }));
        }
        Self::parse(resp).await
    }

    async fn refresh_token(
        &self,
        account_id: i64,
        refresh_token: &str,
    ) -> Result<ApiResponse<RefreshData>, ApiError> {
        let body = RefreshTokenRequest { account_id, refresh_token: refresh_token.to_string() };
        Self::send(self.http.post(self.url("Auth/refresh-token")).json(&body)).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        let req = self.http.post(self.url("Auth/logout")).bearer_auth(access_token);
        Self::send::<serde_json::Value>(req).await.map(|_| ())
    }

    async fn fetch_account(
        &self,
        access_token: &str,
        account_id: i64,
    ) -> Result<ApiResponse<AccountSummary>, ApiError> {
        let req = self
            .http
            .get(self.url(&format!("Account/{account_id}")))
            .bearer_auth(access_token);
        Self::send(req).await
    }

    async fn create_booking(
        &self,
        access_token: &str,
        request: &CreateBookingRequest,
    ) -> Result<ApiResponse<Booking>, ApiError> {
        let req = self.http.post(self.url("Booking")).bearer_auth(access_token).json(request);
        Self::send(req).await
    }

    async fn confirm_booking(
        &self,
        access_token: &str,
        booking_id: i64,
    ) -> Result<ApiResponse<Booking>, ApiError> {
        let req = self
            .http
            .post(self.url(&format!("Booking/{booking_id}/confirm")))
            .bearer_auth(access_token);
        Self::send(req).await
    }
}
