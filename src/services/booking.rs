use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::{
    models::booking::{Booking, BookingDraft, CreateBookingRequest},
    services::{
        api::{ApiError, AuthApi},
        session::{SessionError, SessionManager},
        validation::{present, validate_booking_draft, ValidationErrors},
    },
};

pub const BOOKING_REJECTED_MESSAGE: &str = "Không thể đặt phòng, vui lòng thử lại";

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid booking: {0}")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    Rejected(String),
}

impl CreateBookingRequest {
    /// Build the API body from a draft. `None` when either date is missing.
    pub fn from_draft(room_type_id: i64, draft: &BookingDraft) -> Option<Self> {
        let guest = &draft.guest;
        Some(Self {
            room_type_id,
            check_in_date: draft.check_in_date?,
            check_out_date: draft.check_out_date?,
            quantity: draft.quantity,
            full_name: guest.full_name.trim().to_string(),
            email: guest.email.trim().to_string(),
            phone_number: guest.phone_number.trim().to_string(),
            identity_card: present(&guest.identity_card).map(str::to_string),
            address: present(&guest.address).map(str::to_string),
            special_requests: present(&guest.special_requests).map(str::to_string),
        })
    }
}

/// Submits validated drafts to the booking API on behalf of the signed-in
/// account.
pub struct BookingService {
    api: Arc<dyn AuthApi>,
    session: Arc<SessionManager>,
}

impl BookingService {
    pub fn new(api: Arc<dyn AuthApi>, session: Arc<SessionManager>) -> Self {
        Self { api, session }
    }

    pub async fn submit(&self, room_type_id: i64, draft: &BookingDraft) -> Result<Booking, BookingError> {
        self.submit_on(room_type_id, draft, Local::now().date_naive()).await
    }

    /// Validate against `today` and create the booking. Nothing is sent when
    /// validation fails.
    pub async fn submit_on(
        &self,
        room_type_id: i64,
        draft: &BookingDraft,
        today: NaiveDate,
    ) -> Result<Booking, BookingError> {
        validate_booking_draft(draft, today).map_err(BookingError::Invalid)?;
        let request = CreateBookingRequest::from_draft(room_type_id, draft)
            .ok_or_else(|| BookingError::Rejected(BOOKING_REJECTED_MESSAGE.to_string()))?;

        let token = self.session.valid_access_token().await?;
        let resp = self.authorized(self.api.create_booking(&token, &request).await).await?;
        let message = resp.message.clone();
        let booking = resp
            .into_data()
            .ok_or_else(|| BookingError::Rejected(message.unwrap_or_else(|| BOOKING_REJECTED_MESSAGE.into())))?;

        info!(
            booking_id = booking.id,
            room_type_id,
            nights = draft.nights().unwrap_or_default(),
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn confirm(&self, booking_id: i64) -> Result<Booking, BookingError> {
        let token = self.session.valid_access_token().await?;
        let resp = self.authorized(self.api.confirm_booking(&token, booking_id).await).await?;
        let message = resp.message.clone();
        let booking = resp
            .into_data()
            .ok_or_else(|| BookingError::Rejected(message.unwrap_or_else(|| BOOKING_REJECTED_MESSAGE.into())))?;
        info!(booking_id, status = %booking.status, "Booking confirmed");
        Ok(booking)
    }

    /// A 401 on a fresh token means the session is gone server-side.
    async fn authorized<T>(&self, result: Result<T, ApiError>) -> Result<T, BookingError> {
        match result {
            Err(ApiError::Unauthorized) => {
                warn!("Booking API rejected the access token, signing out");
                self.session.logout().await;
                Err(SessionError::SessionExpired.into())
            }
            other => Ok(other?),
        }
    }
}
