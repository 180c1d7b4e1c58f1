//! Client-side checks on a booking draft, run before any booking call.
//!
//! Every rule is evaluated so a single pass reports all offending fields.
//! Empty optional fields are treated as absent.

use chrono::{Local, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::booking::{BookingDraft, GuestInfo};

pub const MIN_ROOMS: i64 = 1;
pub const MAX_ROOMS: i64 = 10;

lazy_static! {
    // Letters from any script (Vietnamese diacritics included) and whitespace
    static ref FULL_NAME_RE: Regex = Regex::new(r"^[\p{L}\s]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^(0|\+84)[0-9]{9,10}$").unwrap();
    static ref IDENTITY_CARD_RE: Regex = Regex::new(r"^[0-9]{9,12}$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingField {
    CheckInDate,
    CheckOutDate,
    Quantity,
    FullName,
    Email,
    PhoneNumber,
    IdentityCard,
    Address,
    SpecialRequests,
}

impl BookingField {
    /// Form field name as used by the booking API.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingField::CheckInDate => "checkInDate",
            BookingField::CheckOutDate => "checkOutDate",
            BookingField::Quantity => "quantity",
            BookingField::FullName => "fullName",
            BookingField::Email => "email",
            BookingField::PhoneNumber => "phoneNumber",
            BookingField::IdentityCard => "identityCard",
            BookingField::Address => "address",
            BookingField::SpecialRequests => "specialRequests",
        }
    }
}

impl std::fmt::Display for BookingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: BookingField,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: BookingField, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, field: BookingField) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn for_field(&self, field: BookingField) -> impl Iterator<Item = &FieldError> {
        self.0.iter().filter(move |e| e.field == field)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl BookingDraft {
    /// Validate against today's local date.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_booking_draft(self, Local::now().date_naive())
    }
}

/// Validate the whole draft. `today` is the local calendar date.
pub fn validate_booking_draft(draft: &BookingDraft, today: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_dates(draft, today, &mut errors);
    check_quantity(draft.quantity, &mut errors);
    check_guest(&draft.guest, &mut errors);
    errors.into_result()
}

/// Date-range and room-count rules only, for the room search step.
pub fn validate_stay(draft: &BookingDraft, today: NaiveDate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_dates(draft, today, &mut errors);
    check_quantity(draft.quantity, &mut errors);
    errors.into_result()
}

/// Guest contact rules only, for the guest details step.
pub fn validate_guest_info(guest: &GuestInfo) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_guest(guest, &mut errors);
    errors.into_result()
}

fn check_dates(draft: &BookingDraft, today: NaiveDate, errors: &mut ValidationErrors) {
    match draft.check_in_date {
        None => errors.push(BookingField::CheckInDate, "Vui lòng chọn ngày nhận phòng"),
        Some(check_in) if check_in < today => errors.push(
            BookingField::CheckInDate,
            "Ngày nhận phòng không được trước ngày hôm nay",
        ),
        Some(_) => {}
    }

    match (draft.check_in_date, draft.check_out_date) {
        (_, None) => errors.push(BookingField::CheckOutDate, "Vui lòng chọn ngày trả phòng"),
        (Some(check_in), Some(check_out)) if check_out <= check_in => errors.push(
            BookingField::CheckOutDate,
            "Ngày trả phòng phải sau ngày nhận phòng",
        ),
        // On calendar dates, strictly after is the same as a stay of at least one night.
        _ => {}
    }
}

fn check_quantity(quantity: i64, errors: &mut ValidationErrors) {
    if !(MIN_ROOMS..=MAX_ROOMS).contains(&quantity) {
        errors.push(BookingField::Quantity, "Số lượng phòng phải từ 1 đến 10");
    }
}

fn check_guest(guest: &GuestInfo, errors: &mut ValidationErrors) {
    let name = guest.full_name.trim();
    if name.is_empty() {
        errors.push(BookingField::FullName, "Vui lòng nhập họ và tên");
    } else {
        let len = name.chars().count();
        if !(2..=100).contains(&len) {
            errors.push(BookingField::FullName, "Họ và tên phải có từ 2 đến 100 ký tự");
        }
        if !FULL_NAME_RE.is_match(name) {
            errors.push(
                BookingField::FullName,
                "Họ và tên chỉ được chứa chữ cái và khoảng trắng",
            );
        }
    }

    let email = guest.email.trim();
    if email.is_empty() {
        errors.push(BookingField::Email, "Vui lòng nhập email");
    } else {
        if !EMAIL_RE.is_match(email) {
            errors.push(BookingField::Email, "Email không hợp lệ");
        }
        if email.chars().count() > 100 {
            errors.push(BookingField::Email, "Email không được vượt quá 100 ký tự");
        }
    }

    let phone = guest.phone_number.trim();
    if phone.is_empty() {
        errors.push(BookingField::PhoneNumber, "Vui lòng nhập số điện thoại");
    } else if !PHONE_RE.is_match(phone) {
        errors.push(BookingField::PhoneNumber, "Số điện thoại không hợp lệ");
    }

    if let Some(card) = present(&guest.identity_card) {
        if !IDENTITY_CARD_RE.is_match(card) {
            errors.push(BookingField::IdentityCard, "CMND/CCCD phải có từ 9 đến 12 chữ số");
        }
    }

    if let Some(address) = present(&guest.address) {
        if address.chars().count() > 200 {
            errors.push(BookingField::Address, "Địa chỉ không được vượt quá 200 ký tự");
        }
    }

    if let Some(requests) = present(&guest.special_requests) {
        if requests.chars().count() > 500 {
            errors.push(
                BookingField::SpecialRequests,
                "Yêu cầu đặc biệt không được vượt quá 500 ký tự",
            );
        }
    }
}

/// Optional text with surrounding whitespace dropped; empty means absent.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
