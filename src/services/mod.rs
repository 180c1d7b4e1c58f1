pub mod api;
pub mod booking;
pub mod oauth;
pub mod session;
pub mod storage;
pub mod token;
pub mod validation;
