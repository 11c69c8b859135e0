pub mod booking;
pub mod contact;
pub mod deletion;
pub mod event;
pub mod registration;
pub mod tracking;
pub mod user;
