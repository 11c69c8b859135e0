pub mod account;
pub mod auth;
pub mod bookings;
pub mod contact;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod registrations;

pub use account::{handle_delete_account, handle_delete_user_admin};
pub use auth::{handle_signin, handle_signout, handle_signup};
pub use bookings::create_booking;
pub use contact::handle_contact;
pub use dashboard::dashboard_stats;
pub use events::{list_events, list_upcoming_events};
pub use health::health_check;
pub use registrations::{cancel_registration, create_registration, list_registrations};
