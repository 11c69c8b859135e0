pub mod config;
pub mod deletion;
pub mod models;
pub mod responses;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod worker;

pub use state::AppState;
