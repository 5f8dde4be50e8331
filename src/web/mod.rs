pub mod admin;
pub mod auth;
pub mod journals;
pub mod models;
pub mod router;
pub mod state;
pub mod storage;
pub mod students;

pub use state::AppState;
