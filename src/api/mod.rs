//! HTTP front end
//!
//! Maps `POST`, `GET` and `DELETE /api/v1/certificates/{domain}` onto the
//! lifecycle manager. Sweeps are not exposed here.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{build_router, ApiState};
pub use server::start_api_server;
