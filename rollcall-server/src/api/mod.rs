//! HTTP API handlers for rollcall-server
//!
//! Handlers are thin: they extract the caller ([`Actor`](crate::models::Actor))
//! and the request body, call a service, and serialize the result. Errors
//! map to status codes in [`ApiError`](crate::error::ApiError).

pub mod attendance;
pub mod audit;
pub mod auth;
pub mod disputes;
pub mod face;
pub mod health;
pub mod lectures;
pub mod overrides;

pub use attendance::attendance_routes;
pub use audit::audit_routes;
pub use disputes::dispute_routes;
pub use face::face_routes;
pub use health::health_routes;
pub use lectures::lecture_routes;
pub use overrides::override_routes;
