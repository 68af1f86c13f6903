//! REST API module.
//!
//! Dynamic `/api/{resource}[/{id}]` handlers: the resource segment resolves
//! to a [`crate::models::Resource`] and each verb maps onto the
//! load/verify/sanitize/save pipeline.

mod content;

pub use content::*;

use axum::response::Response;

use crate::errors::AppError;

/// Handlers either produce a ready response or an [`AppError`] that
/// serializes to `{"error": "..."}` with the mapped status.
pub type ApiResult = Result<Response, AppError>;
