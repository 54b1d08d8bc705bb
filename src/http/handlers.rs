// SPDX-License-Identifier: MIT
use axum::http::StatusCode;

/// `GET /first`: one informational log record, `200 OK`, empty body.
///
/// The record is emitted inside the request span, so the log bridge stamps it with
/// the request's trace and span ids.
pub async fn first() -> StatusCode {
    tracing::info!(route = "/first", "first endpoint reached");
    StatusCode::OK
}
