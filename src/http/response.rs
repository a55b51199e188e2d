//! Error responses.
//!
//! # Responsibilities
//! - Render every error as `{"error": <message>}`
//! - Keep client-facing text fixed and generic
//! - Log server errors with request method and URL
//!
//! # Design Decisions
//! - Internal error detail never reaches the client
//! - If the envelope itself cannot be encoded, the failure is logged and a
//!   bare 500 is returned instead

use std::collections::BTreeMap;
use std::fmt::Display;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;
use serde::Serialize;

use crate::http::request::RequestMeta;

#[derive(Serialize)]
struct Envelope<'a, M: Serialize + ?Sized> {
    error: &'a M,
}

/// Log a server-side error with the request that caused it.
pub fn log_error(meta: &RequestMeta, err: &dyn Display) {
    tracing::error!(
        request_method = %meta.method,
        request_url = %meta.uri,
        error = %err,
        "Request failed"
    );
}

/// Render `message` under the `error` key with `status`.
pub fn error_response<M>(meta: &RequestMeta, status: StatusCode, message: &M) -> Response
where
    M: Serialize + ?Sized,
{
    match serde_json::to_vec(&Envelope { error: message }) {
        Ok(mut body) => {
            body.push(b'\n');
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(err) => {
            log_error(meta, &err);
            bare_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn bare_status(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// 500: logs `err` in full, tells the client nothing about it.
pub fn server_error_response(meta: &RequestMeta, err: &dyn Display) -> Response {
    log_error(meta, err);
    error_response(
        meta,
        StatusCode::INTERNAL_SERVER_ERROR,
        "the server encountered a problem and could not process your request",
    )
}

pub fn not_found_response(meta: &RequestMeta) -> Response {
    error_response(
        meta,
        StatusCode::NOT_FOUND,
        "the requested resource could not be found",
    )
}

/// 405 with an `Allow` header listing `allowed`.
pub fn method_not_allowed_response(meta: &RequestMeta, allowed: &[Method]) -> Response {
    let message = format!(
        "the {} method is not supported for this resource",
        meta.method
    );
    let mut response = error_response(meta, StatusCode::METHOD_NOT_ALLOWED, &message);
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

pub fn bad_request_response(meta: &RequestMeta, err: &dyn Display) -> Response {
    error_response(meta, StatusCode::BAD_REQUEST, &err.to_string())
}

/// 422 with one message per invalid field.
pub fn failed_validation_response(
    meta: &RequestMeta,
    errors: &BTreeMap<String, String>,
) -> Response {
    error_response(meta, StatusCode::UNPROCESSABLE_ENTITY, errors)
}

pub fn edit_conflict_response(meta: &RequestMeta) -> Response {
    error_response(
        meta,
        StatusCode::CONFLICT,
        "unable to update the record due to an edit conflict, please try again",
    )
}

pub fn rate_limit_exceeded_response(meta: &RequestMeta) -> Response {
    error_response(meta, StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
}

pub fn invalid_credentials_response(meta: &RequestMeta) -> Response {
    error_response(
        meta,
        StatusCode::UNAUTHORIZED,
        "invalid authentication credentials",
    )
}

/// 401 that reminds the client to authenticate with a bearer token.
pub fn invalid_authentication_token_response(meta: &RequestMeta) -> Response {
    let mut response = error_response(
        meta,
        StatusCode::UNAUTHORIZED,
        "invalid or missing authentication token",
    );
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

pub fn authentication_required_response(meta: &RequestMeta) -> Response {
    error_response(
        meta,
        StatusCode::UNAUTHORIZED,
        "you must be authenticated to access this resource",
    )
}

pub fn inactive_account_response(meta: &RequestMeta) -> Response {
    error_response(
        meta,
        StatusCode::FORBIDDEN,
        "your user account must be activated to access this resource",
    )
}

pub fn not_permitted_response(meta: &RequestMeta) -> Response {
    error_response(
        meta,
        StatusCode::FORBIDDEN,
        "your user account doesn't have the necessary permissions to access this resource",
    )
}
