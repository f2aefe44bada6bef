//! Request extractors whose rejections use the API's JSON error body.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};

use crate::error::AppError;

/// `axum::Json` with an [`AppError`] rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with an [`AppError`] rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `axum::extract::Path` with an [`AppError`] rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// The error for a request lacking some of `fields`, given as
/// `(name, present)` pairs.
#[must_use]
pub fn missing_fields<const N: usize>(fields: [(&str, bool); N]) -> AppError {
    AppError::MissingField(
        fields
            .iter()
            .filter(|(_, present)| !present)
            .map(|(field, _)| format!("{field} is required"))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_names_absent_fields() {
        let AppError::MissingField(missing) =
            missing_fields([("userId", false), ("productId", true), ("quantity", false)])
        else {
            panic!("expected missing fields");
        };
        assert_eq!(missing, vec!["userId is required", "quantity is required"]);
    }
}
