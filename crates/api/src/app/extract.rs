//! Body and query extractors whose rejections use the JSON error shape.

use axum::extract::{FromRequest, FromRequestParts};
use axum::extract::rejection::{JsonRejection, QueryRejection};

use crate::app::errors::ApiError;

/// `axum::Json` that rejects malformed bodies with a 400 [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` that rejects bad query strings with a 400 [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(format!("invalid query string: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Quantity {
        quantity: i64,
    }

    #[tokio::test]
    async fn wrong_body_types_are_validation_errors() {
        let req = Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"quantity":"two"}"#))
            .unwrap();

        let err = ApiJson::<Quantity>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn bad_query_values_are_validation_errors() {
        let (mut parts, _) = Request::get("/?quantity=abc").body(()).unwrap().into_parts();

        let err = ApiQuery::<Quantity>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let (mut parts, _) = Request::get("/?quantity=3").body(()).unwrap().into_parts();
        let ApiQuery(q) = ApiQuery::<Quantity>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(q.quantity, 3);
    }
}
