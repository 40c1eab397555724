//! Request extractors that fail with a [SchoolError].
//!
//! axum's own `Json`, `Query` and `Path` reject bad input with their own
//! status codes and plain-text bodies. These wrappers defer to them and turn
//! any rejection into a `400` in the usual `{message, statusCode}` shape, so
//! handlers should import them from here instead of from axum.

use async_trait::async_trait;
use axum::body::HttpBody;
use axum::extract::{FromRequest, RequestParts};
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SchoolError;

/// A JSON request body, or a JSON response.
#[derive(Clone, Copy, Debug, Default)]
pub struct Json<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Json<T>
where
    T: DeserializeOwned,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = SchoolError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        axum::Json::<T>::from_request(req)
            .await
            .map(|axum::Json(value)| Json(value))
            .map_err(|rejection| bad_input("request body", rejection))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// The query string, deserialized.
#[derive(Clone, Copy, Debug, Default)]
pub struct Query<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Query<T>
where
    T: DeserializeOwned,
    B: Send,
{
    type Rejection = SchoolError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        axum::extract::Query::<T>::from_request(req)
            .await
            .map(|axum::extract::Query(value)| Query(value))
            .map_err(|rejection| bad_input("query string", rejection))
    }
}

/// Parameters captured from the route path.
#[derive(Clone, Copy, Debug)]
pub struct Path<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Path<T>
where
    T: DeserializeOwned + Send,
    B: Send,
{
    type Rejection = SchoolError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        axum::extract::Path::<T>::from_request(req)
            .await
            .map(|axum::extract::Path(value)| Path(value))
            .map_err(|rejection| bad_input("path", rejection))
    }
}

fn bad_input(part: &str, rejection: impl std::fmt::Display) -> SchoolError {
    tracing::debug!(%rejection, part, "rejected request");
    SchoolError::BadRequest(format!("Invalid {}: {}", part, rejection))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Enrollment {
        subject_code: String,
    }

    fn json_request(body: &str) -> RequestParts<Body> {
        RequestParts::new(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn well_formed_bodies_deserialize() {
        let mut req = json_request(r#"{"subjectCode":"MATH-7"}"#);
        let Json(enrollment) = Json::<Enrollment>::from_request(&mut req).await.unwrap();

        assert_eq!(enrollment.subject_code, "MATH-7");
    }

    #[tokio::test]
    async fn mistyped_bodies_are_bad_requests() {
        let mut req = json_request(r#"{"subjectCode":[7]}"#);
        let error = Json::<Enrollment>::from_request(&mut req).await.unwrap_err();

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn unparseable_path_ids_are_bad_requests() {
        let mut req = RequestParts::new(Request::builder().uri("/").body(Body::empty()).unwrap());
        // No route params were captured, so path extraction must fail.
        let error = Path::<i64>::from_request(&mut req).await.unwrap_err();

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}
