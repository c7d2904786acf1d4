// The identity provider authenticates the caller; the gateway in front of this
// service forwards the verified user id in a header.
use crate::error_handler::ServiceError;
use actix_web::http::header::HeaderMap;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// The caller every query is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        log::warn!("{} header was not found in request headers.", USER_ID_HEADER);
        return Err(ServiceError::Unauthorized(format!(
            "Missing {} header. Authentication required.",
            USER_ID_HEADER
        )));
    };

    let raw = value.to_str().map_err(|_| {
        log::warn!("{} header is not valid UTF-8.", USER_ID_HEADER);
        ServiceError::BadRequest(format!(
            "{} header contains invalid characters.",
            USER_ID_HEADER
        ))
    })?;

    if raw.trim().is_empty() {
        log::warn!("{} header is present but empty.", USER_ID_HEADER);
        return Err(ServiceError::BadRequest(format!(
            "{} header cannot be empty.",
            USER_ID_HEADER
        )));
    }

    Uuid::parse_str(raw.trim()).map_err(|parse_err| {
        log::warn!(
            "Failed to parse {} '{}' to UUID: {}",
            USER_ID_HEADER,
            raw,
            parse_err
        );
        ServiceError::BadRequest(format!(
            "Invalid {} header format (not a valid UUID).",
            USER_ID_HEADER
        ))
    })
}

impl FromRequest for AuthenticatedUser {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = user_id_from_headers(req.headers()).map(|id| {
            log::debug!("Request authenticated for user {}", id);
            AuthenticatedUser { id }
        });
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use actix_web::ResponseError;

    #[actix_web::test]
    async fn extracts_valid_user_id() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();
        let user = AuthenticatedUser::extract(&req).await.unwrap();
        assert_eq!(user.id, id);
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        let err = AuthenticatedUser::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn malformed_header_is_bad_request() {
        for bad in ["", "   ", "not-a-uuid"] {
            let req = TestRequest::default()
                .insert_header((USER_ID_HEADER, bad))
                .to_http_request();
            let err = AuthenticatedUser::extract(&req).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "header {:?}", bad);
        }
    }
}
