use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized - session may be expired")]
    Unauthorized,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Identity service error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data. The cut
    /// backs off to a char boundary so multi-byte bodies cannot panic the
    /// slice.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut cut = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            // The token endpoint reports bad credentials as a 400
            // invalid_grant, not a 401.
            400 => ApiError::InvalidCredentials,
            401 | 403 => ApiError::Unauthorized,
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "invalid_grant"),
            ApiError::InvalidCredentials
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "oops"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_long_bodies_truncated() {
        let body = "x".repeat(2000);
        let ApiError::ServerError(message) =
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body)
        else {
            panic!("expected ServerError");
        };
        assert!(message.len() < body.len());
        assert!(message.contains("truncated"));
    }

    #[test]
    fn test_multibyte_body_truncated_on_char_boundary() {
        // 200 euro signs is 600 bytes; byte 500 falls mid-character.
        let body = "\u{20ac}".repeat(200);
        let ApiError::ServerError(message) =
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body)
        else {
            panic!("expected ServerError");
        };
        assert!(message.contains("600 total bytes"));
        assert!(message.starts_with('\u{20ac}'));
    }
}
