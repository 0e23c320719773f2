use course_core::CourseError;

use crate::params::RequestParams;

/// Shared-secret bearer check for admin and cron routes.
///
/// A guard without a secret lets every request through.
#[derive(Debug, Clone, Default)]
pub struct BearerGuard {
    secret: Option<String>,
}

impl BearerGuard {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn open() -> Self {
        Self { secret: None }
    }

    pub fn is_open(&self) -> bool {
        self.secret.is_none()
    }

    pub fn check(&self, params: &RequestParams) -> Result<(), CourseError> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };

        match params.bearer_token() {
            Some(token) if constant_time_eq(token.as_bytes(), secret.as_bytes()) => Ok(()),
            Some(_) => Err(CourseError::not_authenticated("Invalid bearer token")),
            None => Err(CourseError::not_authenticated("Missing bearer token")),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::ErrorKind;

    fn with_auth(value: Option<&str>) -> RequestParams {
        let mut p = RequestParams::default();
        if let Some(v) = value {
            p.headers.insert("authorization".into(), v.into());
        }
        p
    }

    #[test]
    fn open_guard_accepts_anything() {
        let guard = BearerGuard::new(Some(String::new()));
        assert!(guard.is_open());
        assert!(guard.check(&with_auth(None)).is_ok());
    }

    #[test]
    fn secret_must_match() {
        let guard = BearerGuard::new(Some("s3cret".into()));
        assert!(guard.check(&with_auth(Some("Bearer s3cret"))).is_ok());

        let err = guard.check(&with_auth(Some("Bearer nope"))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAuthenticated);
        assert_eq!(err.code(), 401);

        assert!(guard.check(&with_auth(None)).is_err());
    }
}
