use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Uri};
use course_core::CourseError;

use crate::CourseAxumError;

/// Query string, headers and path of a request, with typed accessors that
/// fail as `ValidationError`.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub method: String,
    pub path: String,
}

impl RequestParams {
    pub fn from_parts(headers: &HeaderMap, query: HashMap<String, String>, method: &str, uri: &Uri) -> Self {
        let mut out = Self {
            headers: HashMap::new(),
            query,
            method: method.to_string(),
            path: uri.path().to_string(),
        };

        for (k, v) in headers.iter() {
            if let Ok(s) = v.to_str() {
                out.headers.insert(k.to_string(), s.to_string());
            }
        }

        out
    }

    /// A query value; empty strings count as absent.
    pub fn optional(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, key: &str) -> Result<&str, CourseError> {
        self.optional(key)
            .ok_or_else(|| CourseError::validation(format!("Missing required parameter: {key}")))
    }

    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, CourseError>
    where
        T: FromStr,
    {
        match self.optional(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| CourseError::validation(format!("Invalid value for {key}: {raw}"))),
        }
    }

    pub fn parse_required<T>(&self, key: &str) -> Result<T, CourseError>
    where
        T: FromStr,
    {
        self.parse(key)?
            .ok_or_else(|| CourseError::validation(format!("Missing required parameter: {key}")))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Token from `Authorization: Bearer <token>`.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.header("authorization")?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

impl<S> FromRequestParts<S> for RequestParams
where
    S: Send + Sync,
{
    type Rejection = CourseAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)?;
        Ok(Self::from_parts(&parts.headers, query, parts.method.as_str(), &parts.uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::ErrorKind;

    fn params(query: &[(&str, &str)], headers: &[(&str, &str)]) -> RequestParams {
        RequestParams {
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            query: query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..RequestParams::default()
        }
    }

    #[test]
    fn required_rejects_missing_and_blank_values() {
        let p = params(&[("courseId", "  ")], &[]);
        let err = p.required("courseId").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("courseId"));
    }

    #[test]
    fn parse_reports_bad_numbers() {
        let p = params(&[("chunkIndex", "two"), ("totalChunks", "3")], &[]);
        assert_eq!(p.parse::<u32>("totalChunks").unwrap(), Some(3));
        assert!(p.parse::<u32>("chunkIndex").is_err());
        assert_eq!(p.parse::<u32>("missing").unwrap(), None);
    }

    #[test]
    fn bearer_token_requires_the_scheme() {
        assert_eq!(params(&[], &[("authorization", "Bearer abc")]).bearer_token(), Some("abc"));
        assert_eq!(params(&[], &[("authorization", "bearer  abc ")]).bearer_token(), Some("abc"));
        assert_eq!(params(&[], &[("authorization", "Basic abc")]).bearer_token(), None);
        assert_eq!(params(&[], &[]).bearer_token(), None);
    }
}
