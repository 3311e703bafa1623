//! Replayable request description
//!
//! Requests are kept as plain data rather than `reqwest::Request` so a call
//! parked behind a token refresh can be rebuilt with the new bearer token.

use reqwest::Method;
use serde::Serialize;
use std::time::Duration;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: Vec<u8>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into().into_bytes(),
            file_name: None,
            mime_type: None,
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: bytes,
            file_name: Some(file_name.into()),
            mime_type: Some(mime_type.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Replaces the client-wide timeout for this call
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API root, e.g. `membership/get-current`
    pub path: String,
    pub body: RequestBody,
    pub options: RequestOptions,
    /// Query parameter that carries the bearer token of each attempt
    pub token_query: Option<String>,
    /// Set once the request has been replayed after a token refresh
    pub(crate) retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            options: RequestOptions::default(),
            token_query: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((key.into(), value.into()));
        self
    }

    /// Also send the access token as query parameter `name`. The value is
    /// filled in per attempt, so a replay after refresh carries the new token.
    pub fn token_query(mut self, name: impl Into<String>) -> Self {
        self.token_query = Some(name.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let req = ApiRequest::post("auth/change-password")
            .json(&json!({"oldPassword": "a", "newPassword": "b"}))
            .unwrap()
            .query("lang", "en")
            .timeout(Duration::from_secs(5));

        assert_eq!(req.method, Method::POST);
        assert_eq!(
            req.body,
            RequestBody::Json(json!({"oldPassword": "a", "newPassword": "b"}))
        );
        assert_eq!(req.options.query, vec![("lang".into(), "en".into())]);
        assert_eq!(req.options.timeout, Some(Duration::from_secs(5)));
        assert!(!req.is_retried());
        assert_eq!(req.token_query, None);
    }

    #[test]
    fn test_multipart_parts_are_owned() {
        let req = ApiRequest::post("members/upload-profile-image").multipart(vec![
            FormPart::file("file", "me.jpg", vec![0xff, 0xd8], "image/jpeg"),
            FormPart::text("memberId", "12"),
        ]);

        let replay = req.clone();
        match replay.body {
            RequestBody::Multipart(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].file_name.as_deref(), Some("me.jpg"));
                assert_eq!(parts[1].value, b"12".to_vec());
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
