//! Form fields submitted to the auth endpoints.
//!
//! Browsers post `FormData` as `multipart/form-data`, plain HTML forms use
//! `application/x-www-form-urlencoded`, and API clients send JSON. All three
//! collapse into the same string map.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::authgate::outcome::{AuthOutcome, MSG_INVALID_PAYLOAD};

#[derive(Default)]
pub struct Submission {
    fields: HashMap<String, String>,
}

impl std::fmt::Debug for Submission {
    // Values may hold passwords.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.fields.keys().collect();
        keys.sort();
        f.debug_struct("Submission").field("fields", &keys).finish()
    }
}

impl Submission {
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// Field value, or `""` when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn from_json(object: Map<String, Value>) -> Self {
        let fields = object
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text,
                    Value::Bool(true) => "on".to_string(),
                    Value::Number(number) => number.to_string(),
                    // `false` and `null` read as an absent field.
                    Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => {
                        return None
                    }
                };
                Some((key, text))
            })
            .collect();
        Self { fields }
    }
}

fn invalid_payload() -> AuthOutcome {
    AuthOutcome::Validation(vec![MSG_INVALID_PAYLOAD])
}

#[async_trait]
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = AuthOutcome;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.is_empty() {
            return Ok(Self::default());
        }

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state).await.map_err(|err| {
                debug!("Rejected multipart body: {err}");
                invalid_payload()
            })?;

            let mut fields = HashMap::new();
            while let Some(field) = multipart.next_field().await.map_err(|err| {
                debug!("Rejected multipart field: {err}");
                invalid_payload()
            })? {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let value = field.text().await.map_err(|err| {
                    debug!("Rejected multipart field value: {err}");
                    invalid_payload()
                })?;
                fields.insert(name, value);
            }
            return Ok(Self { fields });
        }

        if content_type.starts_with("application/json") {
            let Json(object) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|err| {
                    debug!("Rejected JSON body: {err}");
                    invalid_payload()
                })?;
            return Ok(Self::from_json(object));
        }

        let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
            .await
            .map_err(|err| {
                debug!("Rejected form body: {err}");
                invalid_payload()
            })?;
        Ok(Self { fields })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest};
    use serde_json::json;

    async fn extract(
        content_type: Option<&str>,
        body: &'static str,
    ) -> Result<Submission, AuthOutcome> {
        let mut builder = HttpRequest::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body)).unwrap();
        Submission::from_request(request, &()).await
    }

    #[tokio::test]
    async fn parses_urlencoded_form() {
        let submission = extract(
            Some("application/x-www-form-urlencoded"),
            "email=ana%40x.com&senha=password1&terms=on",
        )
        .await
        .unwrap();
        assert_eq!(submission.text("email"), "ana@x.com");
        assert_eq!(submission.text("senha"), "password1");
        assert!(submission.has("terms"));
        assert!(!submission.has("nome"));
        assert_eq!(submission.text("nome"), "");
    }

    #[tokio::test]
    async fn parses_multipart_form() {
        let body = "--XYZ\r\n\
Content-Disposition: form-data; name=\"email\"\r\n\r\n\
ana@x.com\r\n\
--XYZ\r\n\
Content-Disposition: form-data; name=\"senha\"\r\n\r\n\
password1\r\n\
--XYZ--\r\n";
        let submission = extract(Some("multipart/form-data; boundary=XYZ"), body)
            .await
            .unwrap();
        assert_eq!(submission.text("email"), "ana@x.com");
        assert_eq!(submission.text("senha"), "password1");
    }

    #[tokio::test]
    async fn parses_json_and_maps_booleans() {
        let submission = extract(
            Some("application/json"),
            r#"{"nome":"Ana","terms":true,"remember":false,"age":30,"extra":null}"#,
        )
        .await
        .unwrap();
        assert_eq!(submission.text("nome"), "Ana");
        assert!(submission.has("terms"));
        assert!(!submission.has("remember"));
        assert!(!submission.has("extra"));
        assert_eq!(submission.text("age"), "30");
    }

    #[tokio::test]
    async fn missing_content_type_is_an_empty_submission() {
        let submission = extract(None, "").await.unwrap();
        assert!(!submission.has("email"));
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let rejection = extract(Some("application/json"), "{not json").await.unwrap_err();
        assert_eq!(
            serde_json::to_value(rejection.body()).unwrap(),
            json!({"status": "error", "message": MSG_INVALID_PAYLOAD})
        );
    }

    #[test]
    fn debug_output_hides_values() {
        let submission = Submission::from_pairs([("senha", "hunter22")]);
        let rendered = format!("{submission:?}");
        assert!(rendered.contains("senha"));
        assert!(!rendered.contains("hunter22"));
    }
}
