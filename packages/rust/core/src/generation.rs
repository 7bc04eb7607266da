//! The generation-service boundary.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use docforge_shared::{DocforgeError, GenerationConfig, Result, SectionId};

const USER_AGENT: &str = concat!("docforge/", env!("CARGO_PKG_VERSION"));

/// One source document handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
}

/// What the generator is asked to write. Carries no prompt text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequest {
    pub section_id: SectionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDocument>,
}

impl SectionRequest {
    pub fn source_texts(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.text.clone()).collect()
    }
}

/// Produces raw text for a section.
pub trait SectionGenerator: Send + Sync + 'static {
    fn generate(&self, request: &SectionRequest) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// POSTs each request as JSON and reads `{ "text": ... }` back.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: Client,
    endpoint: Url,
}

impl HttpGenerator {
    pub fn new(endpoint: Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocforgeError::generation(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Build from `[generation]`; the endpoint must be set.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| DocforgeError::config("generation.endpoint is not set"))?;
        Self::new(endpoint, config.timeout_secs)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl SectionGenerator for HttpGenerator {
    #[instrument(skip_all, fields(section = %request.section_id, endpoint = %self.endpoint))]
    async fn generate(&self, request: &SectionRequest) -> Result<String> {
        let endpoint = &self.endpoint;
        let response = self
            .client
            .post(endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| DocforgeError::generation(format!("{endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocforgeError::generation(format!("{endpoint}: HTTP {status}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DocforgeError::generation(format!("{endpoint}: invalid response: {e}")))?;

        debug!(chars = body.text.len(), "generation response received");
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> SectionRequest {
        SectionRequest {
            section_id: SectionId::new(),
            title: "Introduction".into(),
            placeholder: Some("INTRO".into()),
            sources: vec![SourceDocument {
                id: "paper-1".into(),
                text: "Source body.".into(),
            }],
        }
    }

    fn generator(server: &MockServer, timeout_secs: u64) -> HttpGenerator {
        let endpoint = Url::parse(&format!("{}/generate", server.uri())).expect("url");
        HttpGenerator::new(endpoint, timeout_secs).expect("client")
    }

    #[tokio::test]
    async fn posts_request_and_reads_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(serde_json::json!({
                "title": "Introduction",
                "placeholder": "INTRO",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "text": "Generated body." })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let generator = generator(&server, 5);
        assert_eq!(generator.endpoint().path(), "/generate");
        let text = generator.generate(&request()).await.expect("generate");
        assert_eq!(text, "Generated body.");
    }

    #[tokio::test]
    async fn http_error_status_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = generator(&server, 5).generate(&request()).await.unwrap_err();
        assert!(matches!(err, DocforgeError::Generation(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn malformed_body_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = generator(&server, 5).generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("invalid response"));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "text": "late" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let result = generator(&server, 1).generate(&request()).await;
        assert!(matches!(result, Err(DocforgeError::Generation(_))));
    }

    #[test]
    fn from_config_requires_endpoint() {
        let err = HttpGenerator::from_config(&GenerationConfig::default()).unwrap_err();
        assert!(matches!(err, DocforgeError::Config { .. }));
    }

    #[test]
    fn request_serializes_camel_case() {
        let json = serde_json::to_value(request()).expect("serialize");
        assert!(json["sectionId"].is_string());
        assert_eq!(json["sources"][0]["text"], "Source body.");
    }
}
