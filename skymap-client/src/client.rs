use crate::error::{ClientError, Result};
use crate::payload::{EnumerationResponse, ErrorBody};
use crate::request::EnumerationRequest;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const ENUMERATE_PATH: &str = "enumerate";
const HEALTH_PATH: &str = "_health";

/// Talks to the enumeration backend.
pub struct EnumerationClient {
    client: Client,
    endpoint: Url,
    timeout_secs: u64,
}

impl EnumerationClient {
    /// Enumeration of every region can take minutes, so the default timeout is generous.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, 120)
    }

    pub fn with_timeout(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;

        let client = Client::builder()
            .user_agent(concat!("Skymap/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Run one enumeration. Non-2xx answers become [`ClientError::Backend`].
    pub async fn enumerate(&self, request: &EnumerationRequest) -> Result<EnumerationResponse> {
        let url = self.join(ENUMERATE_PATH)?;
        info!(
            "Requesting enumeration from {} ({} region(s), {} role(s))",
            url,
            request.regions.len(),
            request.assume_roles.len()
        );

        let started = Instant::now();
        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(
            "Enumeration answered {} in {:?} ({} bytes)",
            status,
            started.elapsed(),
            body.len()
        );

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    if body.trim().is_empty() {
                        status.to_string()
                    } else {
                        body.trim().to_string()
                    }
                });
            warn!("Enumeration failed with {}: {}", status, message);
            return Err(ClientError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EnumerationResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
        info!(
            "Enumeration returned {} element(s), {} warning(s), {} finding(s)",
            parsed.elements.len(),
            parsed.warnings.len(),
            parsed.findings.len()
        );
        Ok(parsed)
    }

    pub async fn health(&self) -> Result<bool> {
        let url = self.join(HEALTH_PATH)?;
        let response = self.client.get(url).send().await?;
        Ok(response.status().is_success())
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", self.endpoint, e)))
    }
}

/// Parse the endpoint, making sure relative joins keep any base path.
fn parse_endpoint(raw: &str) -> Result<Url> {
    let mut endpoint = Url::parse(raw.trim())
        .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", raw, e)))?;

    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(ClientError::InvalidEndpoint(format!(
            "{}: unsupported scheme '{}'",
            raw,
            endpoint.scheme()
        )));
    }

    if !endpoint.path().ends_with('/') {
        let path = format!("{}/", endpoint.path());
        endpoint.set_path(&path);
    }
    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_endpoint_appends_slash() {
        let url = parse_endpoint("http://localhost:8000/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/");
        assert_eq!(
            url.join(ENUMERATE_PATH).unwrap().as_str(),
            "http://localhost:8000/api/enumerate"
        );
    }

    #[test]
    fn test_parse_endpoint_rejects_other_schemes() {
        assert!(matches!(
            parse_endpoint("ftp://example.com"),
            Err(ClientError::InvalidEndpoint(_))
        ));
        assert!(parse_endpoint("not a url").is_err());
    }

    #[tokio::test]
    async fn test_enumerate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/enumerate"))
            .and(body_partial_json(json!({"regions": ["ALL"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "elements": [
                    {"data": {"id": "vpc-1", "type": "vpc", "label": "VPC"}},
                    {"data": {"id": "i-1", "type": "instance", "label": "web-1", "parent": "vpc-1"}}
                ],
                "warnings": ["ec2 us-east-1: throttled"],
                "findings": [{"severity": "High", "title": "Public ingress", "detail": "tcp/22"}]
            })))
            .mount(&mock_server)
            .await;

        let client = EnumerationClient::new(&mock_server.uri()).unwrap();
        let response = client
            .enumerate(&EnumerationRequest::new().with_regions("all"))
            .await
            .unwrap();

        assert_eq!(response.elements.len(), 2);
        assert_eq!(response.warnings, vec!["ec2 us-east-1: throttled"]);
        assert_eq!(response.findings[0].severity, "High");
    }

    #[tokio::test]
    async fn test_enumerate_backend_error_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/enumerate"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": "no credentials"})),
            )
            .mount(&mock_server)
            .await;

        let client = EnumerationClient::new(&mock_server.uri()).unwrap();
        let err = client
            .enumerate(&EnumerationRequest::new())
            .await
            .unwrap_err();

        match err {
            ClientError::Backend { status, ref message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "no credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.status_text(), "no credentials");
    }

    #[tokio::test]
    async fn test_enumerate_plain_text_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/enumerate"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let client = EnumerationClient::new(&mock_server.uri()).unwrap();
        let err = client
            .enumerate(&EnumerationRequest::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Backend { status: 502, .. }));
        assert_eq!(err.status_text(), "bad gateway");
    }

    #[tokio::test]
    async fn test_enumerate_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/enumerate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&mock_server)
            .await;

        let client = EnumerationClient::new(&mock_server.uri()).unwrap();
        let err = client
            .enumerate(&EnumerationRequest::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_health() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/_health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&mock_server)
            .await;

        let client = EnumerationClient::new(&mock_server.uri()).unwrap();
        assert!(client.health().await.unwrap());
    }
}
