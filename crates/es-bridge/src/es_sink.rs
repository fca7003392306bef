//! Elasticsearch document sink
//!
//! Writes one document per request through the REST index API:
//! `PUT /{index}/_doc/{id}` when the document carries an identifier (so a
//! repeated event overwrites itself), `POST /{index}/_doc` otherwise.

use async_trait::async_trait;
use es_bridge_core::prelude::*;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;
use url::Url;

/// Elasticsearch single-document sink
pub struct ElasticsearchSink {
    client: Client,
    hosts: Vec<Url>,
    config: ElasticsearchConfig,
    host_index: AtomicUsize,
}

impl ElasticsearchSink {
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        if config.hosts.is_empty() {
            return Err(BridgeError::config("no Elasticsearch hosts configured"));
        }

        let hosts = config
            .hosts
            .iter()
            .map(|host| parse_host(host))
            .collect::<Result<Vec<_>>>()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BridgeError::elasticsearch_with_source("Failed to create client", e))?;

        Ok(Self {
            client,
            hosts,
            config,
            host_index: AtomicUsize::new(0),
        })
    }

    /// Get the next host (round-robin)
    fn next_host(&self) -> &Url {
        let idx = self.host_index.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        &self.hosts[idx]
    }

    /// Build request with authentication
    fn build_request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("ApiKey {}", api_key));
        } else if let (Some(ref user), Some(ref pass)) =
            (&self.config.username, &self.config.password)
        {
            req = req.basic_auth(user, Some(pass));
        }

        req
    }
}

fn parse_host(host: &str) -> Result<Url> {
    let url = Url::parse(host)
        .map_err(|e| BridgeError::config(format!("invalid Elasticsearch host '{}': {}", host, e)))?;
    if url.cannot_be_a_base() {
        return Err(BridgeError::config(format!(
            "invalid Elasticsearch host '{}': not a base URL",
            host
        )));
    }
    Ok(url)
}

/// Method and URL for indexing `request` on `host`
pub fn document_endpoint(host: &Url, request: &ShapedRequest) -> Result<(Method, Url)> {
    let mut url = host.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| BridgeError::config(format!("host '{}' is not a base URL", host)))?;
        segments.pop_if_empty().push(&request.index).push("_doc");
        if let Some(ref id) = request.id {
            segments.push(id);
        }
    }

    let method = if request.id.is_some() {
        Method::PUT
    } else {
        Method::POST
    };
    Ok((method, url))
}

fn index_failure(status: reqwest::StatusCode, body: &str) -> BridgeError {
    BridgeError::elasticsearch(format!("Index failed: {} - {}", status, body))
}

#[async_trait]
impl DocumentSink for ElasticsearchSink {
    async fn submit(&self, request: ShapedRequest) -> Result<SubmitResponse> {
        let (method, url) = document_endpoint(self.next_host(), &request)?;
        trace!(%method, %url, "Submitting document");

        let resp = self
            .build_request(method, url)
            .json(&request.document)
            .send()
            .await
            .map_err(|e| BridgeError::elasticsearch_with_source("Index request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            return Err(index_failure(status, &body));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| BridgeError::elasticsearch_with_source("Failed to parse response", e))?;

        let mut response = SubmitResponse::new(status.as_u16());
        if let Some(result) = body["result"].as_str() {
            response = response.with_result(result);
        }
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "elasticsearch"
    }
}

#[async_trait]
impl HealthCheck for ElasticsearchSink {
    async fn health_check(&self) -> Result<()> {
        let resp = self
            .build_request(Method::GET, self.next_host().clone())
            .send()
            .await
            .map_err(|e| BridgeError::elasticsearch_with_source("Ping failed", e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BridgeError::elasticsearch(format!(
                "Ping returned {}",
                resp.status()
            )))
        }
    }

    fn component_name(&self) -> &'static str {
        "elasticsearch_sink"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use es_bridge_core::EnvelopeKey;
    use serde_json::Map;

    fn request(index: &str, id: Option<&str>) -> ShapedRequest {
        ShapedRequest {
            index: index.to_string(),
            id: id.map(str::to_string),
            envelope_key: EnvelopeKey::Document,
            document: Map::new(),
        }
    }

    #[test]
    fn test_endpoint_with_id() {
        let host = Url::parse("http://localhost:9200").unwrap();
        let (method, url) =
            document_endpoint(&host, &request("raddec", Some("1554000000000-fee150bada55-2")))
                .unwrap();
        assert_eq!(method, Method::PUT);
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/raddec/_doc/1554000000000-fee150bada55-2"
        );
    }

    #[test]
    fn test_endpoint_without_id() {
        let host = Url::parse("https://es.example.com/proxy/").unwrap();
        let (method, url) = document_endpoint(&host, &request("spatem", None)).unwrap();
        assert_eq!(method, Method::POST);
        assert_eq!(url.as_str(), "https://es.example.com/proxy/spatem/_doc");
    }

    #[test]
    fn test_endpoint_encodes_id() {
        let host = Url::parse("http://localhost:9200").unwrap();
        let (_, url) = document_endpoint(&host, &request("dynamb", Some("1-a/b c-2"))).unwrap();
        assert_eq!(url.path(), "/dynamb/_doc/1-a%2Fb%20c-2");
    }

    #[tokio::test]
    async fn test_invalid_hosts_rejected() {
        let config = ElasticsearchConfig {
            hosts: vec!["not a url".to_string()],
            ..Default::default()
        };
        assert!(ElasticsearchSink::new(config).is_err());

        let empty = ElasticsearchConfig {
            hosts: Vec::new(),
            ..Default::default()
        };
        assert!(ElasticsearchSink::new(empty).is_err());

        let mailto = ElasticsearchConfig {
            hosts: vec!["mailto:ops@example.com".to_string()],
            ..Default::default()
        };
        assert!(ElasticsearchSink::new(mailto).is_err());
    }

    #[tokio::test]
    async fn test_round_robin_hosts() {
        let config = ElasticsearchConfig {
            hosts: vec!["http://es-1:9200".to_string(), "http://es-2:9200".to_string()],
            ..Default::default()
        };
        let sink = ElasticsearchSink::new(config).unwrap();
        let first = sink.next_host().clone();
        let second = sink.next_host().clone();
        assert_ne!(first, second);
        assert_eq!(sink.next_host(), &first);
    }

    #[test]
    fn test_index_failure_carries_status_and_body() {
        let err = index_failure(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"type":"mapper_parsing_exception"}}"#,
        );
        assert_eq!(err.kind_label(), "elasticsearch");
        let message = err.to_string();
        assert!(message.contains("400 Bad Request"));
        assert!(message.contains("mapper_parsing_exception"));
    }
}
