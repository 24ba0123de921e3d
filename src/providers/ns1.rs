// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use bon::Builder;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::{
    error::{RecordLockError, Result},
    model::{Record, Zone, ZoneSummary},
    providers::Provider,
};

/// [NS1](https://ns1.com) REST API provider for [RecordMutex](crate::RecordMutex)
/// and [Reconciler](crate::Reconciler)
#[derive(Builder, Debug, Clone)]
pub struct Ns1Provider {
    #[builder(default)]
    client: Client,
    #[builder(into, default = Ns1Provider::DEFAULT_ENDPOINT.to_string())]
    endpoint: String,
    #[builder(into)]
    api_key: String,
}

/// Non-success response from the NS1 API.
#[derive(ThisError, Debug)]
#[error("ns1 responded {status}: {message}")]
pub struct Ns1Error {
    pub status: StatusCode,
    pub message: String,
}

impl Ns1Error {
    /// Whether the request tried to create something that already exists.
    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT
            || (self.status == StatusCode::BAD_REQUEST && self.message.contains("already exists"))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl Ns1Provider {
    pub const DEFAULT_ENDPOINT: &str = "https://api.nsone.net/v1/";
    pub const API_KEY_HEADER: &str = "X-NSONE-Key";
    pub const API_KEY_VAR: &str = "NS1_APIKEY";
    pub const ENDPOINT_VAR: &str = "NS1_ENDPOINT";

    /// Configure from `NS1_APIKEY` and, when set, `NS1_ENDPOINT`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(Self::API_KEY_VAR).map_err(|e| {
            RecordLockError::provider(format!("{}: {}", Self::API_KEY_VAR, e))
        })?;
        let endpoint = std::env::var(Self::ENDPOINT_VAR).ok();
        Ok(Self::builder()
            .api_key(api_key)
            .maybe_endpoint(endpoint)
            .build())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), path);
        self.client
            .request(method, url)
            .header(Self::API_KEY_HEADER, &self.api_key)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(RecordLockError::provider)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        Err(RecordLockError::provider(Ns1Error { status, message }))
    }

    async fn json<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<T> {
        self.execute(request)
            .await?
            .json()
            .await
            .map_err(RecordLockError::provider)
    }
}

impl Provider for Ns1Provider {
    fn exclusive_create(&self) -> bool {
        // PUT on an existing record is rejected
        true
    }

    async fn list_zones(&self) -> Result<Vec<ZoneSummary>> {
        self.json(self.request(Method::GET, "zones")).await
    }

    async fn get_zone(&self, zone: &str) -> Result<Zone> {
        self.json(self.request(Method::GET, &format!("zones/{zone}")))
            .await
    }

    async fn get_record(&self, zone: &str, domain: &str, kind: &str) -> Result<Record> {
        self.json(self.request(Method::GET, &format!("zones/{zone}/{domain}/{kind}")))
            .await
    }

    async fn replace_record(&self, record: &Record) -> Result<Record> {
        let path = format!("zones/{}/{}/{}", record.zone, record.domain, record.kind);
        self.json(self.request(Method::POST, &path).json(record))
            .await
    }

    async fn create_token(&self, zone: &str, token: &str, kind: &str) -> Result<()> {
        let path = format!("zones/{zone}/{token}/{kind}");
        let request = self
            .request(Method::PUT, &path)
            .json(&Record::new(zone, token, kind));

        match self.execute(request).await {
            Ok(_) => Ok(()),
            Err(RecordLockError::ProviderError(error)) => match error.downcast::<Ns1Error>() {
                Ok(e) if e.is_conflict() => {
                    debug!("Creating token {} failed: {}", token, e);
                    Err(RecordLockError::AlreadyAcquired(token.to_string()))
                }
                Ok(e) => Err(RecordLockError::ProviderError(e)),
                Err(other) => Err(RecordLockError::ProviderError(other)),
            },
            Err(e) => Err(e),
        }
    }

    async fn delete_token(&self, zone: &str, token: &str, kind: &str) -> Result<()> {
        let path = format!("zones/{zone}/{token}/{kind}");
        self.execute(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use super::*;
    use crate::{
        AnswerFields, AnswerReconciler, Operation, RecordMutex, identity::token_name,
        reconcile::find_record,
    };

    const API_KEY: &str = "test-key";

    async fn setup() -> (MockServer, Ns1Provider) {
        let server = MockServer::start().await;
        let provider = Ns1Provider::builder()
            .endpoint(format!("{}/v1/", server.uri()))
            .api_key(API_KEY)
            .build();
        (server, provider)
    }

    async fn mount_record(server: &MockServer, record: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1/zones"))
            .and(header(Ns1Provider::API_KEY_HEADER, API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"zone": "other.com"},
                {"zone": "example.com"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/zones/other.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "zone": "other.com",
                "records": [{"domain": "b.other.com", "type": "A"}]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/zones/example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "zone": "example.com",
                "records": [{"domain": "a.example.com", "type": "A"}]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/zones/example.com/a.example.com/A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(record))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn find_record_scans_zones() {
        let (server, provider) = setup().await;
        mount_record(
            &server,
            json!({
                "zone": "example.com",
                "domain": "a.example.com",
                "type": "A",
                "answers": [{"answer": ["1.2.3.4"]}]
            }),
        )
        .await;

        let record = find_record(&provider, "a.example.com")
            .await
            .expect("record should resolve");
        assert_eq!(record.zone, "example.com");
        assert_eq!(record.answers[0].value(), "1.2.3.4");

        let err = find_record(&provider, "missing.example.com")
            .await
            .expect_err("record should be missing");
        assert!(matches!(err, RecordLockError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn create_token_conflict_is_already_acquired() {
        let (server, provider) = setup().await;
        Mock::given(method("PUT"))
            .and(path("/v1/zones/example.com/1.example.com/TXT"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "record already exists"})),
            )
            .mount(&server)
            .await;

        let err = provider
            .create_token("example.com", "1.example.com", "TXT")
            .await
            .expect_err("should conflict");
        assert!(matches!(err, RecordLockError::AlreadyAcquired(ref t) if t == "1.example.com"));
    }

    #[tokio::test]
    async fn other_failures_keep_status() {
        let (server, provider) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/zones/example.com/1.example.com/TXT"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "record not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/zones/example.com/1.example.com/TXT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider
            .delete_token("example.com", "1.example.com", "TXT")
            .await
            .expect_err("should fail");
        assert_eq!(err.to_string(), "provider error: ns1 responded 404 Not Found: record not found");

        let err = provider
            .create_token("example.com", "1.example.com", "TXT")
            .await
            .expect_err("should fail");
        assert!(matches!(err, RecordLockError::ProviderError(_)));
        assert!(err.to_string().ends_with("boom"));
    }

    #[tokio::test]
    async fn reconcile_create_against_api() {
        let (server, provider) = setup().await;
        mount_record(
            &server,
            json!({
                "zone": "example.com",
                "domain": "a.example.com",
                "type": "A",
                "ttl": 3600,
                "answers": [{"answer": ["5.6.7.8"], "id": "a1", "meta": {"up": true}}]
            }),
        )
        .await;

        let token = token_name("a.example.com", "example.com");
        let token_path = format!("/v1/zones/example.com/{token}/TXT");
        Mock::given(method("PUT"))
            .and(path(token_path.as_str()))
            .and(body_partial_json(json!({"domain": token, "type": "TXT"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/zones/example.com/a.example.com/A"))
            .and(body_partial_json(json!({
                "ttl": 3600,
                "answers": [
                    {"answer": ["5.6.7.8"], "id": "a1", "meta": {"up": true}},
                    {"answer": ["1.2.3.4"], "region": "east"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "zone": "example.com",
                "domain": "a.example.com",
                "type": "A"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(token_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let reconciler = AnswerReconciler::new(provider, Arc::new(RecordMutex::new()));
        let observed = reconciler
            .apply(
                "a.example.com",
                Operation::Create(
                    AnswerFields::builder()
                        .answer("1.2.3.4")
                        .region("east")
                        .build(),
                ),
            )
            .await
            .expect("create should succeed")
            .expect("create returns the answer");
        assert!(observed.id.starts_with("ans-"));
    }
}
