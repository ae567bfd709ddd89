//! Firestore-backed record store (REST v1)
//!
//! Each record becomes one document in a collection, keyed by the record id.

pub mod auth;
pub mod value;

use crate::RecordStore;
use async_trait::async_trait;
use auth::AccessTokenProvider;
use civitas_core::{Error, ModerationRecord, Result};
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: usize = 300;

/// Location of the collection holding moderation records
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    pub collection: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            database: "(default)".to_string(),
            collection: collection.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database,
            self.collection
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Option<serde_json::Value>,
}

/// Record store writing to a Firestore collection
pub struct FirestoreRecordStore {
    config: FirestoreConfig,
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl FirestoreRecordStore {
    pub fn new(
        config: FirestoreConfig,
        http: reqwest::Client,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        tracing::info!(
            "Firestore store: project {}, collection {}",
            config.project_id,
            config.collection
        );
        Self {
            config,
            http,
            tokens,
        }
    }

    async fn list_page(&self, page_token: Option<&str>) -> Result<ListDocumentsResponse> {
        let token = self.tokens.access_token().await?;
        let page_size = PAGE_SIZE.to_string();
        let mut query = vec![("pageSize", page_size.as_str())];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token));
        }

        let response = self
            .http
            .get(self.config.collection_url())
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::store(format!("Firestore list request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::store(format!(
                "Firestore list returned {}: {}",
                status, detail
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::store(format!("Invalid Firestore list response: {}", e)))
    }
}

#[async_trait]
impl RecordStore for FirestoreRecordStore {
    async fn create(&self, record: &ModerationRecord) -> Result<String> {
        let doc = serde_json::to_value(record)?;
        let map = doc
            .as_object()
            .ok_or_else(|| Error::internal("record did not serialize to an object"))?;
        let body = serde_json::json!({ "fields": value::encode_fields(map) });

        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(self.config.collection_url())
            .bearer_auth(token)
            .query(&[("documentId", record.id())])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::store(format!("Firestore create request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::store(format!(
                "Firestore create returned {}: {}",
                status, detail
            )));
        }

        tracing::debug!("Stored record {} in Firestore", record.id());
        Ok(record.id().to_string())
    }

    async fn list_all(&self) -> Result<Vec<ModerationRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(page_token.as_deref()).await?;

            for document in page.documents {
                let Some(fields) = document.fields else {
                    continue;
                };
                let plain = value::decode_fields(&fields)?;
                let record: ModerationRecord = serde_json::from_value(plain).map_err(|e| {
                    Error::store(format!("Malformed record {}: {}", document.name, e))
                })?;
                records.push(record);
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        records.sort_by_key(|r| r.created_at());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::StaticToken;
    use civitas_core::{ModerationAction, SecondaryAssessment};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COLLECTION_PATH: &str = "/projects/civitas-test/databases/(default)/documents/flagged_posts";

    fn store(server: &MockServer) -> FirestoreRecordStore {
        FirestoreRecordStore::new(
            FirestoreConfig::new("civitas-test", "flagged_posts").with_base_url(server.uri()),
            reqwest::Client::new(),
            Arc::new(StaticToken("test-token".to_string())),
        )
    }

    fn document(record: &ModerationRecord) -> serde_json::Value {
        let plain = serde_json::to_value(record).unwrap();
        serde_json::json!({
            "name": format!("projects/civitas-test/databases/(default)/documents/flagged_posts/{}", record.id()),
            "fields": value::encode_fields(plain.as_object().unwrap()),
            "createTime": "2025-01-01T00:00:00Z",
            "updateTime": "2025-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_create_posts_document_keyed_by_id() {
        let server = MockServer::start().await;
        let record = ModerationRecord::flagged("hello", "LABEL_1", 0.93);

        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(query_param("documentId", record.id()))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "fields": {
                    "text": { "stringValue": "hello" },
                    "action": { "stringValue": "flagged" },
                    "secondary_assessment": { "nullValue": null }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(document(&record)))
            .expect(1)
            .mount(&server)
            .await;

        let id = store(&server).create(&record).await.unwrap();
        assert_eq!(id, record.id());
    }

    #[tokio::test]
    async fn test_create_failure_is_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let record = ModerationRecord::flagged("hello", "LABEL_1", 0.93);
        let err = store(&server).create(&record).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_list_all_follows_pages_and_sorts() {
        let server = MockServer::start().await;
        let first = ModerationRecord::flagged("first", "LABEL_1", 0.9);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = ModerationRecord::escalated(
            "second",
            "LABEL_0",
            0.6,
            SecondaryAssessment::new(Some(72), "hostile"),
        );

        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [document(&first)]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(query_param("pageSize", "300"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [document(&second)],
                "nextPageToken": "page-2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let records = store(&server).list_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), first.id());
        assert_eq!(records[1].id(), second.id());
        assert_eq!(records[1].action(), ModerationAction::Escalated);
        assert_eq!(
            records[1].secondary_assessment().map(|a| a.sentiment.as_str()),
            Some("hostile")
        );
    }

    #[tokio::test]
    async fn test_list_all_empty_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        assert!(store(&server).list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_all_rejects_malformed_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [{
                    "name": "projects/p/databases/(default)/documents/flagged_posts/x",
                    "fields": { "text": { "stringValue": "only text" } }
                }]
            })))
            .mount(&server)
            .await;

        let err = store(&server).list_all().await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
