//! Trade record persistence through the Supabase REST API
//!
//! - create: `POST /rest/v1/{table}` (`Prefer: return=minimal`)
//! - update: `PATCH /rest/v1/{table}?id=eq.{id}`
//! - get:    `GET /rest/v1/{table}?id=eq.{id}`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use uuid::Uuid;

use super::{StorageError, TradeRecordStore};
use crate::config::SupabaseConfig;
use crate::core::state::TradeRecord;

pub struct SupabaseTradeRecordStore {
    endpoint: String,
    client: reqwest::Client,
}

impl SupabaseTradeRecordStore {
    /// Build a client with `apikey` and bearer auth headers and the configured
    /// request timeout
    pub fn new(config: SupabaseConfig) -> Result<Self, StorageError> {
        let invalid_key = |_| StorageError::InvalidData("anon key is not a valid header value".to_string());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&config.anon_key).map_err(invalid_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.anon_key)).map_err(invalid_key)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            endpoint: config.table_endpoint(),
            client,
        })
    }

    async fn error_for(response: reqwest::Response, action: &str, id: Uuid) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| "<no body>".to_string());
        tracing::error!(
            trade_id = %id,
            status = %status,
            response_body = %body,
            "Failed to {} trade record in Supabase", action
        );
        match status {
            reqwest::StatusCode::CONFLICT => {
                StorageError::Database(format!("Trade record already exists: {}", id))
            }
            reqwest::StatusCode::UNAUTHORIZED => {
                StorageError::Database("Invalid Supabase credentials".to_string())
            }
            status => StorageError::Database(format!("Supabase error {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl TradeRecordStore for SupabaseTradeRecordStore {
    async fn create(&self, record: &TradeRecord) -> Result<(), StorageError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::CREATED {
            tracing::debug!(trade_id = %record.id, status = %record.status, "Trade record saved to Supabase");
            return Ok(());
        }
        Err(Self::error_for(response, "create", record.id).await)
    }

    async fn update(&self, record: &TradeRecord) -> Result<(), StorageError> {
        let response = self
            .client
            .patch(&self.endpoint)
            .query(&[("id", format!("eq.{}", record.id))])
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "update", record.id).await);
        }

        // PostgREST answers an unmatched PATCH with an empty array
        let updated: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        if updated.is_empty() {
            return Err(StorageError::NotFound(record.id.to_string()));
        }

        tracing::debug!(trade_id = %record.id, status = %record.status, "Trade record updated in Supabase");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TradeRecord>, StorageError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "load", id).await);
        }

        let mut rows: Vec<TradeRecord> = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    async fn recent(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<TradeRecord>, StorageError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(user) = user_id {
            query.push(("user_id", format!("eq.{}", user)));
        }

        let response = self.client.get(&self.endpoint).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response, "list", Uuid::nil()).await);
        }

        response
            .json()
            .await
            .map_err(|e| StorageError::InvalidData(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::TradeStatus;
    use mockito::Matcher;

    fn store_for(server: &mockito::ServerGuard) -> SupabaseTradeRecordStore {
        SupabaseTradeRecordStore::new(SupabaseConfig::new(&server.url(), "test-anon-key")).unwrap()
    }

    #[tokio::test]
    async fn test_create_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/trade_records")
            .match_header("apikey", "test-anon-key")
            .match_header("prefer", "return=minimal")
            .match_body(Matcher::PartialJson(serde_json::json!({"status": "pending", "coin_id": "BTC"})))
            .with_status(201)
            .create_async()
            .await;

        let record = TradeRecord::new_pending(Some("u1".to_string()), "BTC");
        store_for(&server).create(&record).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/trade_records")
            .with_status(409)
            .with_body(r#"{"message":"duplicate key value violates unique constraint"}"#)
            .create_async()
            .await;

        let record = TradeRecord::new_pending(None, "BTC");
        match store_for(&server).create(&record).await {
            Err(StorageError::Database(msg)) => assert!(msg.contains("already exists")),
            other => panic!("Expected Database error for 409, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/trade_records")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let record = TradeRecord::new_pending(None, "BTC");
        let err = store_for(&server).create(&record).await.unwrap_err();
        assert!(err.to_string().contains("Invalid Supabase credentials"));
    }

    #[tokio::test]
    async fn test_update_patches_by_id() {
        let mut server = mockito::Server::new_async().await;
        let mut record = TradeRecord::new_pending(None, "ETH");
        record.transition(TradeStatus::Buying).unwrap();

        let mock = server
            .mock("PATCH", "/rest/v1/trade_records")
            .match_query(Matcher::UrlEncoded("id".into(), format!("eq.{}", record.id)))
            .match_body(Matcher::PartialJson(serde_json::json!({"status": "buying"})))
            .with_status(200)
            .with_body(r#"[{"id":"ignored"}]"#)
            .create_async()
            .await;

        store_for(&server).update(&record).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/rest/v1/trade_records")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let record = TradeRecord::new_pending(None, "ETH");
        assert!(matches!(
            store_for(&server).update(&record).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_round_trips_record() {
        let mut server = mockito::Server::new_async().await;
        let record = TradeRecord::new_pending(Some("u9".to_string()), "XRP");
        let body = serde_json::to_string(&vec![record.clone()]).unwrap();

        server
            .mock("GET", "/rest/v1/trade_records")
            .match_query(Matcher::UrlEncoded("id".into(), format!("eq.{}", record.id)))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let loaded = store_for(&server).get(record.id).await.unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[tokio::test]
    async fn test_recent_filters_by_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/trade_records")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user_id".into(), "eq.u1".into()),
                Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
                Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let rows = store_for(&server).recent(Some("u1"), 5).await.unwrap();
        assert!(rows.is_empty());
        mock.assert_async().await;
    }
}
