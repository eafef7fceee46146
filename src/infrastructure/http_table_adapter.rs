//! HTTP client for the remote table operation service
//!
//! Each call is a `POST {base_url}/delete` or `POST {base_url}/insert` with
//! body `{"tableName": "..."}`. The service answers with the adapter
//! contract body (`success`, `recordsDeleted`/`recordsInserted`, `skipped`,
//! `message`, `error`), also on non-2xx statuses.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::domain::errors::AdapterError;
use crate::domain::repositories::{AdapterResponse, TableOperationAdapter};
use crate::domain::table_order::Direction;
use crate::infrastructure::config::AdapterConfig;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableRequest<'a> {
    table_name: &'a str,
}

pub struct HttpTableAdapter {
    client: Client,
    delete_url: Url,
    insert_url: Url,
    api_key: Option<String>,
}

impl HttpTableAdapter {
    pub fn new(config: &AdapterConfig) -> anyhow::Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid adapter base URL '{}': {}", config.base_url, e))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("storefront-resync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            delete_url: base.join("delete")?,
            insert_url: base.join("insert")?,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    async fn call(&self, direction: Direction, table: &str) -> Result<AdapterResponse, AdapterError> {
        let url = match direction {
            Direction::Delete => &self.delete_url,
            Direction::Insert => &self.insert_url,
        };
        debug!("POST {} table={}", url, table);

        let mut request = self.client.post(url.clone()).json(&TableRequest { table_name: table });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        match serde_json::from_str::<AdapterResponse>(&body) {
            Ok(parsed) => {
                if !status.is_success() {
                    warn!("{} {} returned HTTP {}: {}", direction, table, status, parsed.failure_cause());
                }
                Ok(parsed)
            }
            Err(_) if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
                Err(AdapterError::Rejected {
                    message: format!("HTTP {status}"),
                })
            }
            Err(_) if !status.is_success() => Err(AdapterError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(AdapterError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl TableOperationAdapter for HttpTableAdapter {
    async fn delete_all(&self, table: &str) -> Result<AdapterResponse, AdapterError> {
        self.call(Direction::Delete, table).await
    }

    async fn insert_all(&self, table: &str) -> Result<AdapterResponse, AdapterError> {
        self.call(Direction::Insert, table).await
    }
}
