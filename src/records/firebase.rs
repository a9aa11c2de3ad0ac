use super::document;
use super::RecordTree;
use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Realtime Database addressed through its REST API.
pub struct FirebaseTree {
    client: Client,
    database_url: String,
    auth_token: Option<String>,
}

impl FirebaseTree {
    pub fn new(database_url: &str, auth_token: Option<String>, request_timeout: Duration) -> Result<Self, StoreError> {
        let database_url = database_url.trim_end_matches('/').to_string();
        if !database_url.starts_with("http://") && !database_url.starts_with("https://") {
            return Err(StoreError::ConnectionError(format!(
                "database url must be http(s), got '{database_url}'"
            )));
        }
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            database_url,
            auth_token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}.json", self.database_url, document::segments(path).join("/"))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.endpoint(path));
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RecordTree for FirebaseTree {
    fn describe(&self) -> String {
        self.database_url.clone()
    }

    async fn read_children(&self, path: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        let response = self.send(self.request(Method::GET, path), path).await?;
        let body = response.bytes().await?;
        let node: Value = serde_json::from_slice(&body)?;
        Ok(match node {
            Value::Object(children) => children.into_iter().collect(),
            _ => BTreeMap::new(),
        })
    }

    async fn batch_delete(&self, path: &str, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let update: Map<String, Value> = keys.iter().map(|key| (key.clone(), Value::Null)).collect();
        self.send(self.request(Method::PATCH, path).json(&update), path).await?;
        debug!(path, keys = keys.len(), "patched records to null");
        Ok(())
    }

    async fn delete_subtree(&self, path: &str) -> Result<(), StoreError> {
        self.send(self.request(Method::DELETE, path), path).await?;
        debug!(path, "deleted record subtree");
        Ok(())
    }
}
