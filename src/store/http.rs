//! Attribute store backed by a remote document service over HTTP/JSON.
//!
//! Contract (path is percent-encoded as a single segment):
//!
//! - `GET    /nodes/{path}` → 200 + record JSON, or 404
//! - `POST   /nodes/{path}` → 201, or 409 when the record exists
//! - `PUT    /nodes/{path}` → 200/204 (upsert)
//! - `DELETE /nodes/{path}` → 200/204/404
//!
//! Dispatcher calls are synchronous, so each request is driven to completion on
//! the tokio runtime with a hard timeout. A slow store cannot wedge the FUSE
//! session thread.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::{StoreError, StoreResult};
use crate::vfs::node::NodeRecord;

use super::AttrStore;

/// Default upper bound for a single metadata request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the metadata service.
pub struct HttpAttrStore {
    client: Client,
    base_url: String,
    rt: tokio::runtime::Handle,
    timeout: Duration,
}

impl HttpAttrStore {
    /// Create a client for `host:port`. `host` may carry its own scheme.
    pub fn new(host: &str, port: u16, rt: tokio::runtime::Handle) -> StoreResult<Self> {
        Self::with_timeout(host, port, rt, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        host: &str,
        port: u16,
        rt: tokio::runtime::Handle,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url(host, port),
            rt,
            timeout,
        })
    }

    fn node_url(&self, path: &str) -> String {
        format!("{}/nodes/{}", self.base_url, urlencoding::encode(path))
    }

    /// Run an async request on the runtime, bounded by the store timeout.
    fn block<F, T>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        self.rt.block_on(async {
            match tokio::time::timeout(self.timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout),
            }
        })
    }
}

fn base_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}:{}", host, port)
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

fn unexpected(method: &str, path: &str, status: StatusCode) -> StoreError {
    StoreError::Unavailable(format!("{} {} returned {}", method, path, status))
}

impl AttrStore for HttpAttrStore {
    fn get(&self, path: &str) -> StoreResult<Option<NodeRecord>> {
        let url = self.node_url(path);
        self.block(async {
            let resp = self.client.get(&url).send().await.map_err(transport)?;
            match resp.status() {
                StatusCode::NOT_FOUND => Ok(None),
                s if s.is_success() => resp
                    .json::<NodeRecord>()
                    .await
                    .map(Some)
                    .map_err(|e| StoreError::Encoding(e.to_string())),
                s => Err(unexpected("GET", path, s)),
            }
        })
    }

    fn add(&self, path: &str, record: &NodeRecord) -> StoreResult<()> {
        let url = self.node_url(path);
        self.block(async {
            let resp = self
                .client
                .post(&url)
                .json(record)
                .send()
                .await
                .map_err(transport)?;
            match resp.status() {
                StatusCode::CONFLICT => Err(StoreError::Conflict(path.to_string())),
                s if s.is_success() => Ok(()),
                s => Err(unexpected("POST", path, s)),
            }
        })
    }

    fn update(&self, path: &str, record: &NodeRecord) -> StoreResult<()> {
        let url = self.node_url(path);
        self.block(async {
            let resp = self
                .client
                .put(&url)
                .json(record)
                .send()
                .await
                .map_err(transport)?;
            match resp.status() {
                s if s.is_success() => Ok(()),
                s => Err(unexpected("PUT", path, s)),
            }
        })
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        let url = self.node_url(path);
        self.block(async {
            let resp = self.client.delete(&url).send().await.map_err(transport)?;
            match resp.status() {
                StatusCode::NOT_FOUND => Ok(()),
                s if s.is_success() => Ok(()),
                s => Err(unexpected("DELETE", path, s)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("meta.local", 27080), "http://meta.local:27080");
        assert_eq!(base_url("https://meta.example/", 1), "https://meta.example");
    }

    #[test]
    fn test_node_url_encodes_path_as_one_segment() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let store = HttpAttrStore::new("127.0.0.1", 27080, rt.handle().clone()).unwrap();
        assert_eq!(
            store.node_url("/dir/a b"),
            "http://127.0.0.1:27080/nodes/%2Fdir%2Fa%20b"
        );
    }

    #[test]
    fn test_unreachable_store_is_store_failure() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let store = HttpAttrStore::with_timeout(
            "127.0.0.1",
            1,
            rt.handle().clone(),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = store.get("/").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Unavailable(_) | StoreError::Timeout
        ));
    }
}
