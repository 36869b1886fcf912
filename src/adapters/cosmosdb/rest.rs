//! Cosmos DB REST data plane client
//!
//! Point reads, query pages and stored procedures are issued directly over
//! HTTPS with master-key authorization so that request charge, sub-status,
//! retry-after and continuation headers reach the caller intact.

use super::models::{ErrorBody, QueryResponseBody, StoredProcedureBody};
use crate::adapters::database::query::SqlQuerySpec;
use crate::adapters::database::traits::{CollectionAddress, FeedPage, StoreResponse, StoreResult};
use crate::config::CosmosDbConfig;
use crate::domain::{status, CosmosDbError, DataStoreError, Result, StoreFailure};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Response};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use zeroize::Zeroizing;

/// REST API version sent with every request
pub const API_VERSION: &str = "2018-12-31";

pub mod headers {
    pub const REQUEST_CHARGE: &str = "x-ms-request-charge";
    pub const SUB_STATUS: &str = "x-ms-substatus";
    pub const RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";
    pub const CONTINUATION: &str = "x-ms-continuation";
    pub const PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
    pub const IS_QUERY: &str = "x-ms-documentdb-isquery";
    pub const MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
    pub const DATE: &str = "x-ms-date";
    pub const VERSION: &str = "x-ms-version";
}

/// Resource types used in the signed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Documents,
    StoredProcedures,
}

impl ResourceType {
    fn as_str(self) -> &'static str {
        match self {
            ResourceType::Documents => "docs",
            ResourceType::StoredProcedures => "sprocs",
        }
    }
}

/// Builds the master-key authorization header value
///
/// The signed payload is `verb\nresourceType\nresourceLink\ndate\n\n` with
/// verb, resource type and date lowercased. The result is URL-encoded.
pub fn authorization_token(
    key: &[u8],
    method: &Method,
    resource_type: ResourceType,
    resource_link: &str,
    date: &str,
) -> Result<String> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        method.as_str().to_lowercase(),
        resource_type.as_str(),
        resource_link,
        date.to_lowercase()
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| {
        DataStoreError::CosmosDb(CosmosDbError::AuthenticationFailed(e.to_string()))
    })?;
    mac.update(payload.as_bytes());
    let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    let token = format!("type=master&ver=1.0&sig={signature}");
    Ok(url::form_urlencoded::byte_serialize(token.as_bytes()).collect())
}

/// HTTP client for one collection
pub struct CosmosRestClient {
    endpoint: String,
    key: Zeroizing<Vec<u8>>,
    collection: CollectionAddress,
    client: Client,
}

impl CosmosRestClient {
    /// Creates a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not valid base64 or the HTTP client
    /// cannot be built.
    pub fn new(config: &CosmosDbConfig) -> Result<Self> {
        use secrecy::ExposeSecret;

        let key = config.key.expose_secret().decode_base64().map_err(|e| {
            DataStoreError::CosmosDb(CosmosDbError::AuthenticationFailed(format!(
                "Account key is not valid base64: {e}"
            )))
        })?;

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                DataStoreError::CosmosDb(CosmosDbError::ConnectionFailed(format!(
                    "Failed to build HTTP client: {e}"
                )))
            })?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            key,
            collection: CollectionAddress::new(&config.database_name, &config.collection_name),
            client,
        })
    }

    pub fn collection(&self) -> &CollectionAddress {
        &self.collection
    }

    fn request(
        &self,
        method: Method,
        resource_type: ResourceType,
        resource_link: &str,
        path: &str,
    ) -> StoreResult<reqwest::RequestBuilder> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let token = authorization_token(&self.key, &method, resource_type, resource_link, &date)
            .map_err(|e| StoreFailure::new(status::BAD_REQUEST, e.to_string()))?;

        Ok(self
            .client
            .request(method, format!("{}/{}", self.endpoint, path))
            .header("authorization", token)
            .header(headers::DATE, date)
            .header(headers::VERSION, API_VERSION))
    }

    async fn send(request: reqwest::RequestBuilder) -> StoreResult<(u16, HeaderMap, Value)> {
        let response = request.send().await.map_err(transport_failure)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let body = response.json::<Value>().await.map_err(|e| {
            StoreFailure::new(status, format!("Invalid response body: {e}"))
                .with_request_charge(request_charge(&headers))
        })?;

        Ok((status, headers, body))
    }

    /// GET a single document
    pub async fn read_document(
        &self,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<StoreResponse<Value>> {
        let link = self.collection.document_link(id);
        let request = self
            .request(Method::GET, ResourceType::Documents, &link, &link)?
            .header(headers::PARTITION_KEY, partition_key_header(partition_key));

        let (status, headers, body) = Self::send(request).await?;
        Ok(StoreResponse {
            body,
            status,
            request_charge: request_charge(&headers),
        })
    }

    /// POST a query and return one page
    pub async fn query_documents(
        &self,
        query: &SqlQuerySpec,
        partition_key: Option<&str>,
        max_item_count: Option<u32>,
        continuation: Option<&str>,
    ) -> StoreResult<FeedPage> {
        let link = self.collection.link();
        let mut request = self
            .request(
                Method::POST,
                ResourceType::Documents,
                &link,
                &format!("{link}/docs"),
            )?
            .header("content-type", "application/query+json")
            .header(headers::IS_QUERY, "True")
            .json(query);

        if let Some(pk) = partition_key {
            request = request.header(headers::PARTITION_KEY, partition_key_header(pk));
        }
        if let Some(count) = max_item_count {
            request = request.header(headers::MAX_ITEM_COUNT, count.to_string());
        }
        if let Some(token) = continuation {
            request = request.header(headers::CONTINUATION, token);
        }

        let (status, headers, body) = Self::send(request).await?;
        let body: QueryResponseBody = serde_json::from_value(body)
            .map_err(|e| StoreFailure::new(status, format!("Invalid query response: {e}")))?;

        Ok(FeedPage {
            documents: body.documents,
            continuation: header_str(&headers, headers::CONTINUATION).map(String::from),
            status,
            request_charge: request_charge(&headers),
        })
    }

    /// POST to a stored procedure
    pub async fn execute_procedure(
        &self,
        name: &str,
        partition_key: &str,
        params: &[Value],
    ) -> StoreResult<StoreResponse<Value>> {
        let link = self.collection.procedure_link(name);
        let request = self
            .request(Method::POST, ResourceType::StoredProcedures, &link, &link)?
            .header(headers::PARTITION_KEY, partition_key_header(partition_key))
            .json(params);

        let (status, headers, body) = Self::send(request).await?;
        Ok(StoreResponse {
            body,
            status,
            request_charge: request_charge(&headers),
        })
    }

    /// POST a stored procedure definition
    ///
    /// Returns 409 as a failure when the procedure already exists.
    pub async fn create_procedure(&self, name: &str, body: &str) -> StoreResult<StoreResponse<Value>> {
        let link = self.collection.link();
        let request = self
            .request(
                Method::POST,
                ResourceType::StoredProcedures,
                &link,
                &format!("{link}/sprocs"),
            )?
            .json(&StoredProcedureBody {
                id: name.to_string(),
                body: body.to_string(),
            });

        let (status, headers, body) = Self::send(request).await?;
        Ok(StoreResponse {
            body,
            status,
            request_charge: request_charge(&headers),
        })
    }
}

fn partition_key_header(partition_key: &str) -> String {
    Value::Array(vec![Value::String(partition_key.to_string())]).to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v: &HeaderValue| v.to_str().ok())
}

fn request_charge(headers: &HeaderMap) -> f64 {
    header_str(headers, headers::REQUEST_CHARGE)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0)
}

fn transport_failure(error: reqwest::Error) -> StoreFailure {
    // Timeouts are transient; other transport errors are reported as unavailable
    let status = if error.is_timeout() {
        status::REQUEST_TIMEOUT
    } else {
        status::SERVICE_UNAVAILABLE
    };
    StoreFailure::new(status, error.to_string())
}

/// Converts a non-success response into a [`StoreFailure`]
pub async fn failure_from_response(response: Response) -> StoreFailure {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);

    let mut failure =
        StoreFailure::new(status, message).with_request_charge(request_charge(&headers));

    if let Some(sub_status) = header_str(&headers, headers::SUB_STATUS).and_then(|v| v.parse().ok())
    {
        failure = failure.with_sub_status(sub_status);
    }

    if let Some(ms) = header_str(&headers, headers::RETRY_AFTER_MS).and_then(|v| v.parse::<u64>().ok())
    {
        failure = failure.with_retry_after(Duration::from_millis(ms));
    }

    failure
}
