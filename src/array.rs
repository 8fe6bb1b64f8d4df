//! Storage array management binding
//!
//! Only the handful of REST v1 calls the sweep needs: session tokens, volume
//! and snapshot listing, snapshot offline and snapshot delete.

use crate::config::EndpointConfig;
use crate::error::{Result, SweepError};
use crate::session;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "array";
const AUTH_HEADER: &str = "X-Auth-Token";
const PAGE_SIZE: usize = 500;

/// A volume as reported by the array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayVolume {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_role: Option<String>,
}

impl ArrayVolume {
    /// Volume is the receiving side of a replication partnership
    pub fn is_replica_target(&self) -> bool {
        self.replication_role
            .as_deref()
            .map(|role| role.ends_with("downstream"))
            .unwrap_or(false)
    }
}

/// A volume snapshot as reported by the array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArraySnapshot {
    pub id: String,
    pub name: String,
    pub vol_id: String,
    #[serde(default)]
    pub vol_name: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub is_replica: bool,
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub creation_time: Option<i64>,
    #[serde(default)]
    pub new_data_compressed_bytes: Option<u64>,
}

impl ArraySnapshot {
    /// `volume/snapshot` label used in logs and reports
    pub fn label(&self) -> String {
        format!("{}/{}", self.vol_name, self.name)
    }
}

/// Operations the sweep needs from a storage array
pub trait StorageArray {
    fn list_volumes(&self) -> Result<Vec<ArrayVolume>>;
    fn list_snapshots(&self, volume: &ArrayVolume) -> Result<Vec<ArraySnapshot>>;
    fn offline_snapshot(&self, snapshot: &ArraySnapshot) -> Result<()>;
    fn delete_snapshot(&self, snapshot: &ArraySnapshot) -> Result<()>;
    fn disconnect(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(rename = "totalRows", default)]
    total_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    id: String,
    session_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    messages: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    text: String,
}

/// REST client holding an authenticated array session
#[derive(Debug)]
pub struct NimbleClient {
    http: HttpClient,
    base_url: String,
    token: String,
    token_id: String,
}

impl NimbleClient {
    /// Authenticate and open a session token
    pub fn connect(endpoint: &EndpointConfig, password: &str) -> Result<Self> {
        let http = session::http_client(endpoint)?;
        let base_url = session::base_url(&endpoint.url);

        let body = serde_json::json!({
            "data": {
                "username": endpoint.username,
                "password": password,
            }
        });
        let response = http
            .post(format!("{}/v1/tokens", base_url))
            .json(&body)
            .send()?;
        let token: DataEnvelope<TokenData> = check_response(response)?.json()?;

        log::info!("Opened array session on {} as {}", base_url, endpoint.username);

        Ok(Self {
            http,
            base_url,
            token: token.data.session_token,
            token_id: token.data.id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTH_HEADER, &self.token)
    }

    /// Fetch every row of a paged collection
    fn get_paged<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<T>> {
        let mut items: Vec<T> = Vec::new();

        loop {
            let start = items.len();
            let end = start + PAGE_SIZE;
            let request = self
                .http
                .get(self.url(path))
                .query(query)
                .query(&[("startRow", start), ("endRow", end)]);
            let page: Page<T> = check_response(self.authed(request).send()?)?.json()?;

            let fetched = page.data.len();
            items.extend(page.data);
            let total = page.total_rows.unwrap_or(items.len());

            log::debug!("Fetched {} rows of {} ({}/{})", fetched, path, items.len(), total);

            if fetched == 0 || items.len() >= total {
                break;
            }
        }

        Ok(items)
    }
}

impl StorageArray for NimbleClient {
    fn list_volumes(&self) -> Result<Vec<ArrayVolume>> {
        self.get_paged("volumes/detail", &[])
    }

    fn list_snapshots(&self, volume: &ArrayVolume) -> Result<Vec<ArraySnapshot>> {
        self.get_paged("snapshots/detail", &[("vol_id", volume.id.as_str())])
    }

    fn offline_snapshot(&self, snapshot: &ArraySnapshot) -> Result<()> {
        let body = serde_json::json!({ "data": { "online": false } });
        let request = self
            .http
            .put(self.url(&format!("snapshots/{}", snapshot.id)))
            .json(&body);
        check_response(self.authed(request).send()?)?;
        Ok(())
    }

    fn delete_snapshot(&self, snapshot: &ArraySnapshot) -> Result<()> {
        let request = self.http.delete(self.url(&format!("snapshots/{}", snapshot.id)));
        check_response(self.authed(request).send()?)?;
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let request = self.http.delete(self.url(&format!("tokens/{}", self.token_id)));
        check_response(self.authed(request).send()?)?;
        log::debug!("Closed array session {}", self.token_id);
        Ok(())
    }
}

/// Turn non-2xx responses into API errors carrying the array's own message
fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| {
            let texts: Vec<String> = parsed
                .messages
                .into_iter()
                .map(|m| m.text)
                .filter(|t| !t.is_empty())
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("; "))
            }
        })
        .unwrap_or(body);

    Err(SweepError::api(SERVICE, status.as_u16(), message))
}
