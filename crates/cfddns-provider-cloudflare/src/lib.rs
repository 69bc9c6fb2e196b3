// # Cloudflare DNS Provider
//
// This crate implements `DnsProvider` against the Cloudflare API v4 for a
// single, pre-configured zone.
//
// ## Behavior
//
// - One HTTP request per trait call; no retries, no caching
// - Whether a write is needed is decided by the update planner, not here
// - HTTP timeout of 30 seconds
// - Dry-run mode performs lookups but only logs creates and updates
//
// ## Failure Mapping
//
// | Situation                                         | Error                 |
// |---------------------------------------------------|-----------------------|
// | connect / timeout / body read failed              | `Error::Transport`    |
// | HTTP error status                                 | `Error::Rejected`     |
// | `success` is not `true`                           | `Error::Rejected`     |
// | body is not the expected JSON envelope            | `Error::Rejected`     |
//
// `Rejected` carries `errors[0].code` and `errors[0].message` when the body
// supplied them.
//
// ## Security
//
// The API token never appears in logs or `Debug` output.
//
// ## API Reference
//
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=..&name=..&match=all`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfddns_core::traits::{DnsProvider, DnsRecord, RECORD_TTL_SECS};
use cfddns_core::{Error, RecordType, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope shared by every Cloudflare API v4 endpoint
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// One entry of the envelope's `errors` array
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Body of create and overwrite requests
#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: u32,
}

impl<'a> RecordPayload<'a> {
    fn new(record_type: RecordType, name: &'a str, ip: IpAddr) -> Self {
        Self {
            record_type: record_type.as_str(),
            name,
            content: ip.to_string(),
            ttl: RECORD_TTL_SECS,
        }
    }
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform lookups as usual
/// - Log the intended POST/PUT payload
/// - Answer creates and updates with a synthesized record
///
/// No write ever reaches Cloudflare.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone holding every managed record
    zone_id: String,

    /// API root, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform lookups but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `zone_id`: Zone identifier that holds every managed record
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permission
    /// - `dry_run`: If true, perform lookups but skip writes
    ///
    /// # Errors
    ///
    /// `Error::Config` when the token or zone is empty, or the HTTP client
    /// cannot be built.
    pub fn new(
        zone_id: impl Into<String>,
        api_token: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let zone_id = zone_id.into();
        let api_token = api_token.into();

        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.trim().is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            api_token,
            zone_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}", self.records_url(), record_id)
    }

    /// Send a request and unwrap the Cloudflare envelope into `T`
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(format!("{} request failed: {}", operation, e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("{} response read failed: {}", operation, e)))?;

        decode_envelope(status.as_u16(), &body, operation)
    }
}

/// Interpret a raw Cloudflare response
///
/// Kept free of I/O so every failure branch can be tested directly.
fn decode_envelope<T: DeserializeOwned>(status: u16, body: &[u8], operation: &str) -> Result<T> {
    let envelope: ApiResponse = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(
                "{} returned HTTP {} with an unparseable body: {}",
                operation,
                status,
                e
            );
            return Err(Error::rejected(None, None, Some(status)));
        }
    };

    let http_ok = (200..300).contains(&status);
    if !http_ok || !envelope.success {
        let (code, message) = envelope
            .errors
            .into_iter()
            .next()
            .map(|e| (e.code, e.message))
            .unwrap_or((None, None));
        return Err(Error::rejected(code, message, Some(status)));
    }

    let result = envelope.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(result).map_err(|e| {
        tracing::debug!("{} returned an unexpected result shape: {}", operation, e);
        Error::rejected(None, None, Some(status))
    })
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// List records matching type and name exactly
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=example.com&match=all
    /// Authorization: Bearer <token>
    /// ```
    async fn lookup(&self, record_type: RecordType, name: &str) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Cloudflare GET dns_records: type={} name={}", record_type, name);

        let request = self.client.get(self.records_url()).query(&[
            ("type", record_type.as_str()),
            ("name", name),
            ("match", "all"),
        ]);

        let records: Option<Vec<DnsRecord>> = self.send(request, "lookup").await?;
        let records = records.unwrap_or_default();

        tracing::debug!(
            "Cloudflare GET dns_records: type={} name={} count={}",
            record_type,
            name,
            records.len()
        );
        Ok(records)
    }

    /// Create a record with TTL 120
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "type": "A", "name": "example.com", "content": "1.2.3.4", "ttl": 120 }
    /// ```
    async fn create(&self, record_type: RecordType, name: &str, ip: IpAddr) -> Result<DnsRecord> {
        let payload = RecordPayload::new(record_type, name, ip);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                self.records_url(),
                serde_json::to_string(&payload)?
            );
            return Ok(synthesized(record_type, name, ip, String::new()));
        }

        tracing::debug!("Cloudflare POST dns_records: type={} name={} ip={}", record_type, name, ip);
        let request = self.client.post(self.records_url()).json(&payload);
        let record: DnsRecord = self.send(request, "create").await?;

        tracing::info!("DNS record created: {} -> {} (id {})", name, ip, record.id);
        Ok(record)
    }

    /// Overwrite an existing record by id
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// { "type": "A", "name": "example.com", "content": "1.2.3.4", "ttl": 120 }
    /// ```
    async fn update(
        &self,
        record_type: RecordType,
        name: &str,
        ip: IpAddr,
        record_id: &str,
    ) -> Result<DnsRecord> {
        let payload = RecordPayload::new(record_type, name, ip);
        let url = self.record_url(record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(synthesized(record_type, name, ip, record_id.to_string()));
        }

        tracing::debug!(
            "Cloudflare PUT dns_records/{}: type={} name={} ip={}",
            record_id,
            record_type,
            name,
            ip
        );
        let request = self.client.put(url).json(&payload);
        let record: DnsRecord = self.send(request, "update").await?;

        tracing::info!("DNS record updated: {} -> {}", name, ip);
        Ok(record)
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Record returned in dry-run mode in place of the provider's answer
fn synthesized(record_type: RecordType, name: &str, ip: IpAddr, id: String) -> DnsRecord {
    DnsRecord {
        id,
        record_type: record_type.to_string(),
        name: name.to_string(),
        content: ip.to_string(),
        ttl: Some(RECORD_TTL_SECS),
    }
}
