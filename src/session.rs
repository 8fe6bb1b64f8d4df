//! Opening and closing the two management sessions

use crate::array::{NimbleClient, StorageArray};
use crate::audit::{AuditLevel, AuditLog, Procedure};
use crate::config::{EndpointConfig, SweepConfig};
use crate::error::Result;
use crate::vcenter::{VcenterClient, Virtualization};
use reqwest::blocking::Client as HttpClient;
use std::time::Duration;

/// Build the blocking HTTP client for one endpoint
pub fn http_client(endpoint: &EndpointConfig) -> Result<HttpClient> {
    if !endpoint.verify_tls {
        log::warn!("TLS certificate verification disabled for {}", endpoint.url);
    }

    let client = HttpClient::builder()
        .timeout(Duration::from_secs(endpoint.timeout_secs))
        .danger_accept_invalid_certs(!endpoint.verify_tls)
        .build()?;
    Ok(client)
}

/// Endpoint URL without trailing slashes
pub fn base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Authenticated sessions to the array and to vCenter
#[derive(Debug)]
pub struct Sessions {
    pub array: NimbleClient,
    pub vcenter: VcenterClient,
}

/// Log in to the array, then to vCenter
///
/// If the vCenter login fails the array session is closed before the error
/// is returned.
pub fn connect(config: &SweepConfig, audit: &mut AuditLog) -> Result<Sessions> {
    let array_password = config.array.resolve_password("array")?;
    let vcenter_password = config.vcenter.endpoint.resolve_password("vcenter")?;

    let array = match NimbleClient::connect(&config.array, &array_password) {
        Ok(array) => array,
        Err(e) => {
            audit.record(
                AuditLevel::Error,
                Procedure::Session,
                &config.array.url,
                "connect",
                "failed",
                &e.to_string(),
            );
            return Err(e);
        }
    };
    audit.record(AuditLevel::Info, Procedure::Session, &config.array.url, "connect", "ok", "");

    let vcenter = match VcenterClient::connect(&config.vcenter, &vcenter_password) {
        Ok(vcenter) => vcenter,
        Err(e) => {
            audit.record(
                AuditLevel::Error,
                Procedure::Session,
                &config.vcenter.endpoint.url,
                "connect",
                "failed",
                &e.to_string(),
            );
            record_disconnect(array.disconnect(), &config.array.url, audit);
            return Err(e);
        }
    };
    audit.record(
        AuditLevel::Info,
        Procedure::Session,
        &config.vcenter.endpoint.url,
        "connect",
        "ok",
        "",
    );

    Ok(Sessions { array, vcenter })
}

impl Sessions {
    /// Log out of both services; failures are only logged
    pub fn close(self, config: &SweepConfig, audit: &mut AuditLog) {
        record_disconnect(self.vcenter.disconnect(), &config.vcenter.endpoint.url, audit);
        record_disconnect(self.array.disconnect(), &config.array.url, audit);
    }
}

fn record_disconnect(result: Result<()>, url: &str, audit: &mut AuditLog) {
    match result {
        Ok(()) => {
            audit.record(AuditLevel::Info, Procedure::Session, url, "disconnect", "ok", "");
        }
        Err(e) => {
            log::warn!("Failed to close session on {}: {}", url, e);
            audit.record(
                AuditLevel::Warn,
                Procedure::Session,
                url,
                "disconnect",
                "failed",
                &e.to_string(),
            );
        }
    }
}
