//! Configuration file handling

use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "snapsweep.json";

/// Management endpoint connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    pub url: String,
    pub username: String,
    /// Inline password; takes precedence over `password_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Environment variable holding the password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// vCenter endpoint plus the VI/JSON release to address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VcenterConfig {
    #[serde(flatten)]
    pub endpoint: EndpointConfig,
    #[serde(default = "default_api_release")]
    pub api_release: String,
}

/// Which snapshots and VMs are eligible
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepPolicy {
    pub snapshot_pattern: String,
    #[serde(default = "default_replica_pattern")]
    pub replica_snapshot_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age_hours: Option<u64>,
    #[serde(default)]
    pub vm_include: Vec<String>,
    #[serde(default)]
    pub vm_exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepConfig {
    pub array: EndpointConfig,
    pub vcenter: VcenterConfig,
    pub policy: SweepPolicy,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_release() -> String {
    "8.0.1.0".to_string()
}

fn default_replica_pattern() -> String {
    "*".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("snapsweep.log")
}

impl EndpointConfig {
    /// Resolve the password from the inline value or the named environment variable
    pub fn resolve_password(&self, label: &str) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }

        match &self.password_env {
            Some(var) => std::env::var(var).map_err(|_| {
                SweepError::config(format!(
                    "{} password variable '{}' is not set",
                    label, var
                ))
            }),
            None => Err(SweepError::config(format!(
                "no password or password_env configured for {}",
                label
            ))),
        }
    }

    fn validate(&self, label: &str) -> Result<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(SweepError::config(format!("{} url is empty", label)));
        }
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(SweepError::config(format!(
                "{} url must start with http:// or https://: {}",
                label, url
            )));
        }
        if self.username.trim().is_empty() {
            return Err(SweepError::config(format!("{} username is empty", label)));
        }
        if self.timeout_secs == 0 {
            return Err(SweepError::config(format!(
                "{} timeout_secs must be greater than 0",
                label
            )));
        }
        Ok(())
    }
}

impl SweepPolicy {
    fn validate(&self) -> Result<()> {
        glob::Pattern::new(&self.snapshot_pattern)?;
        glob::Pattern::new(&self.replica_snapshot_pattern)?;
        for pattern in self.vm_include.iter().chain(self.vm_exclude.iter()) {
            glob::Pattern::new(pattern)?;
        }
        Ok(())
    }
}

impl SweepConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SweepError::config(format!(
                "config file not found: {} (run `snapsweep init` to create one)",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let config: SweepConfig = serde_json::from_str(&content)?;
        config.validate()?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.array.validate("array")?;
        self.vcenter.endpoint.validate("vcenter")?;
        if self.vcenter.api_release.trim().is_empty() {
            return Err(SweepError::config("vcenter api_release is empty"));
        }
        self.policy.validate()
    }

    /// Template written by `snapsweep init`
    pub fn template() -> Self {
        Self {
            array: EndpointConfig {
                url: "https://array01.example.com:5392".to_string(),
                username: "admin".to_string(),
                password: None,
                password_env: Some("SNAPSWEEP_ARRAY_PASSWORD".to_string()),
                verify_tls: true,
                timeout_secs: default_timeout_secs(),
            },
            vcenter: VcenterConfig {
                endpoint: EndpointConfig {
                    url: "https://vcenter01.example.com".to_string(),
                    username: "administrator@vsphere.local".to_string(),
                    password: None,
                    password_env: Some("SNAPSWEEP_VCENTER_PASSWORD".to_string()),
                    verify_tls: true,
                    timeout_secs: default_timeout_secs(),
                },
                api_release: default_api_release(),
            },
            policy: SweepPolicy {
                snapshot_pattern: "*-snap-*".to_string(),
                replica_snapshot_pattern: default_replica_pattern(),
                min_age_hours: Some(24),
                vm_include: Vec::new(),
                vm_exclude: Vec::new(),
            },
            log_file: default_log_file(),
        }
    }

    /// Write the template config, refusing to overwrite unless forced
    pub fn write_template(path: &Path, force: bool) -> Result<Self> {
        if path.exists() && !force {
            return Err(SweepError::config(format!(
                "config file already exists: {} (use --force to overwrite)",
                path.display()
            )));
        }

        let config = Self::template();
        fs::write(path, serde_json::to_string_pretty(&config)?)?;
        log::info!("Wrote config template to {}", path.display());
        Ok(config)
    }
}
