//! Append-only audit log of sweep actions
//!
//! Every offline, delete and skip decision is written as one JSON object per
//! line so scheduled runs leave a trail that can be grepped or ingested.

use crate::error::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Severity of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// Which procedure produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Procedure {
    Session,
    Reconcile,
    Replicas,
}

#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: String,
    run_id: Uuid,
    level: AuditLevel,
    procedure: Procedure,
    target: &'a str,
    action: &'a str,
    outcome: &'a str,
    message: &'a str,
}

/// Structured log file writer shared by both sweep procedures
#[derive(Debug)]
pub struct AuditLog {
    run_id: Uuid,
    file: Option<File>,
}

impl AuditLog {
    /// Open (or create) the log file in append mode
    pub fn open(path: &Path, run_id: Uuid) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::debug!("Audit log opened at {}", path.display());

        Ok(Self {
            run_id,
            file: Some(file),
        })
    }

    /// Audit log that discards everything
    pub fn disabled() -> Self {
        Self {
            run_id: Uuid::nil(),
            file: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append one entry. Write failures are reported but never propagated.
    pub fn record(
        &mut self,
        level: AuditLevel,
        procedure: Procedure,
        target: &str,
        action: &str,
        outcome: &str,
        message: &str,
    ) {
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let entry = AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: self.run_id,
            level,
            procedure,
            target,
            action,
            outcome,
            message,
        };

        let written = serde_json::to_string(&entry)
            .map_err(std::io::Error::from)
            .and_then(|line| {
                writeln!(file, "{}", line)?;
                file.flush()
            });

        if let Err(e) = written {
            log::warn!("Failed to write audit entry for {}: {}", target, e);
        }
    }
}
