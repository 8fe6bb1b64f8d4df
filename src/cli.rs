//! Command-line interface for snapsweep

use crate::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapsweep")]
#[command(about = "Delete stale storage-array snapshots of virtual machines")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report what would be deleted without offlining or deleting anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Do not ask for confirmation (for scheduled jobs)
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Output format: "pretty", "json"
    #[arg(long, global = true, default_value = "pretty")]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a configuration template
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Verify both management endpoints accept the configured credentials
    Check,

    /// List array-backed datastores, VMs and eligible snapshots without changing anything
    Inventory {
        /// Only consider VMs matching these wildcards (overrides vm_include)
        #[arg(long = "vm")]
        vms: Vec<String>,
    },

    /// Delete stale array snapshots of VMs without a live platform snapshot
    Vms {
        /// Only consider VMs matching these wildcards (overrides vm_include)
        #[arg(long = "vm")]
        vms: Vec<String>,
    },

    /// Delete matching snapshots on offline replica volumes
    Replicas,

    /// Run VM reconciliation followed by replica cleanup
    Run {
        /// Only consider VMs matching these wildcards (overrides vm_include)
        #[arg(long = "vm")]
        vms: Vec<String>,
    },
}

/// Parse output format string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}
