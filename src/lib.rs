//! # snapsweep
//!
//! Deletes stale storage-array snapshots belonging to virtual machines,
//! skipping any VM whose storage still backs a live hypervisor snapshot, and
//! cleans up replicated snapshots on offline replica volumes.

pub mod array;
pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod output;
pub mod progress;
pub mod purge;
pub mod reconcile;
pub mod replicas;
pub mod report;
pub mod session;
pub mod sweep;
pub mod vcenter;

pub use array::{ArraySnapshot, ArrayVolume, NimbleClient, StorageArray};
pub use config::SweepConfig;
pub use error::{Result, SweepError};
pub use vcenter::{Datastore, MoRef, VcenterClient, VirtualMachine, Virtualization};
