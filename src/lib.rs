//! In-memory hierarchical filesystem backing a simulated desktop.
//!
//! [`filesystem::Vfs`] owns the tree and its flat path index and performs every
//! mutation. [`offload`] runs read-only scans over snapshots on worker threads.
//! [`config`] loads the seed data the tree is initialized from.

#![allow(clippy::enum_variant_names)]

pub mod config;
pub mod filesystem;
pub mod offload;
