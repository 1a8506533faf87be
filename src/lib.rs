//! tuffy - hot-reloading command host.
//!
//! Command modules are described by small files in a watched directory.
//! The [`lifecycle`] subsystem loads, reloads and unloads them as those files
//! appear, change and disappear, and republishes the command table served by
//! the [`gateway`], all without restarting the process.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod loader;
pub mod metrics;
pub mod modules;
pub mod publish;
pub mod telemetry;
