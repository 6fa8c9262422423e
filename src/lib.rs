//! Reconciliation client for Dynatrace Settings 2.0 and classic Config API
//! objects: maps a locally declared, coordinate-addressed configuration onto
//! a remote tenant object, deciding whether to create, update, or leave it
//! untouched, under duplicate names, schema uniqueness constraints, eventual
//! consistency, rate limiting, and partial failure.
//!
//! [`settings::SettingsReconciler`] and [`classic::ClassicReconciler`] are the
//! two concrete reconcilers; [`dryrun::DryRunShadow`] implements the same
//! [`contract::SettingsContract`]/[`contract::ClassicContract`] surface
//! without touching a tenant, so callers can swap between them without
//! branching on mode.

pub mod atomic;
pub mod cache;
pub mod classic;
pub mod config;
pub mod contract;
pub mod dryrun;
pub mod error;
pub mod escape;
pub mod external_id;
pub mod http;
pub mod logging;
pub mod matching;
pub mod model;
pub mod pagination;
pub mod retry;
pub mod schema;
pub mod settings;

pub use contract::{ClassicContract, SettingsContract};
pub use error::{Error, ErrorKind};
pub use http::DynatraceClient;
