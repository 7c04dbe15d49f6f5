//! A small blocking Rust client for BigML-style asynchronous resources.
//!
//! Resources such as forecasts are built server-side from upstream resources
//! (a time series) that may still be processing. This crate implements the
//! lifecycle around that:
//! validate ids locally, wait (with a bounded budget) for the upstream
//! resource, then create, read, update, delete or list.
//!
//! ## Quick start
//! - Configure authentication via environment variables (`BIGML_USERNAME`,
//!   `BIGML_API_KEY`) or a `.bigmlrc` file (current directory or home directory).
//! - Build a [`ResourceClient`] for a [`ResourceKind`] and call
//!   [`ResourceClient::create`].
//!
//! ```no_run
//! use anyhow::Result;
//! use bigml::{ResourceClient, ResourceKind};
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     let forecasts = ResourceClient::from_env(ResourceKind::FORECAST)?;
//!     let input = json!({"000005": {"horizon": 10}});
//!     let forecast = forecasts.create(
//!         "timeseries/5af06df94e17277501000010",
//!         input.as_object(),
//!         None,
//!         None,
//!     )?;
//!     println!("{}", serde_json::to_string_pretty(&forecast)?);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod identifier;
mod poll;
mod resource;
mod status;
mod transport;
mod util;

pub use client::{ResourceClient, Result};
pub use config::ClientConfig;
pub use error::ResourceError;
pub use identifier::validate;
pub use poll::{
    CancelToken, Cancelled, PollingPolicy, ReadinessProbe, Sleeper, Wait, await_ready,
};
pub use resource::{Document, ResourceKind, ResourceType, resource_id};
pub use status::{Readiness, StatusCode, is_finished, status_code, verdict};
pub use transport::{HttpTransport, Transport};
