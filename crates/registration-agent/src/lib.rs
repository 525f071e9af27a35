//! Self-registration agent for a central discovery registry
//!
//! This crate advertises the process's management endpoint to a discovery
//! registry, retries until the registration sticks, and retracts it again on
//! shutdown.
//!
//! # Architecture
//!
//! - [`AgentConfig`] holds the validated, immutable inputs
//! - [`RegistryClient`] is the seam to the registry; [`HttpRegistryClient`]
//!   speaks its HTTP API through `reqwest`
//! - [`RegistrationController`] owns the registration state machine and the
//!   retry timer
//! - [`Spawner`] keeps the controller independent of the async runtime
//!
//! # Example
//!
//! ```no_run
//! use registration_agent::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> registration_agent::Result<()> {
//! let config = AgentConfig::builder()
//!     .with_app_name("inventory")
//!     .with_http_port(8181)
//!     .with_management("localhost", 9091)
//!     .with_registry_url("http://registry:8181")
//!     .with_authorization("Basic dXNlcjpwYXNz")
//!     .with_callback_host("localhost")
//!     .with_retry_interval(Duration::from_secs(10))
//!     .build()?;
//!
//! let client = Arc::new(HttpRegistryClient::from_config(&config)?);
//! # #[cfg(feature = "tokio")]
//! # {
//! let controller = RegistrationController::new(config, client, Arc::new(TokioSpawner));
//! controller.start().await;
//! // ... run the application ...
//! controller.stop().await;
//! # }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod runtime;

pub use client::{HttpRegistryClient, RegistryClient, RegistryOperation};
pub use config::{AgentConfig, AgentConfigBuilder};
pub use controller::{AttemptOutcome, Lifecycle, RegistrationController, RegistrationStatus};
pub use error::{Error, Result};
pub use models::*;
pub use runtime::{RetryTimer, Spawner};

#[cfg(feature = "smol")]
pub use runtime::SmolSpawner;

#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;

/// Re-export key types for convenience
pub mod prelude {
    pub use crate::{
        AgentConfig,
        AttemptOutcome,
        Error,
        HttpRegistryClient,
        RegistrationController,
        RegistrationStatus,
        RegistryClient,
        Result,
        Spawner,
    };

    #[cfg(feature = "smol")]
    pub use crate::SmolSpawner;

    #[cfg(feature = "tokio")]
    pub use crate::TokioSpawner;
}
