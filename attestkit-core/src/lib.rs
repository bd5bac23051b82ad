#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Hardware-backed device attestation for mobile apps.
//!
//! The host app provides the platform pieces (the [`AppAttestService`] hardware
//! provider, optionally an [`AtomicBlobStore`] and a [`Logger`]); this crate runs
//! the enrollment and per-request assertion protocol against the trust server and
//! attaches the resulting credentials to outgoing requests.

pub mod client;
pub use client::{AppAttestClient, AssertionResult};

pub mod config;
pub use config::{default_server_config, server_config_from_json, Endpoints, ServerConfig};

pub mod envelope;
pub use envelope::Envelope;

mod error;
pub use error::*;

pub mod key_store;
pub use key_store::{
    blob_key_id_store, in_memory_key_id_store, AtomicBlobStore, BlobKeyIdStore,
    InMemoryKeyIdStore, KeyIdStore,
};

pub mod logger;
pub use logger::{set_logger, LogLevel, Logger};

pub mod payload;
pub use payload::Payload;

pub mod request_auth;
pub use request_auth::{AppAttestRequestAuth, BearerRequestAuth, OutboundRequest, RequestAuth};

pub mod server;
pub use server::{mlpa_server, AppAttestRemoteServer, MlpaServer};

pub mod service;
pub use service::AppAttestService;

// private modules
mod http_request;

uniffi::setup_scaffolding!("attestkit_core");
