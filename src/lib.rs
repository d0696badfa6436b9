//! Library crate for rostersync, exposing modules for binaries and integration tests.

/// Offline-capable client: local store, API client, sync scheduler.
pub mod client;
/// Runtime configuration loading.
pub mod config;
/// Persistence layer.
pub mod dao;
/// Request/response DTOs and the wire envelope.
pub mod dto;
/// Error taxonomy for services and HTTP responses.
pub mod error;
/// Offline cache engine: versioned buckets, fetch strategies, lifecycle.
pub mod offline;
/// HTTP route trees.
pub mod routes;
/// Business logic services.
pub mod services;
/// Shared application state.
pub mod state;
