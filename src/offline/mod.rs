//! Offline cache engine mirroring the PWA service-worker contract: a
//! versioned static bucket served cache-first, a runtime bucket for
//! network-first API reads, and an install/activate lifecycle that precaches
//! and evicts.

/// Buckets, request classification, and the two fetch strategies.
pub mod cache;
/// Install/activate lifecycle state machine and its driver.
pub mod lifecycle;
