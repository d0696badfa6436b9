/// Client diagnostics metric recording and retrieval.
pub mod diagnostics_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// External fixture and ladder pass-through with caching.
pub mod fixture_service;
/// Health check service.
pub mod health_service;
/// AI insight pass-through behind an opaque generator trait.
pub mod insights_service;
/// Cross-team player library persistence.
pub mod library_service;
/// PIN token issuing and comparison.
pub mod pin;
/// Short-TTL response cache with explicit invalidation registry.
pub mod response_cache;
/// Storage connection supervisor with reconnect and degraded mode.
pub mod storage_supervisor;
/// Team listing, reads, and the guarded save path.
pub mod team_service;
