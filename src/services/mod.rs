/// Music catalog search.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Party lifecycle, queue and vote operations.
pub mod party_service;
/// Room event rendering and dispatch.
pub mod room_events;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
/// WebSocket room connection handling.
pub mod websocket_service;
