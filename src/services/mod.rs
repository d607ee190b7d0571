/// Per-socket lifecycle and message dispatch.
pub mod connection;
/// OpenAPI document aggregation.
pub mod documentation;
/// Health status reporting.
pub mod health_service;
/// Room membership, lobby, and answer handling.
pub mod room_service;
/// Round state machine and timers.
pub mod round_service;
