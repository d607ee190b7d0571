/// Outbound view structures shared by several messages.
pub mod game;
/// Health check data structures.
pub mod health;
/// Request validation utilities.
pub mod validation;
/// WebSocket message data structures.
pub mod ws;
