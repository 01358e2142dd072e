/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Per-room task serializing every room command.
pub mod room_service;
/// Read-only room listing and inspection.
pub mod rooms_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
