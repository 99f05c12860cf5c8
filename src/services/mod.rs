/// Answer evaluation and winner arbitration.
pub mod answer_service;
/// Delayed game-start scheduling.
pub mod countdown_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// AI question generation client and retry policy.
pub mod quiz_service;
/// Matchmaking and room lifecycle orchestration.
pub mod room_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
