//! HTTP API handlers for boardsync

pub mod boards;
pub mod cards;
pub mod health;
pub mod relations;
pub mod sse;

pub use boards::board_routes;
pub use cards::card_routes;
pub use health::health_routes;
pub use relations::relation_routes;
pub use sse::event_stream;
