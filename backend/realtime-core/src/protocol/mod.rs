//! Wire protocol of the persistent connection.
//!
//! Each WebSocket text frame carries one JSON object:
//!
//! ```json
//! { "event": "pipeline_update", "data": { "question_id": "Q1", "step": "drafting", "status": "complete" } }
//! ```
//!
//! [`events`] names every inbound and outbound event type, [`Frame`] is the
//! envelope, [`OutboundCommand`] the small command surface the client sends and
//! [`payloads`] the typed views of the lifecycle and domain payloads.

pub mod events;
mod frame;
pub mod payloads;

pub use frame::{Frame, OutboundCommand};
