//! Server-Sent Events for the Igniter core: channel registry, per-connection
//! dispatch with scope filtering, keep-alive, and wire framing.

pub mod event;
pub mod hub;

pub use event::{SseEvent, comment_frame, response_headers, retry_frame};
pub use hub::{
    REVALIDATION_CHANNEL, SYSTEM_CHANNEL, SseChannel, SseConnectionHandle, SseHub, SseHubStats,
};
