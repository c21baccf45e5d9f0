//! Domain entities, value objects, and events
//!
//! - Credentials (typed auth material, OAuth token pairs, auth status)
//! - Protocol session records
//! - Capability descriptors and tool call outcomes
//! - Runtime server keys, status and listings
//! - Domain events published on the event bus

mod capabilities;
mod credential;
mod event;
mod server;
mod session;

pub use capabilities::*;
pub use credential::*;
pub use event::{DomainEvent, DomainEventEnvelope};
pub use server::*;
pub use session::*;
