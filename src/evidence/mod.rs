//! Evidence events and the token catalogue.
//!
//! Events are what the ingestion collaborator hands to the store; tokens are
//! the neutral, atomic fact types the store derives from them to record the
//! order in which things happened at a price level.

mod event;
mod token;

pub use event::{BookSide, EventKind, EvidenceEvent, LiquidationSide};
pub use token::{EvidenceToken, TokenEntry, TokenFamily};
