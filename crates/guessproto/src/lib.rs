//! `guessproto`: the JSON event protocol between game clients and the server.
//!
//! Every message is a single JSON object tagged by an `event` field. Inbound
//! events (`ClientEvent`) carry a room id plus a payload; outbound events
//! (`ServerEvent`) are either room-scoped broadcasts or session-local errors.
//! All words on the wire are lowercase; similarities are floats in [-1, 1];
//! ranks are 1-based.

pub mod events;
pub mod session;

pub use events::{ClientEvent, GuessEntry, RankedEntry, ServerEvent};
pub use session::SessionId;
