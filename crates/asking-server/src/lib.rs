//! Asking Server - WebSocket sync server for Asking Card
//!
//! This crate keeps every connected client looking at the same list of
//! cards. One control loop owns the [`asking_core::CardStore`]; client
//! connections feed it mutation events and receive the resulting
//! broadcasts.
//!
//! The server supports:
//! - Multiple concurrent connections, one task each
//! - JSON events (`create_card`, `delete_card` in; `initial_cards`,
//!   `new_card`, `card_deleted` out)
//! - Origin checks per hosting mode
//! - Fire-and-forget notifications for new cards

mod config;
mod control;
mod error;
pub mod protocol;
mod registry;
mod sync_server;

pub use config::{HostingMode, OriginPolicy, SyncServerConfig, DEFAULT_PORT};
pub use control::SyncServerHandle;
pub use error::{Result, ServerError};
pub use protocol::{ClientEvent, Frame, ServerEvent};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use sync_server::SyncServer;
