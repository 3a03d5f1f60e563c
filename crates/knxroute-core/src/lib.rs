//! KNX network-layer types in pure Rust.
//!
//! `knxroute-core` provides the addressing model, textual address parsing,
//! and the frame types that flow through a knxroute router. It has no I/O
//! and no runtime dependency and forms the foundation of the knxroute crate
//! family.
//!
//! # Feature flags
//!
//! - **`serde`**: derives `Serialize`/`Deserialize` on addresses and frames.

/// Individual and group addresses plus the routing destination type.
pub mod address;
/// Raw bus observation records for busmonitor taps.
pub mod busmonitor;
/// Error types for address parsing.
pub mod error;
/// L_Data frames and their routing metadata.
pub mod frame;
/// Textual address and address-block parsers.
pub mod parse;

pub use address::{Destination, GroupAddress, IndividualAddress};
pub use busmonitor::{LBusmonitor, MonitorPdu};
pub use error::ParseError;
pub use frame::{LData, Priority, DEFAULT_HOP_COUNT, MAX_HOP_COUNT};
pub use parse::{read_group_addr, readaddr, readaddrblock};
