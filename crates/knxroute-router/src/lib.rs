//! The knxroute router: one logical KNX bus built from many links.
//!
//! A [`Router`] owns a registry of links (drivers, servers and the client
//! connections servers accept), routes L_Data frames between them with
//! loop and repeat suppression, leases client addresses from a pool and
//! feeds busmonitor taps. All of its state lives on one reactor task; links
//! and other threads reach it through a cloneable [`RouterHandle`].

pub mod config;
pub mod dedup;
pub mod error;
pub mod factory;
pub mod handle;
pub mod observer;
pub mod pipeline;
pub mod pool;
pub mod registry;
pub mod router;

pub use config::{IniData, Section, Value};
pub use dedup::{DedupFilter, DEFAULT_REPEAT_WINDOW};
pub use error::{ConfigError, RouterError};
pub use factory::{Factories, Factory};
pub use handle::{RouterHandle, RouterStatus};
pub use observer::{BusmonitorObserver, ObserverRegistry};
pub use pipeline::DEFAULT_QUEUE_HIGH_WATER;
pub use pool::AddressPool;
pub use registry::{LinkOptions, LinkStack};
pub use router::{Router, DEFAULT_ADDR, DEFAULT_MAIN_SECTION, DEFAULT_SERVER_NAME};
