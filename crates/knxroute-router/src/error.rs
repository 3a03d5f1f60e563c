use knxroute_core::{GroupAddress, IndividualAddress};
use knxroute_link::{LinkError, LinkId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("section [{0}] not found")]
    MissingSection(String),
    #[error("[{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },
    #[error("[{section}] unknown keys: {}", keys.join(", "))]
    UnknownKeys { section: String, keys: Vec<String> },
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("unknown driver '{0}'")]
    UnknownDriver(String),
    #[error("unknown server '{0}'")]
    UnknownServer(String),
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("section [{0}] names neither a driver nor a server")]
    NoLinkType(String),
    #[error("address {address} already claimed by {owner}")]
    AddressConflict {
        address: IndividualAddress,
        owner: String,
    },
    #[error("group address {address} already owned by {owner}")]
    GroupConflict { address: GroupAddress, owner: String },
    #[error("client address pool exhausted")]
    PoolExhausted,
    #[error("no client address pool configured")]
    NoClientPool,
    #[error("router setup failed")]
    SetupFailed,
    #[error("link {0} is not registered")]
    NotRegistered(LinkId),
    #[error("link '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("router reactor has shut down")]
    ReactorGone,
}
