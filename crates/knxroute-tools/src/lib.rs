use std::path::Path;

use clap::ValueEnum;
use knxroute_core::{read_group_addr, readaddr, readaddrblock, GroupAddress, IndividualAddress, ParseError};
use knxroute_router::{ConfigError, Factories, IniData, Router};
use serde::Serialize;

/// Which address notation a CLI argument is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AddressKind {
    /// `area.line.device`
    Individual,
    /// `area.line.device:len`
    Block,
    /// `main/middle/sub` or `main/sub`
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedAddress {
    Individual { address: IndividualAddress, raw: u16 },
    Block { start: IndividualAddress, len: u16, raw: u16 },
    Group { address: GroupAddress, raw: u16 },
}

impl ParsedAddress {
    pub fn parse(kind: AddressKind, text: &str) -> Result<Self, ParseError> {
        Ok(match kind {
            AddressKind::Individual => {
                let address = readaddr(text)?;
                Self::Individual { address, raw: address.raw() }
            }
            AddressKind::Block => {
                let (start, len) = readaddrblock(text)?;
                Self::Block { start, len, raw: start.raw() }
            }
            AddressKind::Group => {
                let address = read_group_addr(text)?;
                Self::Group { address, raw: address.raw() }
            }
        })
    }
}

impl std::fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual { address, raw } => write!(f, "{address} (0x{raw:04x})"),
            Self::Block { start, len, raw } => write!(f, "{start}:{len} (0x{raw:04x})"),
            Self::Group { address, raw } => write!(f, "{address} (0x{raw:04x})"),
        }
    }
}

/// Outcome of validating one configuration section.
#[derive(Debug, Clone, Serialize)]
pub struct SectionCheck {
    pub section: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionCheck {
    fn from_result<E: std::fmt::Display>(section: &str, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                section: section.to_string(),
                ok: true,
                error: None,
            },
            Err(err) => Self {
                section: section.to_string(),
                ok: false,
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub setup: SectionCheck,
    pub links: Vec<SectionCheck>,
}

impl CheckReport {
    pub fn ok(&self) -> bool {
        self.setup.ok && self.links.iter().all(|check| check.ok)
    }
}

pub fn load_config(path: &Path) -> Result<IniData, ConfigError> {
    IniData::load(path)
}

/// Sets a router up from `config` and dry-builds every link section in it,
/// listed under `connections` or not.
pub fn check_config(config: IniData, main: &str) -> CheckReport {
    let mut router = Router::new(config, Factories::builtin()).with_main(main);
    let setup = SectionCheck::from_result(main, router.setup());
    let links = router
        .config()
        .sections()
        .filter(|section| section.name() != main)
        .filter(|section| section.contains("driver") || section.contains("server"))
        .map(|section| SectionCheck::from_result(section.name(), router.check_stack(section)))
        .collect();
    CheckReport { setup, links }
}
