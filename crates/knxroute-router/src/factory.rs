//! Named constructors for drivers, servers and filters.
//!
//! Configuration sections name a type (`driver = "dummy"`); the router looks
//! it up here. Binaries register whatever link implementations they carry
//! on top of [`Factories::builtin`].

use std::collections::BTreeMap;
use std::sync::Arc;

use knxroute_link::{DummyDriver, Filter, Link, LinkError, LogFilter, PassFilter};

use crate::config::Section;
use crate::handle::RouterHandle;

pub type DriverCtor = dyn Fn(&Section) -> Result<Arc<dyn Link>, LinkError> + Send + Sync;
pub type ServerCtor =
    dyn Fn(&Section, &RouterHandle) -> Result<Arc<dyn Link>, LinkError> + Send + Sync;
pub type FilterCtor = dyn Fn(&Section) -> Result<Arc<dyn Filter>, LinkError> + Send + Sync;

/// Constructors of one kind, by type name.
pub struct Factory<F: ?Sized> {
    entries: BTreeMap<String, Box<F>>,
}

impl<F: ?Sized> Default for Factory<F> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<F: ?Sized> Factory<F> {
    /// Registers `ctor`, replacing any earlier constructor of that name.
    pub fn register(&mut self, name: impl Into<String>, ctor: Box<F>) {
        self.entries.insert(name.into(), ctor);
    }

    pub fn get(&self, name: &str) -> Option<&F> {
        self.entries.get(name).map(|ctor| &**ctor)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<F: ?Sized> std::fmt::Debug for Factory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[derive(Debug, Default)]
pub struct Factories {
    pub drivers: Factory<DriverCtor>,
    pub servers: Factory<ServerCtor>,
    pub filters: Factory<FilterCtor>,
}

impl Factories {
    /// The `dummy` driver plus the `log` and `dummy` filters.
    pub fn builtin() -> Self {
        let mut factories = Self::default();
        factories.register_driver("dummy", |section| {
            let mut driver = DummyDriver::new(section.name());
            if let Some(addr) = section
                .get_addr("addr")
                .map_err(|err| LinkError::invalid_config(section.name(), err.to_string()))?
            {
                driver = driver.with_address(addr);
            }
            Ok(Arc::new(driver) as Arc<dyn Link>)
        });
        factories.register_filter("log", |section| {
            Ok(Arc::new(LogFilter::new(section.name())) as Arc<dyn Filter>)
        });
        factories.register_filter("dummy", |section| {
            Ok(Arc::new(PassFilter::new(section.name())) as Arc<dyn Filter>)
        });
        factories
    }

    pub fn register_driver(
        &mut self,
        name: impl Into<String>,
        ctor: impl Fn(&Section) -> Result<Arc<dyn Link>, LinkError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.drivers.register(name, Box::new(ctor));
        self
    }

    pub fn register_server(
        &mut self,
        name: impl Into<String>,
        ctor: impl Fn(&Section, &RouterHandle) -> Result<Arc<dyn Link>, LinkError>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.servers.register(name, Box::new(ctor));
        self
    }

    pub fn register_filter(
        &mut self,
        name: impl Into<String>,
        ctor: impl Fn(&Section) -> Result<Arc<dyn Filter>, LinkError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.filters.register(name, Box::new(ctor));
        self
    }
}
