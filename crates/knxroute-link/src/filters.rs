use std::sync::Arc;

use knxroute_core::LData;

use crate::Filter;

/// Passes every frame unchanged.
#[derive(Debug, Clone)]
pub struct PassFilter {
    name: String,
}

impl PassFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for PassFilter {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Logs every frame passing in either direction at info level.
#[derive(Debug, Clone)]
pub struct LogFilter {
    name: String,
}

impl LogFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for LogFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn inbound(&self, frame: LData) -> Option<LData> {
        log::info!(
            "{} in: {} -> {} hops={} repeated={} {:02x?}",
            self.name,
            frame.source,
            frame.destination,
            frame.hop_count,
            frame.repeated,
            frame.payload
        );
        Some(frame)
    }

    fn outbound(&self, frame: Arc<LData>) -> Option<Arc<LData>> {
        log::info!(
            "{} out: {} -> {} hops={} {:02x?}",
            self.name,
            frame.source,
            frame.destination,
            frame.hop_count,
            frame.payload
        );
        Some(frame)
    }
}
