pub mod context;
pub mod dummy;
pub mod filters;
pub mod state;
pub mod testing;
pub mod traits;

pub use context::LinkContext;
pub use dummy::DummyDriver;
pub use filters::{LogFilter, PassFilter};
pub use state::{AtomicLinkState, LinkId, LinkState};
pub use traits::{Filter, Link, LinkError, Upstream};
