#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use knxroute_core::{GroupAddress, IndividualAddress, LBusmonitor, LData};
use knxroute_link::testing::MockLink;
use knxroute_router::{BusmonitorObserver, Factories, IniData, LinkStack, Router};

pub const ROUTER_ADDR: IndividualAddress = IndividualAddress::new(1, 1, 250);

/// A router set up from `main`, the body of the `[main]` section.
pub fn router(main: &str) -> Router {
    router_with(main, "", Factories::builtin())
}

pub fn router_with(main: &str, rest: &str, factories: Factories) -> Router {
    let text = format!("[main]\naddr = \"1.1.250\"\n{main}\n{rest}");
    let config = IniData::parse(&text).expect("test config parses");
    let mut router = Router::new(config, factories);
    router.setup().expect("test config sets up");
    router
}

pub fn mock(name: &str) -> Arc<MockLink> {
    Arc::new(MockLink::new(name))
}

pub fn stack(link: &Arc<MockLink>) -> LinkStack {
    LinkStack::new(link.clone())
}

pub fn group_frame(source: u8, group: u8) -> LData {
    LData::group(
        IndividualAddress::new(1, 1, source),
        GroupAddress::new(1, 0, group),
        [0x00, 0x81],
    )
}

pub fn individual_frame(source: u8, dest: u8) -> LData {
    LData::individual(
        IndividualAddress::new(1, 1, source),
        IndividualAddress::new(1, 1, dest),
        [0x43, 0x00],
    )
}

/// Busmonitor tap that keeps whatever it sees.
#[derive(Default)]
pub struct Tap {
    seen: Mutex<Vec<LBusmonitor>>,
}

impl Tap {
    pub fn seen(&self) -> Vec<LBusmonitor> {
        self.seen.lock().unwrap().clone()
    }
}

impl BusmonitorObserver for Tap {
    fn send_l_busmonitor(&self, frame: &LBusmonitor) {
        self.seen.lock().unwrap().push(frame.clone());
    }
}
