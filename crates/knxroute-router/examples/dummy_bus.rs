//! Route a few frames between two in-memory links.
//!
//! Usage:
//!   RUST_LOG=debug cargo run -p knxroute-router --example dummy_bus

use std::sync::Arc;

use knxroute_core::{GroupAddress, IndividualAddress, LData};
use knxroute_link::testing::MockLink;
use knxroute_router::{Factories, IniData, LinkStack, Router};

const CONFIG: &str = r#"
[main]
name = "demo"
addr = "1.1.250"
client-addrs = "1.1.100:4"
connections = ["placeholder"]

[placeholder]
driver = "dummy"
filters = ["log"]
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut router = Router::new(IniData::parse(CONFIG)?, Factories::builtin());
    router.setup()?;

    let left = Arc::new(MockLink::new("left"));
    let right = Arc::new(MockLink::new("right").with_address(IndividualAddress::new(1, 1, 20)));
    router.register_link(LinkStack::new(left.clone()), false)?;
    router.register_link(LinkStack::new(right.clone()), false)?;

    let handle = router.handle();
    let mut status = handle.subscribe();
    let reactor = tokio::spawn(router.run());

    handle.start();
    while !status.borrow_and_update().all_running {
        status.changed().await?;
    }

    let client = handle.get_client_addr("demo-client").await?;
    println!("leased client address {client}");

    left.inject(LData::group(client, GroupAddress::new(1, 0, 1), [0x00, 0x81]));
    left.inject(LData::individual(client, IndividualAddress::new(1, 1, 20), [0x43, 0x00]));
    while right.sent_count() < 2 {
        tokio::task::yield_now().await;
    }
    for frame in right.sent() {
        println!("right received {} -> {}", frame.source, frame.destination);
    }

    handle.stop(false);
    let code = reactor.await?;
    println!("router exited with code {code}");
    Ok(())
}
