mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{group_frame, individual_frame, mock, router, router_with, stack, Tap, ROUTER_ADDR};
use knxroute_core::{Destination, GroupAddress, IndividualAddress, LBusmonitor, LData, MonitorPdu};
use knxroute_link::testing::MockLink;
use knxroute_link::{Filter, LinkError};
use knxroute_router::{BusmonitorObserver, Factories, LinkStack, Section};

fn started_pair(main: &str) -> (knxroute_router::Router, Arc<MockLink>, Arc<MockLink>) {
    let mut router = router(main);
    let a = mock("a");
    let b = Arc::new(MockLink::new("b").with_address(IndividualAddress::new(1, 1, 2)));
    router.register_link(stack(&a), false).unwrap();
    router.register_link(stack(&b), false).unwrap();
    router.start();
    router.run_pending();
    assert!(router.is_running());
    (router, a, b)
}

#[test]
fn group_frame_reaches_every_other_link() {
    let mut router = router("");
    let a = mock("a");
    let b = mock("b");
    let c = mock("c");
    for link in [&a, &b, &c] {
        router.register_link(stack(link), false).unwrap();
    }
    router.start();
    router.run_pending();

    a.inject(group_frame(1, 1));
    router.run_pending();

    assert_eq!(a.sent_count(), 0);
    assert_eq!(b.sent_count(), 1);
    assert_eq!(c.sent_count(), 1);
    assert_eq!(b.sent()[0].hop_count, 5);
}

#[test]
fn individual_frame_goes_only_to_owner() {
    let (mut router, a, b) = started_pair("");
    let c = mock("c");
    router.register_link(stack(&c), false).unwrap();
    router.run_pending();

    a.inject(individual_frame(1, 2));
    router.run_pending();

    assert_eq!(b.sent_count(), 1);
    assert_eq!(c.sent_count(), 0);
    assert_eq!(
        b.sent()[0].destination,
        Destination::Individual(IndividualAddress::new(1, 1, 2))
    );
}

#[test]
fn frame_to_unknown_address_is_flooded() {
    let (mut router, a, b) = started_pair("");
    a.inject(individual_frame(1, 77));
    router.run_pending();
    assert_eq!(b.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeats_are_suppressed_for_one_window() {
    let (mut router, a, b) = started_pair("");

    a.inject(individual_frame(1, 2));
    router.run_pending();
    assert_eq!(b.sent_count(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    a.inject(individual_frame(1, 2).with_repeated(true));
    router.run_pending();
    assert_eq!(b.sent_count(), 1);

    tokio::time::advance(Duration::from_millis(1000)).await;
    a.inject(individual_frame(1, 2).with_repeated(true));
    router.run_pending();
    assert_eq!(b.sent_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn repeat_window_is_configurable() {
    let (mut router, a, b) = started_pair("repeat-window-ms = 50");

    a.inject(group_frame(1, 3));
    router.run_pending();
    tokio::time::advance(Duration::from_millis(60)).await;
    a.inject(group_frame(1, 3).with_repeated(true));
    router.run_pending();

    assert_eq!(b.sent_count(), 2);
}

#[test]
fn unflagged_duplicates_pass() {
    let (mut router, a, b) = started_pair("");
    a.inject(group_frame(1, 4));
    a.inject(group_frame(1, 4));
    router.run_pending();
    assert_eq!(b.sent_count(), 2);
}

#[test]
fn unset_source_becomes_router_address() {
    let (mut router, a, b) = started_pair("");
    let mut frame = group_frame(0, 1);
    frame.source = IndividualAddress::UNSET;
    a.inject(frame);
    router.run_pending();
    assert_eq!(b.sent()[0].source, ROUTER_ADDR);
}

#[test]
fn looped_frame_is_dropped() {
    let (mut router, a, b) = started_pair("");
    let c = mock("c");
    router.register_link(stack(&c), false).unwrap();
    router.run_pending();

    // 1.1.2 lives behind b, so it cannot arrive through a.
    a.inject(group_frame(2, 1));
    router.run_pending();
    assert_eq!(c.sent_count(), 0);
    assert_eq!(b.sent_count(), 0);

    b.inject(group_frame(2, 1));
    router.run_pending();
    assert_eq!(c.sent_count(), 1);
}

#[test]
fn exhausted_hop_count_is_dropped() {
    let (mut router, a, b) = started_pair("");
    a.inject(group_frame(1, 1).with_hop_count(0));
    a.inject(group_frame(1, 1).with_hop_count(1));
    router.run_pending();
    assert_eq!(b.sent_count(), 1);
    assert_eq!(b.sent()[0].hop_count, 0);
}

#[test]
fn top_hop_count_is_bounded_without_force_broadcast() {
    let mut router = router("");
    let a = mock("a");
    let picky = Arc::new(MockLink::new("picky").accepting_groups(vec![GroupAddress::new(1, 0, 9)]));
    router.register_link(stack(&a), false).unwrap();
    router.register_link(stack(&picky), false).unwrap();
    router.start();
    router.run_pending();

    a.inject(group_frame(1, 1).with_hop_count(7));
    router.run_pending();
    assert_eq!(picky.sent_count(), 0);

    a.inject(group_frame(1, 9).with_hop_count(7));
    router.run_pending();
    assert_eq!(picky.sent()[0].hop_count, 6);
}

#[test]
fn force_broadcast_floods_top_hop_count() {
    let mut router = router("force-broadcast = true");
    let a = mock("a");
    let picky = Arc::new(MockLink::new("picky").accepting_groups(vec![GroupAddress::new(1, 0, 9)]));
    router.register_link(stack(&a), false).unwrap();
    router.register_link(stack(&picky), false).unwrap();
    router.start();
    router.run_pending();

    a.inject(group_frame(1, 1).with_hop_count(7));
    a.inject(group_frame(1, 2).with_hop_count(6));
    router.run_pending();

    let sent = picky.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].hop_count, 7);
}

#[test]
fn only_running_links_receive() {
    let mut router = router("");
    let a = mock("a");
    let late = Arc::new(MockLink::new("late").manual());
    router.register_link(stack(&a), false).unwrap();
    router.register_link(stack(&late), false).unwrap();
    router.start();
    router.run_pending();

    a.inject(group_frame(1, 1));
    router.run_pending();
    assert_eq!(late.sent_count(), 0);

    late.report(knxroute_link::LinkState::Up);
    a.inject(group_frame(1, 2));
    router.run_pending();
    assert_eq!(late.sent_count(), 1);
}

#[test]
fn staged_frames_of_unregistered_link_vanish() {
    let (mut router, a, b) = started_pair("");
    let id = router.link_ids()[0];
    assert_eq!(router.link_name(id).as_deref(), Some("a"));

    for n in 0..3 {
        a.inject(group_frame(1, n));
    }
    router.unregister_link(id).unwrap();
    router.run_pending();

    assert_eq!(b.sent_count(), 0);
    assert_eq!(router.link_count(), 1);
}

struct Rewrite;

impl Filter for Rewrite {
    fn name(&self) -> &str {
        "rewrite"
    }

    fn outbound(&self, frame: Arc<LData>) -> Option<Arc<LData>> {
        let mut frame = (*frame).clone();
        frame.payload = vec![0xAA];
        Some(Arc::new(frame))
    }
}

struct Swallow;

impl Filter for Swallow {
    fn name(&self) -> &str {
        "swallow"
    }

    fn inbound(&self, _frame: LData) -> Option<LData> {
        None
    }
}

#[test]
fn destination_filters_rewrite_outgoing_frames() {
    let mut router = router("");
    let a = mock("a");
    let b = mock("b");
    router.register_link(stack(&a), false).unwrap();
    router
        .register_link(LinkStack::new(b.clone()).with_filter(Arc::new(Rewrite)), false)
        .unwrap();
    router.start();
    router.run_pending();

    a.inject(group_frame(1, 1));
    router.run_pending();
    assert_eq!(b.sent()[0].payload, vec![0xAA]);
}

#[test]
fn origin_filters_can_drop_incoming_frames() {
    let mut router = router("");
    let a = mock("a");
    let b = mock("b");
    router
        .register_link(LinkStack::new(a.clone()).with_filter(Arc::new(Swallow)), false)
        .unwrap();
    router.register_link(stack(&b), false).unwrap();
    router.start();
    router.run_pending();

    a.inject(group_frame(1, 1));
    b.inject(group_frame(3, 1));
    router.run_pending();
    assert_eq!(b.sent_count(), 0);
    assert_eq!(a.sent_count(), 1);
}

#[test]
fn global_filters_apply_to_every_frame() {
    let mut factories = Factories::builtin();
    factories.register_filter("swallow", |_section: &Section| {
        Ok::<_, LinkError>(Arc::new(Swallow) as Arc<dyn Filter>)
    });
    let mut router = router_with("filters = [\"swallow\"]", "", factories);
    let a = mock("a");
    let b = mock("b");
    router.register_link(stack(&a), false).unwrap();
    router.register_link(stack(&b), false).unwrap();
    router.start();
    router.run_pending();

    a.inject(group_frame(1, 1));
    b.inject(group_frame(3, 1));
    router.run_pending();
    assert_eq!(a.sent_count() + b.sent_count(), 0);
}

#[test]
fn busmonitor_taps_see_medium_and_routed_frames() {
    let (mut router, a, _b) = started_pair("");
    let plain = Arc::new(Tap::default());
    let verbose = Arc::new(Tap::default());
    assert!(router.register_busmonitor(plain.clone()));
    assert!(router.register_vbusmonitor(verbose.clone()));

    a.context()
        .unwrap()
        .recv_l_busmonitor(LBusmonitor::raw([0xBC, 0x11]));
    a.inject(group_frame(1, 1));
    router.run_pending();

    assert_eq!(plain.seen().len(), 1);
    let seen = verbose.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().any(|record| matches!(record.pdu, MonitorPdu::Data(_))));

    let plain: Arc<dyn BusmonitorObserver> = plain;
    assert!(router.deregister_busmonitor(&plain));
    assert!(!router.deregister_busmonitor(&plain));
}

#[test]
fn congested_link_holds_back_the_queue() {
    let (mut router, a, b) = started_pair("");
    let ids = router.link_ids();
    b.set_send_more(false);
    assert!(!router.all_send_more());
    assert!(router.has_send_more(ids[0]));
    assert!(!router.has_send_more(ids[1]));

    a.inject(group_frame(1, 1));
    a.inject(group_frame(1, 2));
    router.run_pending();
    assert_eq!(b.sent_count(), 0);

    b.set_send_more(true);
    b.context().unwrap().send_next();
    router.run_pending();

    let sent = b.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].destination, Destination::Group(GroupAddress::new(1, 0, 1)));
    assert_eq!(sent[1].destination, Destination::Group(GroupAddress::new(1, 0, 2)));
}

#[test]
fn full_intake_pushes_back_on_links() {
    let (mut router, a, b) = started_pair("queue-high-water = 2");
    b.set_send_more(false);
    let ctx = a.context().unwrap();

    a.inject(group_frame(1, 1));
    assert!(ctx.low_send_more());
    a.inject(group_frame(1, 2));
    assert!(!ctx.low_send_more());
    router.run_pending();
    assert!(!ctx.low_send_more());

    b.set_send_more(true);
    b.context().unwrap().send_next();
    router.run_pending();

    assert!(ctx.low_send_more());
    assert_eq!(b.sent_count(), 2);
    assert!(a.send_next_calls() >= 1);
}

#[test]
fn intake_refuses_frames_past_twice_high_water() {
    let (mut router, a, b) = started_pair("queue-high-water = 2");
    b.set_send_more(false);

    for n in 1..=5 {
        a.inject(group_frame(1, n));
    }
    router.run_pending();
    assert_eq!(b.sent_count(), 0);

    b.set_send_more(true);
    b.context().unwrap().send_next();
    router.run_pending();

    let sent = b.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[3].destination, Destination::Group(GroupAddress::new(1, 0, 4)));
}

#[test]
fn verbose_taps_alone_still_see_medium_records() {
    let (mut router, a, _b) = started_pair("");
    let verbose = Arc::new(Tap::default());
    assert!(router.register_vbusmonitor(verbose.clone()));

    a.context()
        .unwrap()
        .recv_l_busmonitor(LBusmonitor::raw([0xBC, 0x11]));
    router.run_pending();

    let seen = verbose.seen();
    assert_eq!(seen.len(), 1);
    assert!(matches!(seen[0].pdu, MonitorPdu::Raw(_)));
}
