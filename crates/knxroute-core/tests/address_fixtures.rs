use knxroute_core::{
    read_group_addr, readaddr, readaddrblock, Destination, GroupAddress, IndividualAddress, LData,
};

#[test]
fn individual_fixtures_match_raw_values() {
    let fixtures = [
        ("0.0.1", 0x0001),
        ("1.1.10", 0x110A),
        ("15.15.255", 0xFFFF),
        ("3.2.1", 0x3201),
    ];
    for (text, raw) in fixtures {
        assert_eq!(readaddr(text).unwrap().raw(), raw, "{text}");
        assert_eq!(IndividualAddress::from_raw(raw).to_string(), text);
    }
}

#[test]
fn group_fixtures_match_raw_values() {
    let fixtures = [("0/0/1", 0x0001), ("1/2/3", 0x0A03), ("31/7/255", 0xFFFF)];
    for (text, raw) in fixtures {
        assert_eq!(read_group_addr(text).unwrap().raw(), raw, "{text}");
        assert_eq!(GroupAddress::from_raw(raw).to_string(), text);
    }
}

#[test]
fn client_block_fixture() {
    let (start, len) = readaddrblock("1.1.200:56").unwrap();
    assert_eq!(start, IndividualAddress::new(1, 1, 200));
    assert_eq!(len, 56);
    assert_eq!(start.checked_add(len - 1), Some(IndividualAddress::new(1, 1, 255)));
}

#[test]
fn from_str_uses_the_same_parsers() {
    let ind: IndividualAddress = "1.2.3".parse().unwrap();
    let grp: GroupAddress = "1/2/3".parse().unwrap();
    assert_eq!(ind, IndividualAddress::new(1, 2, 3));
    assert_eq!(grp, GroupAddress::new(1, 2, 3));
}

#[cfg(feature = "serde")]
#[test]
fn frame_serializes_with_destination_kind() {
    let frame = LData::group(
        IndividualAddress::new(1, 1, 1),
        GroupAddress::new(0, 0, 1),
        [0x00, 0x81],
    );
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["destination"]["Group"], 1);
    assert_eq!(json["hop_count"], 6);
    let back: LData = serde_json::from_value(json).unwrap();
    assert_eq!(back, frame);
    assert!(matches!(back.destination, Destination::Group(_)));
}
