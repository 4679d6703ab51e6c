//! Telegram codec, address index and action queue properties

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use voltage_knx::{
    ActionQueue, AddressIndex, ComObject, Command, Dpt, GroupAddress, ObjectFlags, PendingAction,
    Telegram, TelegramValidity,
};

// ============================================================================
// Telegram codec
// ============================================================================

#[test]
fn test_cleared_telegram_wire_bytes() {
    let mut telegram = Telegram::new();
    telegram.clear();
    telegram.update_checksum();
    assert_eq!(
        telegram.as_bytes(),
        &[0xBC, 0x00, 0x00, 0x00, 0x00, 0xE1, 0x00, 0x00, 0xA2]
    );

    telegram.set_command(Command::ValueWrite);
    telegram.update_checksum();
    assert_eq!(
        telegram.as_bytes(),
        &[0xBC, 0x00, 0x00, 0x00, 0x00, 0xE1, 0x00, 0x80, 0x22]
    );
    assert_eq!(telegram.validity(), TelegramValidity::Valid);
}

fn valid_telegram() -> Telegram {
    let mut telegram = Telegram::new();
    telegram.set_source(0x1102);
    telegram.set_destination(0x0801);
    telegram.set_command(Command::ValueResponse);
    telegram.set_first_payload_byte(0x01);
    telegram.update_checksum();
    assert!(telegram.validity().is_valid());
    telegram
}

/// Apply `mutate` to a valid telegram, optionally fixing the checksum afterwards
fn broken(mutate: impl Fn(&mut Telegram), fix_checksum: bool) -> Telegram {
    let mut telegram = valid_telegram();
    mutate(&mut telegram);
    if fix_checksum {
        telegram.update_checksum();
    }
    telegram
}

#[test]
fn test_validity_first_failure_wins() {
    // control pattern + frame format
    let t = broken(|t| t.set_raw_byte(0, 0x3F), true);
    assert_eq!(t.validity(), TelegramValidity::InvalidControlField);

    // frame format + payload length
    let t = broken(
        |t| {
            t.set_raw_byte(0, 0x3C);
            t.set_payload_length(0);
        },
        true,
    );
    assert_eq!(t.validity(), TelegramValidity::UnsupportedFrameFormat);

    // payload length + command field
    let t = broken(
        |t| {
            t.set_payload_length(0);
            t.set_raw_byte(6, 0xC0);
        },
        true,
    );
    assert_eq!(t.validity(), TelegramValidity::IncorrectPayloadLength);

    // command field + checksum
    let t = broken(|t| t.set_raw_byte(6, 0x40), false);
    assert_eq!(t.validity(), TelegramValidity::InvalidCommandField);

    // checksum + unknown command (code 0b0011)
    let t = broken(|t| t.set_raw_byte(7, 0xC1), false);
    assert_eq!(t.validity(), TelegramValidity::IncorrectChecksum);

    let t = broken(|t| t.set_raw_byte(7, 0xC1), true);
    assert_eq!(t.validity(), TelegramValidity::UnknownCommand);
}

#[test]
fn test_long_payload_roundtrip() {
    let value = [0x12, 0x34, 0x56, 0x78];
    let mut telegram = Telegram::new();
    telegram.set_payload_length(5);
    telegram.set_long_payload(&value);
    telegram.update_checksum();
    assert_eq!(telegram.len(), 13);

    let mut out = [0u8; 4];
    assert_eq!(telegram.long_payload(&mut out), 4);
    assert_eq!(out, value);
    assert!(telegram.is_checksum_correct());
}

// ============================================================================
// Address index
// ============================================================================

fn objects_with_unique_addresses(count: usize) -> Vec<ComObject> {
    // Reverse order so the table has to sort
    (0..count)
        .map(|i| {
            let raw = ((count - i) * 37 + 5) as u16;
            ComObject::new(GroupAddress::from_raw(raw), Dpt::SWITCH, ObjectFlags::SENSOR)
        })
        .collect()
}

#[test]
fn test_lookup_across_list_sizes() {
    for count in [1usize, 15, 16, 17, 128] {
        let objects = objects_with_unique_addresses(count);
        let index = AddressIndex::build(&objects);
        assert_eq!(index.len(), count, "size {count}");

        for (i, object) in objects.iter().enumerate() {
            let raw = object.address().raw();
            assert_eq!(index.lookup(raw), Some(i), "size {count} address {raw:04X}");
            assert_eq!(index.lookup(raw + 1), None, "size {count} address {:04X}", raw + 1);
        }
        assert_eq!(index.lookup(0), None);
        assert_eq!(index.lookup(0xFFFF), None);
    }
}

#[test]
fn test_lookup_skips_objects_without_communication_flag() {
    let objects = vec![
        ComObject::new(GroupAddress::from_raw(0x0801), Dpt::SWITCH, ObjectFlags::READ),
        ComObject::new(GroupAddress::from_raw(0x0802), Dpt::SWITCH, ObjectFlags::SENSOR),
    ];
    let index = AddressIndex::build(&objects);
    assert_eq!(index.lookup(0x0801), None);
    assert_eq!(index.lookup(0x0802), Some(1));
}

#[test]
fn test_duplicate_address_lowest_index_wins() {
    let objects = vec![
        ComObject::new(GroupAddress::from_raw(0x0900), Dpt::SWITCH, ObjectFlags::SENSOR),
        ComObject::new(GroupAddress::from_raw(0x0801), Dpt::SWITCH, ObjectFlags::SENSOR),
        ComObject::new(GroupAddress::from_raw(0x0801), Dpt::SWITCH, ObjectFlags::LOGIC_IN),
    ];
    let index = AddressIndex::build(&objects);
    assert_eq!(index.len(), 2);
    assert_eq!(index.lookup(0x0801), Some(1));
}

// ============================================================================
// Action queue
// ============================================================================

#[test]
fn test_queue_capacity_three_evicts_oldest() {
    let mut queue = ActionQueue::new(3);
    let [a, b, c, d] = [
        PendingAction::read(0),
        PendingAction::write(1, 0x01),
        PendingAction::response(2),
        PendingAction::write_long(3, &[0xAA, 0xBB]),
    ];
    for action in [a, b, c, d] {
        queue.append(action);
    }

    assert_eq!(queue.pop(), Some(b));
    assert_eq!(queue.pop(), Some(c));
    assert_eq!(queue.pop(), Some(d));
    assert_eq!(queue.pop(), None);
    assert_eq!(queue.stats().lost, 1);
}
