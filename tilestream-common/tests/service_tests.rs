// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the inter-service event bus.

use tilestream_common::service::{Event, EventBus, EVENT_CAPACITY};
use tilestream_common::{CubeId, Fault, LoadEvent};

fn finished(id: u8) -> Event {
    Event::Load(LoadEvent::Finished {
        cube: CubeId::new(id).unwrap(),
    })
}

#[test]
fn test_consume_removes_only_matches() {
    let bus = EventBus::new();
    bus.publish(Event::RequestLink);
    bus.publish(finished(0));
    bus.publish(Event::RequestLink);

    assert_eq!(bus.consume(|e| matches!(e, Event::RequestLink)), 2);
    assert_eq!(bus.len(), 1);
    assert_eq!(bus.consume(|e| matches!(e, Event::RequestLink)), 0);
}

#[test]
fn test_take_hands_over_in_publish_order() {
    let bus = EventBus::new();
    bus.publish(finished(3));
    bus.publish(Event::UnitAborted(Fault::InvalidAddress));
    bus.publish(finished(1));

    let mut seen = Vec::new();
    bus.take(
        |e| match *e {
            Event::Load(LoadEvent::Finished { cube }) => Some(cube.raw()),
            _ => None,
        },
        |cube| seen.push(cube),
    );

    assert_eq!(seen, vec![3, 1]);
    assert_eq!(bus.len(), 1);
    assert_eq!(
        bus.consume(|e| matches!(e, Event::UnitAborted(Fault::InvalidAddress))),
        1
    );
    assert!(bus.is_empty());
}

#[test]
fn test_full_bus_drops_and_counts() {
    let bus = EventBus::new();
    for _ in 0..EVENT_CAPACITY + 3 {
        bus.publish(Event::RequestLink);
    }

    assert_eq!(bus.len(), EVENT_CAPACITY);
    assert_eq!(bus.dropped(), 3);
}
