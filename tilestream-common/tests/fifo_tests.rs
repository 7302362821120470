// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the per-cube streaming FIFO.

mod common;

use common::*;
use tilestream_common::memory::{Segment, SEGMENT_0_VA};
use tilestream_common::{AssetError, AssetFifo, AssetGroupInfo, CubeFifos, CubeId, SliceBus};

const HEADER_OFFSET: usize = 0x40;

/// A bus with one group of `data` at segment 0, described at `GROUP_VA`.
fn with_group<R>(data: &[u8], f: impl FnOnce(&SliceBus<'_>, &AssetGroupInfo) -> R) -> R {
    let mut ram = user_ram();
    put_descriptor(&mut ram, GROUP_VA, SEGMENT_0_VA + HEADER_OFFSET as u32);
    let mut volume = Vec::new();
    place(&mut volume, HEADER_OFFSET, &group_image(1, 1, data));

    let mut bus = SliceBus::new(&mut ram);
    bus.add_volume(1, &volume).unwrap();
    assert!(bus.map_segment(Segment::Zero, 1));
    let group = AssetGroupInfo::from_user_pointer(&bus, GROUP_VA).unwrap();
    f(&bus, &group)
}

#[test]
fn test_fetch_example_sequence() {
    let data = pattern(100, 7);
    with_group(&data, |bus, group| {
        let mut fifo = AssetFifo::<64>::new();
        let (mut producer, mut consumer) = fifo.split();

        // Leave 40 bytes free
        assert_eq!(producer.push_slice(&[0xEE; 24]), 24);
        assert_eq!(producer.write_available(), 40);

        assert_eq!(producer.fetch_from_group(bus, group, 0), Ok(40));
        assert_eq!(producer.write_available(), 0);

        let mut sink = [0u8; 64];
        assert_eq!(consumer.read(&mut sink), 64);
        assert_eq!(&sink[..24], &[0xEE; 24]);
        assert_eq!(&sink[24..], &data[..40]);

        assert_eq!(producer.fetch_from_group(bus, group, 40), Ok(60));
        assert_eq!(producer.fetch_from_group(bus, group, 100), Ok(0));

        let mut rest = [0u8; 60];
        assert_eq!(consumer.read(&mut rest), 60);
        assert_eq!(&rest[..], &data[40..]);
    });
}

#[test]
fn test_empty_fifo_offers_full_capacity() {
    let mut fifo = AssetFifo::<64>::new();
    let (producer, consumer) = fifo.split();
    assert_eq!(producer.write_available(), 64);
    assert_eq!(consumer.read_available(), 0);
}

#[test]
fn test_offset_past_end_leaves_fifo_untouched() {
    let data = pattern(30, 3);
    with_group(&data, |bus, group| {
        let mut fifo = AssetFifo::<16>::new();
        let (mut producer, consumer) = fifo.split();
        producer.push_slice(&[1, 2, 3]);

        assert_eq!(producer.fetch_from_group(bus, group, 30), Ok(0));
        assert_eq!(producer.fetch_from_group(bus, group, 1_000), Ok(0));
        assert_eq!(consumer.read_available(), 3);
        assert_eq!(consumer.peek(), &[1, 2, 3]);
    });
}

#[test]
fn test_zero_length_group() {
    with_group(&[], |bus, group| {
        let mut fifo = AssetFifo::<16>::new();
        let (mut producer, consumer) = fifo.split();

        assert_eq!(producer.fetch_from_group(bus, group, 0), Ok(0));
        assert_eq!(consumer.read_available(), 0);
    });
}

#[test]
fn test_full_fifo_fetches_nothing() {
    let data = pattern(30, 3);
    with_group(&data, |bus, group| {
        let mut fifo = AssetFifo::<8>::new();
        let (mut producer, _consumer) = fifo.split();

        assert_eq!(producer.fetch_from_group(bus, group, 0), Ok(8));
        assert_eq!(producer.fetch_from_group(bus, group, 8), Ok(0));
    });
}

#[test]
fn test_sequential_fetches_reconstruct_group() {
    let data = pattern(1000, 9);
    with_group(&data, |bus, group| {
        let mut fifo = AssetFifo::<64>::new();
        let (mut producer, mut consumer) = fifo.split();

        let mut offset = 0;
        let mut received = Vec::new();
        // Drain in odd-sized bites so head and tail wrap at different points
        let mut bite = [0u8; 23];
        loop {
            let moved = producer.fetch_from_group(bus, group, offset).unwrap();
            offset += moved;
            let n = consumer.read(&mut bite);
            received.extend_from_slice(&bite[..n]);
            if moved == 0 && n == 0 {
                break;
            }
        }

        assert_eq!(offset, 1000);
        assert_eq!(received, data);
    });
}

#[test]
fn test_wraparound_matches_reference() {
    let mut fifo = AssetFifo::<10>::new();
    let (mut producer, mut consumer) = fifo.split();
    let mut reference = std::collections::VecDeque::new();
    let source = pattern(500, 1);
    let mut next = 0;

    for step in 0..200usize {
        let want = (step * 7) % 13;
        let end = (next + want).min(source.len());
        let pushed = producer.push_slice(&source[next..end]);
        reference.extend(&source[next..next + pushed]);
        next += pushed;

        assert_eq!(consumer.read_available(), reference.len());
        assert!(reference.len() <= 10);

        let take = (step * 5) % 9;
        let mut out = vec![0u8; take];
        let n = consumer.read(&mut out);
        let expected: Vec<u8> = reference.drain(..n).collect();
        assert_eq!(&out[..n], &expected[..]);
    }
}

#[test]
fn test_peek_stops_at_wrap() {
    let mut fifo = AssetFifo::<8>::new();
    let (mut producer, mut consumer) = fifo.split();

    producer.push_slice(&[0; 6]);
    consumer.consume(6);
    assert_eq!(producer.push_slice(&[1, 2, 3, 4, 5]), 5);

    assert_eq!(consumer.peek(), &[1, 2]);
    consumer.consume(2);
    assert_eq!(consumer.peek(), &[3, 4, 5]);
}

#[test]
fn test_consume_is_clamped() {
    let mut fifo = AssetFifo::<8>::new();
    let (mut producer, mut consumer) = fifo.split();

    producer.push_slice(&[9, 8]);
    consumer.consume(100);
    assert_eq!(consumer.read_available(), 0);
    assert_eq!(producer.write_available(), 8);
    assert_eq!(consumer.pop(), None);
}

#[test]
fn test_failed_transmit_keeps_bytes_queued() {
    let mut fifo = AssetFifo::<16>::new();
    let (mut producer, mut consumer) = fifo.split();
    producer.push_slice(&[1, 2, 3, 4, 5, 6]);

    let failed: Result<usize, &str> = consumer.transmit(4, |_| Err("link down"));
    assert_eq!(failed, Err("link down"));
    assert_eq!(consumer.read_available(), 6);

    let mut sent = Vec::new();
    let n = consumer
        .transmit(4, |run| {
            sent.extend_from_slice(run);
            Ok::<(), ()>(())
        })
        .unwrap();
    assert_eq!(n, 4);
    assert_eq!(sent, vec![1, 2, 3, 4]);
    assert_eq!(consumer.peek(), &[5, 6]);
}

#[test]
fn test_transmit_on_empty_fifo_sends_nothing() {
    let mut fifo = AssetFifo::<8>::new();
    let (_producer, mut consumer) = fifo.split();

    let n = consumer
        .transmit(8, |_| -> Result<(), ()> { panic!("nothing to send") })
        .unwrap();
    assert_eq!(n, 0);
}

#[test]
fn test_unreadable_source_commits_nothing() {
    let mut ram = user_ram();
    put_descriptor(&mut ram, GROUP_VA, SEGMENT_0_VA + HEADER_OFFSET as u32);
    let data = pattern(100, 4);
    let mut volume = Vec::new();
    place(&mut volume, HEADER_OFFSET, &group_image(1, 1, &data));

    let mut bus = SliceBus::new(&mut ram);
    bus.add_volume(1, &volume).unwrap();
    assert!(bus.map_segment(Segment::Zero, 1));
    let group = AssetGroupInfo::from_user_pointer(&bus, GROUP_VA).unwrap();

    let mut fifo = AssetFifo::<32>::new();
    let (mut producer, consumer) = fifo.split();
    producer.push_slice(&[7; 4]);

    bus.invalidate(1);
    assert_eq!(
        producer.fetch_from_group(&bus, &group, 0),
        Err(AssetError::SourceUnreadable)
    );
    assert_eq!(consumer.read_available(), 4);
    assert_eq!(producer.write_available(), 28);
}

#[test]
fn test_cube_fifos_are_independent() {
    let mut fifos = CubeFifos::<16, 4>::new();
    let (mut producers, mut consumers) = fifos.split();
    let c1 = CubeId::new(1).unwrap();
    let c3 = CubeId::new(3).unwrap();

    producers.get(c1).unwrap().push_slice(&[1, 1]);
    producers.get(c3).unwrap().push_slice(&[3, 3, 3]);

    assert_eq!(consumers.pending_mask(), 0b1010);
    assert_eq!(consumers.get(c1).unwrap().read_available(), 2);
    consumers.get(c3).unwrap().clear();
    assert_eq!(consumers.pending_mask(), 0b0010);

    // Outside the table
    assert!(producers.get(CubeId::new(4).unwrap()).is_none());
}
