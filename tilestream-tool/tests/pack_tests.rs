// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for payload packing and inspection.

use tilestream_common::abi::ASSET_GROUP_SIZE_UNIT;
use tilestream_common::AssetGroupHeader;
use tilestream_tool::pack::{inspect, pack_groups, GroupSpec};

fn spec(len: usize, num_tiles: u16, ordinal: u16) -> GroupSpec {
    GroupSpec {
        data: (0..len).map(|i| (i * 7 + ordinal as usize) as u8).collect(),
        num_tiles,
        ordinal,
    }
}

#[test]
fn test_groups_start_on_size_unit() {
    let packed = pack_groups(&[spec(10, 1, 0), spec(33, 2, 1), spec(0, 0, 2)]).unwrap();

    let offsets: Vec<u32> = packed.groups.iter().map(|g| g.header_offset).collect();
    // 24 + 10 = 34 -> 48; 48 + 24 + 33 = 105 -> 112
    assert_eq!(offsets, vec![0, 48, 112]);
    assert!(offsets.iter().all(|o| o % ASSET_GROUP_SIZE_UNIT == 0));
    assert_eq!(packed.payload.len(), 112 + AssetGroupHeader::SIZE);
}

#[test]
fn test_padding_is_erased_flash() {
    let packed = pack_groups(&[spec(10, 1, 0), spec(4, 1, 1)]).unwrap();
    assert!(packed.payload[34..48].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_header_carries_data_crc() {
    let packed = pack_groups(&[spec(100, 3, 9)]).unwrap();
    let group = packed.groups[0];
    let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(group.data(&packed.payload));

    assert_eq!(group.header.data_crc32(), crc);
    assert_eq!(group.header.ordinal, 9);
    assert_eq!(group.header.num_tiles, 3);
    assert_eq!(&group.header.crc[4..], &[0u8; 12]);
}

#[test]
fn test_inspect_finds_what_was_packed() {
    let packed = pack_groups(&[spec(10, 1, 0), spec(33, 2, 1), spec(0, 0, 2)]).unwrap();
    let found = inspect(&packed.payload).unwrap();

    assert_eq!(found.len(), 3);
    for (found, packed) in found.iter().zip(&packed.groups) {
        assert_eq!(found.group, *packed);
        assert!(found.crc_ok);
    }
}

#[test]
fn test_inspect_stops_at_erased_flash() {
    let mut payload = pack_groups(&[spec(40, 1, 0)]).unwrap().payload;
    payload.resize(4096, 0xFF);
    assert_eq!(inspect(&payload).unwrap().len(), 1);
}

#[test]
fn test_inspect_flags_corruption() {
    let mut packed = pack_groups(&[spec(40, 1, 0), spec(40, 1, 1)]).unwrap();
    let at = packed.groups[1].data_offset() as usize + 5;
    packed.payload[at] ^= 0x55;

    let found = inspect(&packed.payload).unwrap();
    assert!(found[0].crc_ok);
    assert!(!found[1].crc_ok);
}

#[test]
fn test_inspect_rejects_overrun() {
    let mut payload = pack_groups(&[spec(40, 1, 0)]).unwrap().payload;
    payload.truncate(payload.len() - 1);
    assert!(inspect(&payload).is_err());
}
