// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for asset group resolution through both entry points.

mod common;

use common::*;
use tilestream_common::group::{loaded_base_addr, record_base_addr};
use tilestream_common::memory::{Segment, RAM_BASE, SEGMENT_0_VA, SEGMENT_1_VA, SEGMENT_SIZE};
use tilestream_common::{
    AssetError, AssetGroupInfo, CubeId, Fault, GroupAddress, SliceBus, VolumeStore,
};

const HEADER_OFFSET: usize = 0x100;

/// Volume 1 at segment 0 holding one group, volume 2 unmapped holding another.
struct World {
    ram: Vec<u8>,
    vol1: Vec<u8>,
    vol2: Vec<u8>,
    data1: Vec<u8>,
    data2: Vec<u8>,
}

impl World {
    fn new() -> Self {
        let data1 = pattern(200, 1);
        let data2 = pattern(150, 2);
        let mut vol1 = Vec::new();
        let mut vol2 = Vec::new();
        place(&mut vol1, HEADER_OFFSET, &group_image(11, 40, &data1));
        place(&mut vol2, HEADER_OFFSET, &group_image(22, 20, &data2));
        Self {
            ram: user_ram(),
            vol1,
            vol2,
            data1,
            data2,
        }
    }

    fn bus(&mut self) -> SliceBus<'_> {
        let mut bus = SliceBus::new(&mut self.ram);
        bus.add_volume(1, &self.vol1).unwrap();
        bus.add_volume(2, &self.vol2).unwrap();
        assert!(bus.map_segment(Segment::Zero, 1));
        bus
    }
}

fn read_all(bus: &SliceBus<'_>, group: &AssetGroupInfo) -> Vec<u8> {
    let mut out = vec![0u8; group.data_size as usize];
    group.read_data(bus, 0, &mut out).unwrap();
    out
}

#[test]
fn test_user_pointer_resolves_virtual() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_0_VA + HEADER_OFFSET as u32);
    let data1 = world.data1.clone();
    let bus = world.bus();

    let group = AssetGroupInfo::from_user_pointer(&bus, GROUP_VA).unwrap();

    assert_eq!(group.va, GROUP_VA);
    assert_eq!(group.data_size, 200);
    assert_eq!(group.num_tiles, 40);
    assert_eq!(group.ordinal, 11);
    assert!(!group.address.is_remapped());
    assert_eq!(group.address.volume(), bus.volume(1).unwrap());
    assert_eq!(read_all(&bus, &group), data1);
}

#[test]
fn test_user_pointer_misaligned() {
    let mut world = World::new();
    let bus = world.bus();

    let result = AssetGroupInfo::from_user_pointer(&bus, GROUP_VA + 2);
    assert_eq!(result, Err(Fault::AddressAlignment));
}

#[test]
fn test_user_pointer_outside_ram() {
    let mut world = World::new();
    let bus = world.bus();

    assert_eq!(
        AssetGroupInfo::from_user_pointer(&bus, 0x2000_0000),
        Err(Fault::InvalidAddress)
    );
    // Readable flash is still not RAM
    assert_eq!(
        AssetGroupInfo::from_user_pointer(&bus, SEGMENT_0_VA),
        Err(Fault::InvalidAddress)
    );
}

#[test]
fn test_user_pointer_unreadable_header() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_1_VA);
    let bus = world.bus();

    assert_eq!(
        AssetGroupInfo::from_user_pointer(&bus, GROUP_VA),
        Err(Fault::InvalidAddress)
    );
}

#[test]
fn test_user_pointer_header_without_owner() {
    let mut world = World::new();
    // A header in user RAM is readable, but no volume owns it
    put_descriptor(&mut world.ram, GROUP_VA, RAM_BASE + 0x800);
    let bus = world.bus();

    assert_eq!(
        AssetGroupInfo::from_user_pointer(&bus, GROUP_VA),
        Err(Fault::InvalidParameter)
    );
}

#[test]
fn test_config_with_volume_is_remapped() {
    let mut world = World::new();
    // Volume 2 is not mapped anywhere, so a VA read could never succeed
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_1_VA + HEADER_OFFSET as u32);
    let data2 = world.data2.clone();
    let bus = world.bus();

    let cfg = entry(GROUP_VA, 2, 150, 20, 0);
    let group = AssetGroupInfo::from_configuration(&bus, &cfg).unwrap();

    let volume = bus.volume(2).unwrap();
    assert_eq!(
        group.address,
        GroupAddress::Remapped {
            volume,
            header_offset: HEADER_OFFSET as u32
        }
    );
    assert_eq!(read_all(&bus, &group), data2);
}

#[test]
fn test_config_without_volume_reads_through_mapping() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_1_VA + HEADER_OFFSET as u32);
    let data2 = world.data2.clone();
    let mut bus = world.bus();
    assert!(bus.map_segment(Segment::One, 2));

    let cfg = entry(GROUP_VA, 0, 150, 20, 0);
    let group = AssetGroupInfo::from_configuration(&bus, &cfg).unwrap();

    assert_eq!(
        group.address,
        GroupAddress::Virtual {
            header_va: SEGMENT_1_VA + HEADER_OFFSET as u32,
            owner: bus.volume(2).unwrap()
        }
    );
    assert_eq!(read_all(&bus, &group), data2);

    // Once segment 1 is gone the virtual path has nothing to read
    bus.unmap_segment(Segment::One);
    let mut byte = [0u8; 1];
    assert!(group.read_data(&bus, 0, &mut byte).is_err());
}

#[test]
fn test_config_without_volume_unowned_header() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_1_VA + HEADER_OFFSET as u32);
    let bus = world.bus();

    let cfg = entry(GROUP_VA, 0, 150, 20, 0);
    assert_eq!(
        AssetGroupInfo::from_configuration(&bus, &cfg),
        Err(AssetError::BadHeaderAddress)
    );
}

#[test]
fn test_config_sizes_come_from_configuration() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_0_VA + HEADER_OFFSET as u32);
    let bus = world.bus();

    let mut cfg = entry(GROUP_VA, 0, 64, 3, 0);
    cfg.ordinal = 99;
    let group = AssetGroupInfo::from_configuration(&bus, &cfg).unwrap();

    assert_eq!(group.data_size, 64);
    assert_eq!(group.num_tiles, 3);
    assert_eq!(group.ordinal, 99);
}

#[test]
fn test_config_header_outside_segment_one() {
    let mut world = World::new();
    let bus_header = |ram: &mut Vec<u8>, va: u32| put_descriptor(ram, GROUP_VA, va);

    bus_header(&mut world.ram, SEGMENT_0_VA + HEADER_OFFSET as u32);
    let bus = world.bus();
    let cfg = entry(GROUP_VA, 2, 150, 20, 0);
    assert_eq!(
        AssetGroupInfo::from_configuration(&bus, &cfg),
        Err(AssetError::HeaderNotInSegment)
    );
    drop(bus);

    // The last position that still leaves room for a header
    bus_header(&mut world.ram, SEGMENT_1_VA + SEGMENT_SIZE - 25);
    let bus = world.bus();
    assert!(AssetGroupInfo::from_configuration(&bus, &cfg).is_ok());
    drop(bus);

    bus_header(&mut world.ram, SEGMENT_1_VA + SEGMENT_SIZE - 24);
    let bus = world.bus();
    assert_eq!(
        AssetGroupInfo::from_configuration(&bus, &cfg),
        Err(AssetError::HeaderNotInSegment)
    );
}

#[test]
fn test_config_volume_revalidated_at_resolution() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_1_VA + HEADER_OFFSET as u32);
    let mut bus = world.bus();
    let cfg = entry(GROUP_VA, 2, 150, 20, 0);
    assert!(AssetGroupInfo::from_configuration(&bus, &cfg).is_ok());

    bus.invalidate(2);
    assert_eq!(
        AssetGroupInfo::from_configuration(&bus, &cfg),
        Err(AssetError::BadVolumeHandle)
    );
}

#[test]
fn test_config_unreadable_descriptor() {
    let mut world = World::new();
    let bus = world.bus();

    let cfg = entry(0x0900_0000, 0, 150, 20, 0);
    assert_eq!(
        AssetGroupInfo::from_configuration(&bus, &cfg),
        Err(AssetError::BadGroupPointer)
    );
}

#[test]
fn test_copy_crc_matches_header_for_both_schemes() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_1_VA + HEADER_OFFSET as u32);
    let expected = CRC32.checksum(&world.data2).to_le_bytes();
    let mut bus = world.bus();
    assert!(bus.map_segment(Segment::One, 2));

    for handle in [0, 2] {
        let group = AssetGroupInfo::from_configuration(&bus, &entry(GROUP_VA, handle, 150, 20, 0))
            .unwrap();
        let mut crc = [0xAAu8; 16];
        group.copy_crc(&bus, &mut crc).unwrap();
        assert_eq!(&crc[..4], &expected);
        assert!(crc[4..].iter().all(|&b| b == 0));
    }
}

#[test]
fn test_base_address_record() {
    let mut world = World::new();
    put_descriptor(&mut world.ram, GROUP_VA, SEGMENT_0_VA + HEADER_OFFSET as u32);
    let mut bus = world.bus();
    let cube = CubeId::new(5).unwrap();

    assert_eq!(loaded_base_addr(&bus, GROUP_VA, cube), Some(0));
    record_base_addr(&mut bus, GROUP_VA, cube, 0x1230).unwrap();
    assert_eq!(loaded_base_addr(&bus, GROUP_VA, cube), Some(0x1230));
    assert_eq!(loaded_base_addr(&bus, GROUP_VA, CubeId::new(4).unwrap()), Some(0));

    // Descriptor outside user RAM
    assert!(record_base_addr(&mut bus, SEGMENT_0_VA, cube, 1).is_err());
}
