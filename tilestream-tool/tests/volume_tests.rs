// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the volume region image and its UF2 encoding.

use tilestream_common::abi::{VolumeRecord, MAX_VOLUMES};
use tilestream_common::protocol::{FLASH_BASE, FLASH_SECTOR_SIZE, VOLUME_AREA_ADDR};
use tilestream_tool::{uf2, volume};

#[test]
fn test_payloads_follow_directory_on_sector_boundaries() {
    let image = volume::build(&[(7, vec![1u8; 100]), (9, vec![2u8; 5000])]).unwrap();

    let first = image.records[0];
    let second = image.records[1];
    assert_eq!(FLASH_BASE + first.payload_offset, VOLUME_AREA_ADDR);
    assert_eq!(
        FLASH_BASE + second.payload_offset,
        VOLUME_AREA_ADDR + FLASH_SECTOR_SIZE
    );
    // directory + 1 sector + 2 sectors
    assert_eq!(image.bytes.len(), 4 * FLASH_SECTOR_SIZE as usize);
}

#[test]
fn test_directory_reads_back() {
    let image = volume::build(&[(7, vec![1u8; 100]), (9, vec![2u8; 50])]).unwrap();
    let records = volume::read_directory(&image.bytes);

    assert_eq!(records, image.records);
    let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
    for record in &records {
        let payload = volume::payload(&image.bytes, record).unwrap();
        assert_eq!(payload.len(), record.payload_size as usize);
        assert_eq!(crc.checksum(payload), record.payload_crc);
    }
}

#[test]
fn test_unused_directory_slots_stay_erased() {
    let image = volume::build(&[(3, vec![0u8; 8])]).unwrap();
    let unused = &image.bytes[VolumeRecord::SIZE..MAX_VOLUMES * VolumeRecord::SIZE];
    assert!(unused.iter().all(|&b| b == 0xFF));
}

#[test]
fn test_bad_volume_sets_are_refused() {
    assert!(volume::build(&[(0, vec![1])]).is_err());
    assert!(volume::build(&[(4, vec![1]), (4, vec![2])]).is_err());

    let too_many: Vec<_> = (1..=MAX_VOLUMES as u32 + 1).map(|h| (h, vec![0u8])).collect();
    assert!(volume::build(&too_many).is_err());

    // Larger than the region once the directory sector is counted
    assert!(volume::build(&[(1, vec![0u8; 0x0010_0000])]).is_err());
}

#[test]
fn test_uf2_blocks() {
    let data: Vec<u8> = (0..600).map(|i| i as u8).collect();
    let out = uf2::encode(&data, 0x1010_0000, uf2::RP2040_FAMILY_ID);

    assert_eq!(out.len(), 3 * uf2::BLOCK_SIZE);
    for (i, block) in out.chunks(uf2::BLOCK_SIZE).enumerate() {
        let word = |at: usize| u32::from_le_bytes(block[at..at + 4].try_into().unwrap());
        assert_eq!(word(0), 0x0A32_4655);
        assert_eq!(word(4), 0x9E5D_5157);
        assert_eq!(word(12), 0x1010_0000 + 256 * i as u32);
        assert_eq!(word(20), i as u32);
        assert_eq!(word(24), 3);
        assert_eq!(word(28), uf2::RP2040_FAMILY_ID);
        assert_eq!(word(508), 0x0AB1_6F30);
    }

    // Last block carries 88 bytes, zero-padded
    let last = &out[2 * uf2::BLOCK_SIZE + 32..2 * uf2::BLOCK_SIZE + 32 + 256];
    assert_eq!(&last[..88], &data[512..]);
    assert!(last[88..].iter().all(|&b| b == 0));
}
