// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! UF2 encoding for drag-and-drop flashing through the RP2040 boot ROM.
//!
//! Every block carries one flash page. The boot ROM refuses blocks without
//! the family ID flag, so it is always set.

use tilestream_common::protocol::FLASH_PAGE_SIZE;

pub const RP2040_FAMILY_ID: u32 = 0xE48B_FF56;
pub const BLOCK_SIZE: usize = 512;

const MAGIC_START0: u32 = 0x0A32_4655;
const MAGIC_START1: u32 = 0x9E5D_5157;
const MAGIC_END: u32 = 0x0AB1_6F30;
const FLAG_FAMILY_ID_PRESENT: u32 = 0x0000_2000;

const PAGE: usize = FLASH_PAGE_SIZE as usize;
const DATA_OFFSET: usize = 32;
const MAGIC_END_OFFSET: usize = BLOCK_SIZE - 4;

fn put_u32(block: &mut [u8; BLOCK_SIZE], at: usize, value: u32) {
    block[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Wrap `data` into UF2 blocks targeting flash from `base_address`.
///
/// The last page is zero-padded.
pub fn encode(data: &[u8], base_address: u32, family_id: u32) -> Vec<u8> {
    let num_blocks = data.len().div_ceil(PAGE) as u32;

    data.chunks(PAGE)
        .zip(0u32..)
        .flat_map(|(page, index)| {
            let mut block = [0u8; BLOCK_SIZE];
            put_u32(&mut block, 0, MAGIC_START0);
            put_u32(&mut block, 4, MAGIC_START1);
            put_u32(&mut block, 8, FLAG_FAMILY_ID_PRESENT);
            put_u32(&mut block, 12, base_address + index * PAGE as u32);
            put_u32(&mut block, 16, PAGE as u32);
            put_u32(&mut block, 20, index);
            put_u32(&mut block, 24, num_blocks);
            put_u32(&mut block, 28, family_id);
            block[DATA_OFFSET..DATA_OFFSET + page.len()].copy_from_slice(page);
            put_u32(&mut block, MAGIC_END_OFFSET, MAGIC_END);
            block
        })
        .collect()
}
