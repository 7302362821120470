// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Building the user RAM image an application would prepare before asking
//! for a load: a configuration table followed by one group descriptor per
//! entry.

use anyhow::{bail, Result};
use tilestream_common::abi::{
    round_tiles, AssetGroup, ASSET_GROUPS_PER_SLOT, ASSET_SLOTS_PER_BANK, TILES_PER_ASSET_SLOT,
};
use tilestream_common::memory::{Segment, VirtAddr, RAM_BASE, RAM_SIZE, SEGMENT_1_VA};
use tilestream_common::protocol::MAX_DATA_BLOCK_SIZE;
use tilestream_common::{AssetConfiguration, BoundSlots, ConfigTable};

use crate::pack::PackedGroup;

/// How configuration entries reach the group headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Header pointers are VAs in whichever segment the volume is mapped at.
    Virtual(Segment),
    /// Header pointers are segment-1 offsets into the volume named by `handle`.
    Remapped { handle: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct StageOptions {
    pub addressing: Addressing,
    pub slots: BoundSlots,
    pub config_va: VirtAddr,
}

/// A RAM image starting at `base_va`.
#[derive(Debug, Clone)]
pub struct Staged {
    pub base_va: VirtAddr,
    pub image: Vec<u8>,
    pub config: ConfigTable,
    /// Descriptor VA of each entry, in table order.
    pub descriptors: Vec<VirtAddr>,
    /// Slot chosen for each entry, in table order.
    pub slots: Vec<u8>,
}

impl Staged {
    /// The image split into `WriteRam`-sized pieces.
    pub fn chunks(&self) -> impl Iterator<Item = (VirtAddr, &[u8])> + '_ {
        self.image
            .chunks(MAX_DATA_BLOCK_SIZE)
            .enumerate()
            .map(|(i, chunk)| (self.base_va + (i * MAX_DATA_BLOCK_SIZE) as u32, chunk))
    }
}

/// Assign slots first-fit over the bound slots, in order.
fn assign_slots(groups: &[PackedGroup], bound: BoundSlots) -> Result<Vec<u8>> {
    let mut tiles = [0u32; ASSET_SLOTS_PER_BANK];
    let mut counts = [0usize; ASSET_SLOTS_PER_BANK];
    let mut slot = 0usize;
    let mut assigned = Vec::with_capacity(groups.len());

    for group in groups {
        let need = round_tiles(u32::from(group.header.num_tiles));
        loop {
            if slot >= ASSET_SLOTS_PER_BANK {
                bail!(
                    "group {} ({} tiles) does not fit in the bound slots",
                    group.header.ordinal,
                    need
                );
            }
            if bound.is_bound(slot)
                && counts[slot] < ASSET_GROUPS_PER_SLOT
                && tiles[slot] + need <= TILES_PER_ASSET_SLOT
            {
                break;
            }
            slot += 1;
        }
        tiles[slot] += need;
        counts[slot] += 1;
        assigned.push(slot as u8);
    }

    Ok(assigned)
}

/// Lay out a configuration table for `groups` and their descriptors.
pub fn stage(groups: &[PackedGroup], opts: &StageOptions) -> Result<Staged> {
    if opts.config_va % AssetGroup::ALIGN != 0 {
        bail!("configuration address 0x{:08x} is not aligned", opts.config_va);
    }

    let slots = assign_slots(groups, opts.slots)?;
    let table_size = groups.len() * AssetConfiguration::SIZE;
    let descriptors_at = table_size.next_multiple_of(AssetGroup::ALIGN as usize);
    let image_size = descriptors_at + groups.len() * AssetGroup::total_size();

    let ram_end = (RAM_BASE + RAM_SIZE) as usize;
    if opts.config_va < RAM_BASE || opts.config_va as usize + image_size > ram_end {
        bail!(
            "{} bytes at 0x{:08x} do not fit in user RAM",
            image_size,
            opts.config_va
        );
    }

    let mut image = vec![0u8; image_size];
    let mut descriptors = Vec::with_capacity(groups.len());

    for (index, (group, &slot)) in groups.iter().zip(&slots).enumerate() {
        let desc_offset = descriptors_at + index * AssetGroup::total_size();
        let desc_va = opts.config_va + desc_offset as u32;

        let (p_hdr, volume) = match opts.addressing {
            Addressing::Virtual(segment) => (segment.base() + group.header_offset, 0),
            Addressing::Remapped { handle } => (SEGMENT_1_VA + group.header_offset, handle),
        };
        image[desc_offset..desc_offset + AssetGroup::SIZE]
            .copy_from_slice(&AssetGroup { p_hdr }.to_bytes());

        let entry = AssetConfiguration {
            p_group: desc_va,
            volume,
            data_size: group.header.data_size,
            num_tiles: group.header.num_tiles,
            ordinal: group.header.ordinal,
            slot,
        };
        let at = index * AssetConfiguration::SIZE;
        image[at..at + AssetConfiguration::SIZE].copy_from_slice(&entry.to_bytes());

        descriptors.push(desc_va);
    }

    Ok(Staged {
        base_va: opts.config_va,
        image,
        config: ConfigTable::new(opts.config_va, groups.len() as u32),
        descriptors,
        slots,
    })
}
