// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Up-front validation of an asset configuration.
//!
//! This pass only catches the mistakes application developers commonly make,
//! and reports them early and loudly. It cannot protect the system: the table
//! lives in user RAM and may change as soon as we return. The resolver in
//! [`crate::group`] re-checks everything it relies on.

use crate::abi::{
    round_tiles, AssetConfiguration, AssetGroup, ASSET_GROUPS_PER_SLOT, ASSET_SLOTS_PER_BANK,
    MAX_CONFIG_ENTRIES, TILES_PER_ASSET_SLOT,
};
use crate::error::AssetError;
use crate::memory::{snapshot_ram, AssetBus, Translator, VirtAddr};

/// Set of asset slots currently bound to the running application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BoundSlots(u8);

impl BoundSlots {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self((1 << ASSET_SLOTS_PER_BANK) - 1);

    pub const fn from_mask(mask: u8) -> Self {
        Self(mask & Self::ALL.0)
    }

    pub const fn with(self, slot: usize) -> Self {
        if slot < ASSET_SLOTS_PER_BANK {
            Self(self.0 | (1 << slot))
        } else {
            self
        }
    }

    pub const fn is_bound(self, slot: usize) -> bool {
        slot < ASSET_SLOTS_PER_BANK && self.0 & (1 << slot) != 0
    }

    pub const fn mask(self) -> u8 {
        self.0
    }
}

/// An asset configuration table in user RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigTable {
    pub va: VirtAddr,
    pub count: u32,
}

impl ConfigTable {
    pub const fn new(va: VirtAddr, count: u32) -> Self {
        Self { va, count }
    }

    /// Snapshot entry `index`. Every call reads user RAM afresh, so two calls
    /// for the same index may disagree.
    pub fn entry<T: Translator + ?Sized>(
        &self,
        bus: &T,
        index: u32,
    ) -> Result<AssetConfiguration, AssetError> {
        if index >= self.count {
            return Err(AssetError::BadConfigPointer);
        }
        let va = (AssetConfiguration::SIZE as u32)
            .checked_mul(index)
            .and_then(|off| self.va.checked_add(off))
            .ok_or(AssetError::BadConfigPointer)?;
        let bytes = snapshot_ram::<{ AssetConfiguration::SIZE }, _>(bus, va).map_err(|_| {
            diag!("ASSET: Bad configuration pointer 0x{:08x}", va);
            AssetError::BadConfigPointer
        })?;
        Ok(AssetConfiguration::from_bytes(&bytes))
    }
}

/// Per-slot totals accumulated over one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotUsage {
    pub groups: [u8; ASSET_SLOTS_PER_BANK],
    pub tiles: [u16; ASSET_SLOTS_PER_BANK],
}

impl SlotUsage {
    /// Account for one entry, refusing anything over capacity.
    fn claim(&mut self, slot: usize, rounded_tiles: u32) -> Result<(), AssetError> {
        if self.groups[slot] as usize >= ASSET_GROUPS_PER_SLOT {
            diag!("ASSET: Bad configuration, too many groups in slot {}", slot);
            return Err(AssetError::TooManyGroups);
        }

        if u32::from(self.tiles[slot]) + rounded_tiles > TILES_PER_ASSET_SLOT {
            diag!("ASSET: Bad configuration, too many tiles in slot {}", slot);
            return Err(AssetError::TooManyTiles);
        }

        self.groups[slot] += 1;
        // Fits: bounded by TILES_PER_ASSET_SLOT above.
        self.tiles[slot] += rounded_tiles as u16;
        Ok(())
    }
}

/// Validate a configuration table against slot capacity and volume validity.
///
/// Returns the per-slot totals the configuration would occupy.
pub fn validate_config<B: AssetBus + ?Sized>(
    bus: &B,
    slots: BoundSlots,
    config: ConfigTable,
) -> Result<SlotUsage, AssetError> {
    // Too large to possibly work?
    if config.count as usize > MAX_CONFIG_ENTRIES {
        diag!("ASSET: Configuration with {} entries is too large", config.count);
        return Err(AssetError::ConfigTooLarge);
    }

    let mut usage = SlotUsage::default();

    for index in 0..config.count {
        let entry = config.entry(bus, index)?;
        let num_tiles = round_tiles(u32::from(entry.num_tiles));
        let slot = entry.slot as usize;

        if entry.volume != 0 && bus.volume(entry.volume).is_none() {
            diag!("ASSET: Bad volume handle 0x{:08x} in configuration", entry.volume);
            return Err(AssetError::BadVolumeHandle);
        }

        if bus.map_ram(entry.p_group, AssetGroup::SIZE).is_err() {
            diag!("ASSET: Bad group pointer 0x{:08x} in configuration", entry.p_group);
            return Err(AssetError::BadGroupPointer);
        }

        if !slots.is_bound(slot) {
            diag!("ASSET: Bad slot number {} in configuration", slot);
            return Err(AssetError::BadSlot);
        }

        usage.claim(slot, num_tiles)?;
    }

    Ok(usage)
}
