// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Asset group resolution.
//!
//! A group reaches the firmware in one of two ways, with different trust:
//!
//! - [`AssetGroupInfo::from_user_pointer`]: a descriptor pointer handed to a
//!   system call. The caller is trusted to have passed something sane, so any
//!   violation is a [`Fault`] that aborts the sandboxed unit.
//! - [`AssetGroupInfo::from_configuration`]: an entry of a configuration table
//!   in user RAM. Anything in it may be stale, forged or racing with the
//!   application, so failures are logged and returned, never faulted.

use crate::abi::{
    AssetConfiguration, AssetGroup, AssetGroupCube, AssetGroupHeader, CubeId,
    ASSET_GROUP_CRC_SIZE,
};
use crate::error::{AssetError, BusError, Fault};
use crate::memory::{
    is_aligned, snapshot_ram, snapshot_ro, AssetBus, Translator, VirtAddr, Volume, SEGMENT_1_VA,
    SEGMENT_SIZE,
};

const HEADER_SIZE: u32 = AssetGroupHeader::SIZE as u32;

/// Where a group header lives, and therefore how its data must be read.
///
/// The two variants are never interchangeable: a remapped offset is not a
/// virtual address, and a virtual address is never fed to a volume copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupAddress {
    /// Ordinary sandbox VA, read through the translator.
    Virtual { header_va: VirtAddr, owner: Volume },
    /// Offset into `volume`'s payload, as if it were mapped at segment 1.
    Remapped { volume: Volume, header_offset: u32 },
}

impl GroupAddress {
    pub fn volume(&self) -> Volume {
        match *self {
            Self::Virtual { owner, .. } => owner,
            Self::Remapped { volume, .. } => volume,
        }
    }

    pub fn is_remapped(&self) -> bool {
        matches!(self, Self::Remapped { .. })
    }

    /// Header address as the application sees it, for diagnostics.
    pub fn header_va(&self) -> VirtAddr {
        match *self {
            Self::Virtual { header_va, .. } => header_va,
            Self::Remapped { header_offset, .. } => SEGMENT_1_VA.wrapping_add(header_offset),
        }
    }

    /// Bounded read of `dest.len()` bytes at `offset` bytes past the header start.
    fn read<B: AssetBus + ?Sized>(
        &self,
        bus: &B,
        offset: u32,
        dest: &mut [u8],
    ) -> Result<(), BusError> {
        match *self {
            Self::Virtual { header_va, .. } => {
                let va = header_va.checked_add(offset).ok_or(BusError::OutOfBounds)?;
                bus.copy_ro_data(dest, va)
            }
            Self::Remapped {
                volume,
                header_offset,
            } => {
                let at = header_offset
                    .checked_add(offset)
                    .ok_or(BusError::OutOfBounds)?;
                bus.copy_payload(volume, at, dest)
            }
        }
    }
}

/// A resolved asset group, owned by one load operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssetGroupInfo {
    /// Descriptor VA as supplied by the application.
    pub va: VirtAddr,
    pub address: GroupAddress,
    pub data_size: u32,
    pub num_tiles: u16,
    pub ordinal: u16,
}

impl AssetGroupInfo {
    /// Resolve a descriptor pointer passed directly by a trusted caller.
    ///
    /// Header fields are read from flash and trusted. These groups are always
    /// addressed through the sandbox address space.
    pub fn from_user_pointer<B: AssetBus + ?Sized>(
        bus: &B,
        group_va: VirtAddr,
    ) -> Result<Self, Fault> {
        if !is_aligned(group_va, AssetGroup::ALIGN) {
            return Err(Fault::AddressAlignment);
        }

        let group = snapshot_ram::<{ AssetGroup::SIZE }, _>(bus, group_va)
            .map(|bytes| AssetGroup::from_bytes(&bytes))
            .map_err(|_| Fault::InvalidAddress)?;
        let header_va = group.p_hdr;

        let header = snapshot_ro::<{ AssetGroupHeader::SIZE }, _>(bus, header_va)
            .map(|bytes| AssetGroupHeader::from_bytes(&bytes))
            .map_err(|_| Fault::InvalidAddress)?;

        let owner = bus
            .volume_for_va(header_va)
            .ok_or(Fault::InvalidParameter)?;

        Ok(Self {
            va: group_va,
            address: GroupAddress::Virtual { header_va, owner },
            data_size: header.data_size,
            num_tiles: header.num_tiles,
            ordinal: header.ordinal,
        })
    }

    /// Resolve one configuration entry.
    ///
    /// `config` is a snapshot; its `p_group` and `volume` are each used exactly
    /// once. Sizes come from the configuration, which cached them from the
    /// header at an earlier, trusted point. The header is not re-trusted here.
    pub fn from_configuration<B: AssetBus + ?Sized>(
        bus: &B,
        config: &AssetConfiguration,
    ) -> Result<Self, AssetError> {
        let group_va = config.p_group;
        let handle = config.volume;

        let group = snapshot_ro::<{ AssetGroup::SIZE }, _>(bus, group_va)
            .map(|bytes| AssetGroup::from_bytes(&bytes))
            .map_err(|_| {
                diag!("ASSET: Bad group pointer 0x{:08x} in configuration", group_va);
                AssetError::BadGroupPointer
            })?;
        let header_va = group.p_hdr;

        let address = if handle != 0 {
            // Treat the header VA as an offset into the named volume, as if
            // that volume were mapped at segment 1.
            let Some(volume) = bus.volume(handle) else {
                diag!("ASSET: Bad volume handle 0x{:08x} in configuration", handle);
                return Err(AssetError::BadVolumeHandle);
            };

            let header_offset = header_va.wrapping_sub(SEGMENT_1_VA);
            if header_offset >= SEGMENT_SIZE - HEADER_SIZE {
                diag!("ASSET: Header VA 0x{:08x} in configuration not in segment 1", header_va);
                return Err(AssetError::HeaderNotInSegment);
            }

            GroupAddress::Remapped {
                volume,
                header_offset,
            }
        } else {
            // A plain VA. Remember the owner explicitly so later reads come
            // from whatever is really mapped there.
            let Some(owner) = bus.volume_for_va(header_va) else {
                diag!("ASSET: Bad local header VA 0x{:08x} in configuration", header_va);
                return Err(AssetError::BadHeaderAddress);
            };

            GroupAddress::Virtual { header_va, owner }
        };

        Ok(Self {
            va: group_va,
            address,
            data_size: config.data_size,
            num_tiles: config.num_tiles,
            ordinal: config.ordinal,
        })
    }

    /// Read group data starting `offset` bytes past the end of the header.
    pub fn read_data<B: AssetBus + ?Sized>(
        &self,
        bus: &B,
        offset: u32,
        dest: &mut [u8],
    ) -> Result<(), BusError> {
        let at = HEADER_SIZE.checked_add(offset).ok_or(BusError::OutOfBounds)?;
        self.address.read(bus, at, dest)
    }

    /// Copy the checksum the packaging tool recorded in the group header.
    pub fn copy_crc<B: AssetBus + ?Sized>(
        &self,
        bus: &B,
        out: &mut [u8; ASSET_GROUP_CRC_SIZE],
    ) -> Result<(), BusError> {
        self.address
            .read(bus, AssetGroupHeader::CRC_OFFSET as u32, out)
    }
}

fn group_cube_va(group_va: VirtAddr, cube: CubeId) -> Option<VirtAddr> {
    group_va.checked_add(AssetGroup::cube_offset(cube))
}

/// Borrow the per-cube record that follows a group descriptor in user RAM.
pub fn map_group_cube<T: Translator + ?Sized>(
    bus: &mut T,
    group_va: VirtAddr,
    cube: CubeId,
) -> Option<&mut [u8]> {
    let va = group_cube_va(group_va, cube)?;
    bus.map_ram_mut(va, AssetGroupCube::SIZE).ok()
}

/// Tile base address recorded for `cube`, if the record is mapped.
pub fn loaded_base_addr<T: Translator + ?Sized>(
    bus: &T,
    group_va: VirtAddr,
    cube: CubeId,
) -> Option<u16> {
    let va = group_cube_va(group_va, cube)?;
    let bytes = snapshot_ram::<{ AssetGroupCube::SIZE }, _>(bus, va).ok()?;
    Some(AssetGroupCube::from_bytes(&bytes).base_addr)
}

/// Record where a group ended up on `cube`.
pub fn record_base_addr<T: Translator + ?Sized>(
    bus: &mut T,
    group_va: VirtAddr,
    cube: CubeId,
    base_addr: u16,
) -> Result<(), BusError> {
    let record = map_group_cube(bus, group_va, cube).ok_or(BusError::Unmapped)?;
    record.copy_from_slice(&AssetGroupCube { base_addr }.to_bytes());
    Ok(())
}
