// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host link protocol.
//!
//! Messages are postcard-encoded and COBS-framed with a `0x00` delimiter. The
//! host sends [`Command`]s and gets exactly one [`Response`] back per command.
//! [`Response::AssetData`] and [`Response::Load`] are also sent unsolicited
//! while loads are running; clients must skip them when waiting for a reply.

use crate::abi::MAX_VOLUMES;
use crate::error::{AssetError, Fault};
use crate::loader::LoadEvent;
use heapless::Vec;
use serde::{Deserialize, Serialize};

/// RP2040 XIP flash base.
pub const FLASH_BASE: u32 = 0x1000_0000;
pub const FLASH_SECTOR_SIZE: u32 = 4096;
pub const FLASH_PAGE_SIZE: u32 = 256;
/// Flash volume directory, one sector.
pub const VOLUME_DIR_ADDR: u32 = 0x1010_0000;
/// First byte available to volume payloads.
pub const VOLUME_AREA_ADDR: u32 = VOLUME_DIR_ADDR + FLASH_SECTOR_SIZE;
/// Directory plus payloads.
pub const VOLUME_REGION_SIZE: u32 = 0x0010_0000;

/// Largest payload of a single [`Command::WriteRam`].
pub const MAX_DATA_BLOCK_SIZE: usize = 256;
/// Largest payload of a single [`Response::AssetData`].
pub const ASSET_FRAME_SIZE: usize = 48;

pub const USB_VID: u16 = 0x2E8A;
pub const USB_PID: u16 = 0x000A;

/// Commands sent from the host to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    GetStatus,
    /// Copy bytes into user RAM at `va`.
    WriteRam {
        va: u32,
        data: Vec<u8, MAX_DATA_BLOCK_SIZE>,
    },
    /// Set which asset slots the staged application may use.
    BindSlots { mask: u8 },
    ValidateConfig { config_va: u32, count: u32 },
    LoadConfig {
        cube_mask: u32,
        config_va: u32,
        count: u32,
    },
    LoadGroup { cube: u8, group_va: u32 },
    Pause { cube: u8 },
    Resume { cube: u8 },
    Cancel { cube_mask: u32 },
    /// Read back the base address recorded for `cube` in a group descriptor.
    QueryGroup { group_va: u32, cube: u8 },
}

/// Acknowledgement status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    Ok,
    BadCommand,
    BadState,
    Busy,
    /// Untrusted request refused; nothing was started.
    Rejected(AssetError),
    /// Trusted request faulted; every running job was aborted.
    Fault(Fault),
}

/// Responses and notifications sent from the device to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ack(AckStatus),
    Status {
        firmware_version: Option<u32>,
        bound_slots: u8,
        active_mask: u32,
        paused_mask: u32,
        pending_mask: u32,
        volumes: Vec<u32, MAX_VOLUMES>,
    },
    /// Bytes drained from a cube FIFO.
    AssetData {
        cube: u8,
        data: Vec<u8, ASSET_FRAME_SIZE>,
    },
    Load(LoadEvent),
    BaseAddr(Option<u16>),
}

/// Pack `major.minor.patch` into a `u32` as `0x00MMmmpp`.
pub const fn pack_semver(major: u8, minor: u8, patch: u8) -> u32 {
    ((major as u32) << 16) | ((minor as u32) << 8) | patch as u32
}

pub const fn unpack_semver(version: u32) -> (u8, u8, u8) {
    ((version >> 16) as u8, (version >> 8) as u8, version as u8)
}

/// Parse a `major.minor.patch` string, typically `CARGO_PKG_VERSION`.
///
/// Pre-release and build suffixes after the patch number are ignored.
pub fn parse_semver(version: &str) -> Option<u32> {
    let mut parts = version.splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?;
    let digits = patch
        .find(|c: char| !c.is_ascii_digit())
        .map_or(patch, |end| &patch[..end]);
    let patch = digits.parse().ok()?;
    Some(pack_semver(major, minor, patch))
}
