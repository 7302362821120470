// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The two failure tiers of the asset path.
//!
//! A [`Fault`] means a trusted caller broke an invariant and the whole
//! sandboxed unit must be aborted. An [`AssetError`] means user data was bad;
//! it is logged and handed back, and the caller decides what to drop.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Hard fault raised from the trusted entry path only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Pointer not aligned for the structure it should hold
    AddressAlignment,
    /// Address does not map to RAM or readable storage
    InvalidAddress,
    /// Address maps, but to no live volume
    InvalidParameter,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressAlignment => f.write_str("misaligned address"),
            Self::InvalidAddress => f.write_str("invalid address"),
            Self::InvalidParameter => f.write_str("invalid parameter"),
        }
    }
}

/// Logged, non-fatal rejection of user-supplied asset data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssetError {
    /// More entries than could ever fit in the asset slots
    ConfigTooLarge,
    /// Configuration table not mapped in user RAM
    BadConfigPointer,
    /// Nonzero volume handle that names no live volume
    BadVolumeHandle,
    /// Group descriptor pointer not mapped or unreadable
    BadGroupPointer,
    /// Slot out of range or not bound
    BadSlot,
    /// Slot already holds the maximum number of groups
    TooManyGroups,
    /// Slot tile capacity exceeded
    TooManyTiles,
    /// Header address cannot be interpreted as an offset into segment 1
    HeaderNotInSegment,
    /// Header address is owned by no volume
    BadHeaderAddress,
    /// A bounded copy from the data source failed mid-stream
    SourceUnreadable,
    /// The cube already has a load in flight
    Busy,
    /// Cube mask names cubes this unit does not have
    BadCubeMask,
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ConfigTooLarge => "configuration has too many entries",
            Self::BadConfigPointer => "bad configuration pointer",
            Self::BadVolumeHandle => "bad volume handle",
            Self::BadGroupPointer => "bad asset group pointer",
            Self::BadSlot => "bad slot number",
            Self::TooManyGroups => "too many groups in slot",
            Self::TooManyTiles => "too many tiles in slot",
            Self::HeaderNotInSegment => "header address not in segment 1",
            Self::BadHeaderAddress => "header address not owned by any volume",
            Self::SourceUnreadable => "asset data source unreadable",
            Self::Busy => "cube is busy",
            Self::BadCubeMask => "cube mask names unknown cubes",
        };
        f.write_str(msg)
    }
}

/// Failure reported by a [`Translator`](crate::Translator) or
/// [`VolumeStore`](crate::VolumeStore) access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// No mapping covers the start address
    Unmapped,
    /// The mapping ends before the requested range does
    OutOfBounds,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped => f.write_str("address not mapped"),
            Self::OutOfBounds => f.write_str("range out of bounds"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Fault {}

#[cfg(feature = "std")]
impl std::error::Error for AssetError {}

#[cfg(feature = "std")]
impl std::error::Error for BusError {}
