// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Asset configuration validation and cube streaming core for tilestream.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: Enables `std` support for host tools
//! - `defmt` feature: Emits diagnostics and derives `defmt::Format` for firmware builds
//!
//! Nothing in here allocates. Every buffer is fixed-capacity and owned by the
//! caller, so the same code runs in the firmware and in the host-side simulator.

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod diag;

pub mod abi;
pub mod bus;
pub mod error;
pub mod fifo;
pub mod group;
pub mod loader;
pub mod memory;
pub mod protocol;
pub mod service;
pub mod validate;

// Re-export commonly used types
pub use abi::{AssetConfiguration, AssetGroupHeader, CubeId, NUM_CUBE_SLOTS};
pub use bus::SliceBus;
pub use error::{AssetError, BusError, Fault};
pub use fifo::{AssetFifo, Consumer, CubeConsumers, CubeFifos, CubeProducers, Producer};
pub use group::{AssetGroupInfo, GroupAddress};
pub use loader::{AssetLoader, LoadEvent, Progress};
pub use protocol::{AckStatus, Command, Response};
pub use memory::{AssetBus, Translator, VirtAddr, Volume, VolumeStore};
pub use validate::{validate_config, BoundSlots, ConfigTable};
