// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host link command handling over USB CDC.
//!
//! This module implements the link protocol:
//!
//! - `GetStatus`: Query loader and volume state
//! - `WriteRam`, `BindSlots`: Stage an application's RAM image and slots
//! - `ValidateConfig`, `LoadConfig`, `LoadGroup`: Check and start loads
//! - `Pause`, `Resume`, `Cancel`: Control running loads
//! - `QueryGroup`: Read back a recorded base address
mod commands;
mod state;

pub use commands::dispatch_command;
pub use state::HostState;
