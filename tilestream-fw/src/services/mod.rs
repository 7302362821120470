// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Service implementations for the asset firmware.

pub mod drain;
pub mod host;
pub mod led;
pub mod loader;
pub mod usb;

pub use drain::FifoDrainService;
pub use host::HostLinkService;
pub use led::LedBlinkService;
pub use loader::LoaderService;
pub use usb::UsbTransportService;
