// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host-side building blocks of the `tilestream` tool.
//!
//! Everything here works on byte buffers; serial I/O stays in the binary.

pub mod pack;
pub mod simulate;
pub mod stage;
pub mod uf2;
pub mod volume;

use crc::{Crc, CRC_32_ISO_HDLC};

pub(crate) const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
