// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use tilestream_common::protocol::{FLASH_SECTOR_SIZE, VOLUME_DIR_ADDR};

unsafe extern "C" {
    static __volume_dir: u32;
    static __volume_area_end: u32;
}

macro_rules! linker_addr {
    ($sym:ident) => {
        unsafe { &$sym as *const u32 as u32 }
    };
}

pub struct MemoryLayout {
    pub volume_dir: u32,
    pub volume_area: u32,
    pub volume_area_end: u32,
}

impl MemoryLayout {
    pub fn from_linker() -> Self {
        let volume_dir = linker_addr!(__volume_dir);
        Self {
            volume_dir,
            volume_area: volume_dir + FLASH_SECTOR_SIZE,
            volume_area_end: linker_addr!(__volume_area_end),
        }
    }

    /// Whether the linker script agrees with the address the host tool uses.
    pub fn matches_protocol(&self) -> bool {
        self.volume_dir == VOLUME_DIR_ADDR
    }
}
