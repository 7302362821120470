// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use tilestream_common::memory::Segment;
use tilestream_common::BoundSlots;
use tilestream_tool::stage::{Addressing, StageOptions};

use crate::commands;
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "tilestream")]
#[command(about = "Asset packaging and loading tool for tilestream devices")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    pub port: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where a payload is mapped and how the staged configuration points at it.
#[derive(Args, Clone)]
pub struct LayoutArgs {
    /// Volume handle of the payload
    #[arg(long, default_value = "1")]
    pub handle: u32,

    /// Segment the volume is mapped at (0 or 1)
    #[arg(long, default_value = "0", value_parser = parse_segment)]
    pub segment: u8,

    /// Name the volume in each entry instead of using mapped addresses
    #[arg(long)]
    pub remap: bool,

    /// Bound asset slots as a bit mask in hex
    #[arg(long, default_value = "0xF", value_parser = parse_hex_u32)]
    pub slots: u32,

    /// Where the configuration table goes, in hex
    #[arg(long, default_value = "0x00010000", value_parser = parse_hex_u32)]
    pub config_va: u32,
}

impl LayoutArgs {
    pub fn addressing(&self) -> Addressing {
        if self.remap {
            Addressing::Remapped {
                handle: self.handle,
            }
        } else if self.segment == 1 {
            Addressing::Virtual(Segment::One)
        } else {
            Addressing::Virtual(Segment::Zero)
        }
    }

    pub fn bound_slots(&self) -> BoundSlots {
        BoundSlots::from_mask(self.slots as u8)
    }

    pub fn stage_options(&self) -> StageOptions {
        StageOptions {
            addressing: self.addressing(),
            slots: self.bound_slots(),
            config_va: self.config_va,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Pack group data files into a volume payload
    Pack {
        /// Group data and tile count, as FILE:TILES
        #[arg(value_name = "GROUP", required = true, value_parser = parse_group_arg)]
        groups: Vec<(PathBuf, u16)>,

        /// Output payload file
        #[arg(short, long)]
        output: PathBuf,

        /// Ordinal of the first group
        #[arg(long, default_value = "0")]
        first_ordinal: u16,
    },

    /// List the groups in a payload, or the volumes in a volume region image
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// FILE is a volume region image made by `mkvolume`
        #[arg(long)]
        region: bool,
    },

    /// Build the flash volume region from payloads
    #[command(name = "mkvolume")]
    MkVolume {
        /// Volume handle and payload, as HANDLE=FILE
        #[arg(value_name = "VOLUME", required = true, value_parser = parse_volume_arg)]
        volumes: Vec<(u32, PathBuf)>,

        /// Output raw image
        #[arg(short, long)]
        output: PathBuf,

        /// Also write a UF2 file for drag-and-drop flashing
        #[arg(long)]
        uf2: Option<PathBuf>,
    },

    /// Convert a raw binary file to UF2 format
    #[command(name = "bin2uf2")]
    Bin2Uf2 {
        /// Input binary file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output UF2 file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Base address in hex (default: 0x10000000)
        #[arg(short = 'a', long, default_value = "0x10000000", value_parser = parse_hex_u32)]
        base_address: u32,

        /// Family ID in hex (default: 0xE48BFF56 for RP2040)
        #[arg(short, long, default_value = "0xE48BFF56", value_parser = parse_hex_u32)]
        family_id: u32,
    },

    /// Stream a payload through the loader offline
    Simulate {
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Cubes to load, as a bit mask in hex
        #[arg(long, default_value = "0x1", value_parser = parse_hex_u32)]
        cubes: u32,

        /// Bytes drained from each FIFO per step
        #[arg(long, default_value = "16")]
        drain: usize,

        /// Give up after this many steps
        #[arg(long, default_value = "1000000")]
        max_steps: usize,
    },

    /// Get device status
    Status,

    /// Copy a file into device user RAM
    WriteRam {
        /// Destination address in hex
        #[arg(value_parser = parse_hex_u32)]
        va: u32,

        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Stage a configuration for a payload in device RAM
    Stage {
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Bind the asset slots the staged application may use
    Bind {
        /// Slot mask in hex
        #[arg(value_parser = parse_hex_u32)]
        mask: u32,
    },

    /// Validate a configuration table already in device RAM
    Validate {
        #[arg(value_parser = parse_hex_u32)]
        config_va: u32,
        count: u32,
    },

    /// Load a configuration table onto cubes
    Load {
        /// Cube mask in hex
        #[arg(value_parser = parse_hex_u32)]
        cubes: u32,
        #[arg(value_parser = parse_hex_u32)]
        config_va: u32,
        count: u32,

        /// Stream until every selected cube finishes
        #[arg(short, long)]
        wait: bool,
    },

    /// Load a single group onto one cube
    LoadGroup {
        cube: u8,
        /// Group descriptor address in hex
        #[arg(value_parser = parse_hex_u32)]
        group_va: u32,

        /// Stream until the cube finishes
        #[arg(short, long)]
        wait: bool,
    },

    /// Pause a cube's load
    Pause { cube: u8 },

    /// Resume a cube's load
    Resume { cube: u8 },

    /// Cancel loads
    Cancel {
        /// Cube mask in hex
        #[arg(default_value = "0xFFFFFF", value_parser = parse_hex_u32)]
        cubes: u32,
    },

    /// Read back a group's base address on a cube
    Query {
        #[arg(value_parser = parse_hex_u32)]
        group_va: u32,
        cube: u8,
    },

    /// Print load events and asset data as they arrive
    Monitor {
        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Append each cube's data to DIR/cube-N.bin
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,
    },
}

/// Parse a hex string (with or without 0x prefix) into a u32.
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(s, 16).map_err(|e| format!("invalid hex value: {e}"))
}

fn parse_segment(s: &str) -> Result<u8, String> {
    match s {
        "0" => Ok(0),
        "1" => Ok(1),
        _ => Err(format!("segment must be 0 or 1, got {s}")),
    }
}

fn parse_group_arg(s: &str) -> Result<(PathBuf, u16), String> {
    let (file, tiles) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected FILE:TILES, got {s}"))?;
    let tiles = tiles
        .parse()
        .map_err(|e| format!("invalid tile count in {s}: {e}"))?;
    Ok((PathBuf::from(file), tiles))
}

fn parse_volume_arg(s: &str) -> Result<(u32, PathBuf), String> {
    let (handle, file) = s
        .split_once('=')
        .ok_or_else(|| format!("expected HANDLE=FILE, got {s}"))?;
    let handle = handle
        .parse()
        .map_err(|e| format!("invalid handle in {s}: {e}"))?;
    Ok((handle, PathBuf::from(file)))
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Pack {
            groups,
            output,
            first_ordinal,
        } => return commands::pack(&groups, &output, first_ordinal),
        Commands::Inspect { file, region } => return commands::inspect(&file, region),
        Commands::MkVolume {
            volumes,
            output,
            uf2,
        } => return commands::mkvolume(&volumes, &output, uf2.as_deref()),
        Commands::Bin2Uf2 {
            input,
            output,
            base_address,
            family_id,
        } => return commands::bin2uf2(&input, &output, base_address, family_id),
        Commands::Simulate {
            payload,
            layout,
            cubes,
            drain,
            max_steps,
        } => return commands::simulate(&payload, &layout, cubes, drain, max_steps),
        _ => {}
    }

    let port = cli
        .port
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--port is required for this command"))?;
    let mut transport = Transport::new(port)?;

    match cli.command {
        Commands::Status => commands::status(&mut transport),
        Commands::WriteRam { va, file } => commands::write_ram(&mut transport, va, &file),
        Commands::Stage { payload, layout } => commands::stage(&mut transport, &payload, &layout),
        Commands::Bind { mask } => commands::bind(&mut transport, mask),
        Commands::Validate { config_va, count } => {
            commands::validate(&mut transport, config_va, count)
        }
        Commands::Load {
            cubes,
            config_va,
            count,
            wait,
        } => commands::load(&mut transport, cubes, config_va, count, wait),
        Commands::LoadGroup {
            cube,
            group_va,
            wait,
        } => commands::load_group(&mut transport, cube, group_va, wait),
        Commands::Pause { cube } => commands::pause(&mut transport, cube, true),
        Commands::Resume { cube } => commands::pause(&mut transport, cube, false),
        Commands::Cancel { cubes } => commands::cancel(&mut transport, cubes),
        Commands::Query { group_va, cube } => commands::query(&mut transport, group_va, cube),
        Commands::Monitor { seconds, save } => {
            commands::monitor(&mut transport, seconds, save.as_deref())
        }
        Commands::Pack { .. }
        | Commands::Inspect { .. }
        | Commands::MkVolume { .. }
        | Commands::Bin2Uf2 { .. }
        | Commands::Simulate { .. } => bail!("unreachable"),
    }
}
