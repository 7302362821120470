// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for packaging and device operations.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use tilestream_common::memory::VirtAddr;
use tilestream_common::protocol::{unpack_semver, AckStatus, Command, Response};
use tilestream_common::{CubeId, LoadEvent};
use tilestream_tool::pack::{self, GroupSpec};
use tilestream_tool::simulate::{self, SimOptions};
use tilestream_tool::{stage as staging, uf2, volume};

use crate::cli::LayoutArgs;
use crate::transport::Transport;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

fn bytes_bar(total: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Turn a reply into an error unless it is a plain `Ack(Ok)`.
fn expect_ack(response: Response, what: &str) -> Result<()> {
    match response {
        Response::Ack(AckStatus::Ok) => Ok(()),
        Response::Ack(AckStatus::Rejected(e)) => bail!("{} rejected: {}", what, e),
        Response::Ack(AckStatus::Fault(f)) => {
            bail!("{} faulted ({}); the device aborted every load", what, f)
        }
        Response::Ack(AckStatus::Busy) => bail!("{} refused: a selected cube is busy", what),
        Response::Ack(status) => bail!("{} failed: {:?}", what, status),
        other => bail!("Unexpected response to {}: {:?}", what, other),
    }
}

fn cube(raw: u8) -> Result<CubeId> {
    CubeId::new(raw).with_context(|| format!("No cube {}", raw))
}

/// Pack group files into one volume payload.
pub fn pack(groups: &[(std::path::PathBuf, u16)], output: &Path, first_ordinal: u16) -> Result<()> {
    let mut specs = Vec::with_capacity(groups.len());
    for (i, (file, num_tiles)) in groups.iter().enumerate() {
        specs.push(GroupSpec {
            data: read_file(file)?,
            num_tiles: *num_tiles,
            ordinal: first_ordinal
                .checked_add(u16::try_from(i)?)
                .context("Ordinal overflow")?,
        });
    }

    let packed = pack::pack_groups(&specs)?;
    write_file(output, &packed.payload)?;

    for (group, (file, _)) in packed.groups.iter().zip(groups) {
        println!(
            "  #{:<4} @0x{:06x} {:>8} bytes {:>5} tiles  {}",
            group.header.ordinal,
            group.header_offset,
            group.header.data_size,
            group.header.num_tiles,
            file.display()
        );
    }
    println!(
        "Payload: {} ({} groups, {} bytes)",
        output.display(),
        packed.groups.len(),
        packed.payload.len()
    );
    Ok(())
}

fn print_groups(payload: &[u8]) -> Result<()> {
    let groups = pack::inspect(payload)?;
    for found in &groups {
        let header = &found.group.header;
        println!(
            "  #{:<4} @0x{:06x} {:>8} bytes {:>5} tiles  CRC 0x{:08x} {}",
            header.ordinal,
            found.group.header_offset,
            header.data_size,
            header.num_tiles,
            header.data_crc32(),
            if found.crc_ok { "ok" } else { "BAD" }
        );
    }
    println!("  {} group(s)", groups.len());
    Ok(())
}

/// List the contents of a payload or of a volume region image.
pub fn inspect(file: &Path, region: bool) -> Result<()> {
    let data = read_file(file)?;
    if !region {
        return print_groups(&data);
    }

    let records = volume::read_directory(&data);
    if records.is_empty() {
        println!("No volumes");
    }
    for record in &records {
        println!(
            "Volume {}: flash 0x{:08x}, {} bytes, CRC 0x{:08x}",
            record.handle,
            tilestream_common::protocol::FLASH_BASE + record.payload_offset,
            record.payload_size,
            record.payload_crc
        );
        match volume::payload(&data, record) {
            Some(payload) => print_groups(payload)?,
            None => println!("  payload outside image"),
        }
    }
    Ok(())
}

/// Build the volume region image and optionally its UF2.
pub fn mkvolume(
    volumes: &[(u32, std::path::PathBuf)],
    output: &Path,
    uf2_out: Option<&Path>,
) -> Result<()> {
    let mut inputs = Vec::with_capacity(volumes.len());
    for (handle, file) in volumes {
        inputs.push((*handle, read_file(file)?));
    }

    let image = volume::build(&inputs)?;
    write_file(output, &image.bytes)?;
    println!(
        "Volume region: {} ({} bytes at 0x{:08x})",
        output.display(),
        image.bytes.len(),
        image.base
    );

    if let Some(path) = uf2_out {
        let encoded = uf2::encode(&image.bytes, image.base, uf2::RP2040_FAMILY_ID);
        write_file(path, &encoded)?;
        println!(
            "UF2: {} ({} blocks)",
            path.display(),
            encoded.len() / uf2::BLOCK_SIZE
        );
    }
    Ok(())
}

/// Convert a raw binary file to UF2 format.
pub fn bin2uf2(input: &Path, output: &Path, base_address: u32, family_id: u32) -> Result<()> {
    let data = read_file(input)?;
    let out = uf2::encode(&data, base_address, family_id);
    write_file(output, &out)?;

    println!(
        "UF2: {} ({} blocks, {} bytes)",
        output.display(),
        out.len() / uf2::BLOCK_SIZE,
        data.len()
    );
    Ok(())
}

/// Run a payload through the loader with no device attached.
pub fn simulate(
    payload_file: &Path,
    layout: &LayoutArgs,
    cubes: u32,
    drain: usize,
    max_steps: usize,
) -> Result<()> {
    let payload = read_file(payload_file)?;
    let groups: Vec<_> = pack::inspect(&payload)?.into_iter().map(|g| g.group).collect();
    if groups.is_empty() {
        bail!("{} holds no groups", payload_file.display());
    }

    let staged = staging::stage(&groups, &layout.stage_options())?;
    let report = simulate::run(
        &payload,
        layout.handle,
        layout.addressing(),
        &staged,
        &SimOptions {
            cube_mask: cubes,
            drain_per_step: drain,
            max_steps,
            slots: layout.bound_slots(),
        },
    )?;

    for (slot, tiles) in report.slot_tiles.iter().enumerate() {
        if *tiles > 0 {
            println!("Slot {}: {} tiles", slot, tiles);
        }
    }
    for event in &report.events {
        println!("  {:?}", event);
    }

    let expected: Vec<u8> = groups
        .iter()
        .flat_map(|g| g.data(&payload).iter().copied())
        .collect();
    let mut mismatched = 0;
    for cube in CubeId::iter_mask(cubes) {
        let stream = report.stream(cube);
        let ok = stream == expected.as_slice();
        mismatched += usize::from(!ok);
        println!(
            "Cube {}: {} bytes {}",
            cube.raw(),
            stream.len(),
            if ok { "match" } else { "MISMATCH" }
        );
    }

    println!("{} steps", report.steps);
    if mismatched > 0 || !report.all_verified() {
        bail!("simulation did not reproduce the payload");
    }
    Ok(())
}

/// Get and display device status.
pub fn status(transport: &mut Transport) -> Result<()> {
    match transport.send_recv(&Command::GetStatus)? {
        Response::Status {
            firmware_version,
            bound_slots,
            active_mask,
            paused_mask,
            pending_mask,
            volumes,
        } => {
            println!("Device Status:");
            if let Some(version) = firmware_version {
                let (major, minor, patch) = unpack_semver(version);
                println!("  Firmware:    {}.{}.{}", major, minor, patch);
            } else {
                println!("  Firmware:    unknown");
            }
            println!("  Bound slots: 0x{:x}", bound_slots);
            println!("  Active:      0x{:06x}", active_mask);
            println!("  Paused:      0x{:06x}", paused_mask);
            println!("  Pending:     0x{:06x}", pending_mask);
            println!("  Volumes:     {:?}", volumes.as_slice());
        }
        other => bail!("Unexpected response: {:?}", other),
    }
    Ok(())
}

fn write_chunks<'a>(
    transport: &mut Transport,
    chunks: impl Iterator<Item = (VirtAddr, &'a [u8])>,
    total: usize,
) -> Result<()> {
    let pb = bytes_bar(total as u64)?;
    let mut written = 0u64;

    for (va, chunk) in chunks {
        let data = heapless::Vec::from_slice(chunk)
            .map_err(|_| anyhow::anyhow!("chunk of {} bytes too large", chunk.len()))?;
        let response = transport.send_recv(&Command::WriteRam { va, data })?;
        if let Err(e) = expect_ack(response, &format!("WriteRam at 0x{:08x}", va)) {
            pb.abandon();
            return Err(e);
        }
        written += chunk.len() as u64;
        pb.set_position(written);
    }

    pb.finish_and_clear();
    Ok(())
}

/// Copy a file into user RAM.
pub fn write_ram(transport: &mut Transport, va: VirtAddr, file: &Path) -> Result<()> {
    let data = read_file(file)?;
    let block = tilestream_common::protocol::MAX_DATA_BLOCK_SIZE;
    let chunks = data
        .chunks(block)
        .enumerate()
        .map(|(i, chunk)| (va + (i * block) as u32, chunk));
    write_chunks(transport, chunks, data.len())?;
    println!("Wrote {} bytes at 0x{:08x}", data.len(), va);
    Ok(())
}

/// Bind slots, write a configuration for `payload_file` and validate it.
pub fn stage(transport: &mut Transport, payload_file: &Path, layout: &LayoutArgs) -> Result<()> {
    let payload = read_file(payload_file)?;
    let found = pack::inspect(&payload)?;
    if let Some(bad) = found.iter().find(|g| !g.crc_ok) {
        eprintln!(
            "Warning: group {} has a bad CRC and will load unverified",
            bad.group.header.ordinal
        );
    }
    let groups: Vec<_> = found.into_iter().map(|g| g.group).collect();
    let staged = staging::stage(&groups, &layout.stage_options())?;

    bind(transport, layout.slots)?;
    write_chunks(transport, staged.chunks(), staged.image.len())?;
    validate(transport, staged.config.va, staged.config.count)?;

    for ((desc, slot), group) in staged.descriptors.iter().zip(&staged.slots).zip(&groups) {
        println!(
            "  #{:<4} descriptor 0x{:08x} slot {}",
            group.header.ordinal, desc, slot
        );
    }
    println!(
        "Staged: {} entries at 0x{:08x}",
        staged.config.count, staged.config.va
    );
    println!(
        "Use 'tilestream --port {} load <CUBES> 0x{:08x} {}' to start loading.",
        transport.port_name(),
        staged.config.va,
        staged.config.count
    );
    Ok(())
}

pub fn bind(transport: &mut Transport, mask: u32) -> Result<()> {
    let Ok(mask) = u8::try_from(mask) else {
        bail!("Slot mask 0x{:x} does not fit in 8 bits", mask);
    };
    let response = transport.send_recv(&Command::BindSlots { mask })?;
    match response {
        Response::Ack(AckStatus::BadState) => bail!("Cannot bind slots while loads are running"),
        other => expect_ack(other, "BindSlots"),
    }
}

pub fn validate(transport: &mut Transport, config_va: u32, count: u32) -> Result<()> {
    let response = transport.send_recv(&Command::ValidateConfig { config_va, count })?;
    expect_ack(response, "Configuration")?;
    println!("Configuration at 0x{:08x} ({} entries) is valid", config_va, count);
    Ok(())
}

pub fn load(
    transport: &mut Transport,
    cube_mask: u32,
    config_va: u32,
    count: u32,
    wait: bool,
) -> Result<()> {
    let response = transport.send_recv(&Command::LoadConfig {
        cube_mask,
        config_va,
        count,
    })?;
    expect_ack(response, "LoadConfig")?;
    println!("Loading on cubes 0x{:06x}", cube_mask);

    if wait {
        follow(transport, cube_mask)?;
    }
    Ok(())
}

pub fn load_group(transport: &mut Transport, raw_cube: u8, group_va: u32, wait: bool) -> Result<()> {
    let target = cube(raw_cube)?;
    let response = transport.send_recv(&Command::LoadGroup {
        cube: raw_cube,
        group_va,
    })?;
    expect_ack(response, "LoadGroup")?;
    println!("Loading group 0x{:08x} on cube {}", group_va, raw_cube);

    if wait {
        follow(transport, target.bit())?;
    }
    Ok(())
}

/// Print events until every cube in `cube_mask` has finished or failed.
fn follow(transport: &mut Transport, cube_mask: u32) -> Result<()> {
    let mut remaining = cube_mask;
    let mut received = 0u64;
    let pb = ProgressBar::new_spinner();

    while remaining != 0 {
        match transport.recv(Duration::from_secs(5))? {
            Some(Response::AssetData { data, .. }) => {
                received += data.len() as u64;
                pb.set_message(format!("{} bytes", received));
                pb.tick();
            }
            Some(Response::Load(event)) => {
                pb.println(describe(&event));
                match event {
                    LoadEvent::Finished { cube } | LoadEvent::Failed { cube, .. } => {
                        remaining &= !cube.bit();
                    }
                    LoadEvent::GroupLoaded { .. } => {}
                }
            }
            Some(other) => pb.println(format!("Unexpected frame: {:?}", other)),
            None => {
                pb.abandon();
                bail!("No progress for 5 s, cubes 0x{:06x} still loading", remaining);
            }
        }
    }

    pb.finish_with_message(format!("{} bytes streamed", received));
    Ok(())
}

fn describe(event: &LoadEvent) -> String {
    match event {
        LoadEvent::GroupLoaded {
            cube,
            ordinal,
            base_addr,
            verified,
        } => format!(
            "Cube {}: group {} loaded{}{}",
            cube.raw(),
            ordinal,
            base_addr.map_or(String::new(), |b| format!(" at tile {}", b)),
            if *verified { "" } else { ", CRC MISMATCH" }
        ),
        LoadEvent::Finished { cube } => format!("Cube {}: finished", cube.raw()),
        LoadEvent::Failed { cube, error } => format!("Cube {}: failed: {}", cube.raw(), error),
    }
}

pub fn pause(transport: &mut Transport, raw_cube: u8, paused: bool) -> Result<()> {
    cube(raw_cube)?;
    let (cmd, what) = if paused {
        (Command::Pause { cube: raw_cube }, "Pause")
    } else {
        (Command::Resume { cube: raw_cube }, "Resume")
    };
    match transport.send_recv(&cmd)? {
        Response::Ack(AckStatus::BadState) => bail!("Cube {} has no load running", raw_cube),
        other => expect_ack(other, what),
    }
}

pub fn cancel(transport: &mut Transport, cube_mask: u32) -> Result<()> {
    let response = transport.send_recv(&Command::Cancel { cube_mask })?;
    expect_ack(response, "Cancel")?;
    println!("Cancelled cubes 0x{:06x}", cube_mask);
    Ok(())
}

pub fn query(transport: &mut Transport, group_va: u32, raw_cube: u8) -> Result<()> {
    cube(raw_cube)?;
    match transport.send_recv(&Command::QueryGroup {
        group_va,
        cube: raw_cube,
    })? {
        Response::BaseAddr(Some(base)) => println!("Cube {}: base tile {}", raw_cube, base),
        Response::BaseAddr(None) => bail!("Descriptor 0x{:08x} is not in user RAM", group_va),
        other => expect_ack(other, "QueryGroup")?,
    }
    Ok(())
}

/// Print unsolicited frames, optionally saving asset data per cube.
pub fn monitor(transport: &mut Transport, seconds: Option<u64>, save: Option<&Path>) -> Result<()> {
    if let Some(dir) = save {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));

    while deadline.is_none_or(|d| Instant::now() < d) {
        match transport.recv(POLL_INTERVAL)? {
            Some(Response::AssetData { cube, data }) => {
                println!("Cube {}: {} bytes", cube, data.len());
                if let Some(dir) = save {
                    let path = dir.join(format!("cube-{}.bin", cube));
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .and_then(|mut f| f.write_all(&data))
                        .with_context(|| format!("Failed to append to {}", path.display()))?;
                }
            }
            Some(Response::Load(event)) => println!("{}", describe(&event)),
            Some(other) => println!("{:?}", other),
            None => {}
        }
    }
    Ok(())
}
