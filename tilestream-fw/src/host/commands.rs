// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use crate::engine::AssetEngine;
use crate::usb_transport::UsbTransport;
use heapless::Vec;
use tilestream_common::protocol::{parse_semver, AckStatus, Command, Response};
use tilestream_common::service::{Event, EventBus};
use tilestream_common::{validate_config, AssetError, BoundSlots, ConfigTable, CubeId};

const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn send_ack(transport: &mut UsbTransport, status: AckStatus) {
    let _ = transport.send(&Response::Ack(status));
}

fn rejection(error: AssetError) -> AckStatus {
    match error {
        AssetError::Busy => AckStatus::Busy,
        other => AckStatus::Rejected(other),
    }
}

/// Dispatch a command to its handler.
pub fn dispatch_command(
    transport: &mut UsbTransport,
    engine: &mut AssetEngine,
    events: &EventBus,
    cmd: Command,
) {
    match cmd {
        Command::GetStatus => handle_get_status(transport, engine),
        Command::WriteRam { va, data } => handle_write_ram(transport, engine, va, &data),
        Command::BindSlots { mask } => handle_bind_slots(transport, engine, mask),
        Command::ValidateConfig { config_va, count } => {
            let status = match validate_config(
                &engine.bus,
                engine.bound_slots,
                ConfigTable::new(config_va, count),
            ) {
                Ok(_) => AckStatus::Ok,
                Err(e) => AckStatus::Rejected(e),
            };
            send_ack(transport, status);
        }
        Command::LoadConfig {
            cube_mask,
            config_va,
            count,
        } => handle_load_config(transport, engine, cube_mask, config_va, count),
        Command::LoadGroup { cube, group_va } => {
            handle_load_group(transport, engine, events, cube, group_va)
        }
        Command::Pause { cube } => {
            let paused = CubeId::new(cube).is_some_and(|c| engine.loader.pause(c));
            send_ack(transport, if paused { AckStatus::Ok } else { AckStatus::BadState });
        }
        Command::Resume { cube } => {
            let resumed = CubeId::new(cube).is_some_and(|c| engine.loader.resume(c));
            send_ack(transport, if resumed { AckStatus::Ok } else { AckStatus::BadState });
        }
        Command::Cancel { cube_mask } => {
            let cancelled = engine.cancel(cube_mask);
            defmt::println!("Cancel: cubes 0x{:08x}", cancelled);
            send_ack(transport, AckStatus::Ok);
        }
        Command::QueryGroup { group_va, cube } => {
            let Some(cube) = CubeId::new(cube) else {
                return send_ack(transport, AckStatus::BadCommand);
            };
            let base = tilestream_common::group::loaded_base_addr(&engine.bus, group_va, cube);
            let _ = transport.send(&Response::BaseAddr(base));
        }
    }
}

/// Handle `GetStatus` command: report loader and volume state.
fn handle_get_status(transport: &mut UsbTransport, engine: &AssetEngine) {
    let mut volumes = Vec::new();
    for handle in engine.bus.handles() {
        // Bus holds at most as many volumes as the response can carry
        let _ = volumes.push(handle);
    }

    let _ = transport.send(&Response::Status {
        firmware_version: parse_semver(FIRMWARE_VERSION),
        bound_slots: engine.bound_slots.mask(),
        active_mask: engine.loader.active_mask(),
        paused_mask: engine.loader.paused_mask(),
        pending_mask: engine.consumers.pending_mask(),
        volumes,
    });
}

fn handle_write_ram(transport: &mut UsbTransport, engine: &mut AssetEngine, va: u32, data: &[u8]) {
    match engine.bus.write_ram(va, data) {
        Ok(()) => send_ack(transport, AckStatus::Ok),
        Err(e) => {
            defmt::warn!("WriteRam: {} bytes at 0x{:08x}: {:?}", data.len(), va, e);
            send_ack(transport, AckStatus::BadCommand);
        }
    }
}

/// Slot bindings are fixed while any load runs.
fn handle_bind_slots(transport: &mut UsbTransport, engine: &mut AssetEngine, mask: u8) {
    if !engine.loader.is_idle() {
        return send_ack(transport, AckStatus::BadState);
    }
    engine.bound_slots = BoundSlots::from_mask(mask);
    defmt::println!("BindSlots: mask=0x{:02x}", engine.bound_slots.mask());
    send_ack(transport, AckStatus::Ok);
}

/// Handle `LoadConfig` command: validate the table, then start every cube.
fn handle_load_config(
    transport: &mut UsbTransport,
    engine: &mut AssetEngine,
    cube_mask: u32,
    config_va: u32,
    count: u32,
) {
    if cube_mask == 0 {
        return send_ack(transport, AckStatus::BadCommand);
    }

    let table = ConfigTable::new(config_va, count);
    let started = validate_config(&engine.bus, engine.bound_slots, table)
        .and_then(|usage| {
            defmt::println!(
                "LoadConfig: {} entries, slot tiles {:?}",
                count,
                usage.tiles
            );
            engine.loader.start_config(cube_mask, table, engine.bound_slots)
        });

    match started {
        Ok(()) => send_ack(transport, AckStatus::Ok),
        Err(e) => {
            defmt::warn!("LoadConfig rejected: {:?}", e);
            send_ack(transport, rejection(e));
        }
    }
}

/// Handle `LoadGroup` command. A bad pointer here aborts the whole unit.
fn handle_load_group(
    transport: &mut UsbTransport,
    engine: &mut AssetEngine,
    events: &EventBus,
    cube: u8,
    group_va: u32,
) {
    let Some(cube) = CubeId::new(cube) else {
        return send_ack(transport, AckStatus::BadCommand);
    };

    match engine.start_group(cube, group_va) {
        Ok(()) => {
            defmt::println!("LoadGroup: cube {} from 0x{:08x}", cube.raw(), group_va);
            send_ack(transport, AckStatus::Ok);
        }
        Err(fault) => {
            engine.abort(fault);
            events.publish(Event::UnitAborted(fault));
            send_ack(transport, AckStatus::Fault(fault));
        }
    }
}
