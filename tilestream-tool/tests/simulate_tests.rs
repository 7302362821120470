// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! End-to-end runs of the offline streaming path.

use tilestream_common::memory::Segment;
use tilestream_common::{BoundSlots, CubeId, LoadEvent};
use tilestream_tool::pack::{pack_groups, GroupSpec, Pack};
use tilestream_tool::simulate::{run, SimOptions};
use tilestream_tool::stage::{stage, Addressing, StageOptions};

fn packed() -> Pack {
    let specs = [(150, 10), (64, 20), (333, 30)]
        .iter()
        .enumerate()
        .map(|(i, &(len, num_tiles))| GroupSpec {
            data: (0..len).map(|b: usize| (b * 13 + i) as u8).collect(),
            num_tiles,
            ordinal: i as u16 + 1,
        })
        .collect::<Vec<_>>();
    pack_groups(&specs).unwrap()
}

fn expected(pack: &Pack) -> Vec<u8> {
    pack.groups
        .iter()
        .flat_map(|g| g.data(&pack.payload).to_vec())
        .collect()
}

fn sim_options(cube_mask: u32, drain_per_step: usize) -> SimOptions {
    SimOptions {
        cube_mask,
        drain_per_step,
        max_steps: 100_000,
        slots: BoundSlots::ALL,
    }
}

fn stage_options(addressing: Addressing) -> StageOptions {
    StageOptions {
        addressing,
        slots: BoundSlots::ALL,
        config_va: tilestream_common::memory::RAM_BASE,
    }
}

#[test]
fn test_two_cubes_receive_identical_streams() {
    let pack = packed();
    let addressing = Addressing::Virtual(Segment::Zero);
    let staged = stage(&pack.groups, &stage_options(addressing)).unwrap();

    let report = run(&pack.payload, 1, addressing, &staged, &sim_options(0b101, 16)).unwrap();

    let want = expected(&pack);
    assert_eq!(report.stream(CubeId::new(0).unwrap()), want.as_slice());
    assert_eq!(report.stream(CubeId::new(2).unwrap()), want.as_slice());
    assert!(report.stream(CubeId::new(1).unwrap()).is_empty());
    assert!(report.all_verified());
    assert_eq!(report.slot_tiles, [16 + 32 + 32, 0, 0, 0]);
}

#[test]
fn test_base_addresses_recorded_per_cube() {
    let pack = packed();
    let addressing = Addressing::Virtual(Segment::Zero);
    let staged = stage(&pack.groups, &stage_options(addressing)).unwrap();

    let report = run(&pack.payload, 1, addressing, &staged, &sim_options(0b11, 48)).unwrap();

    let bases: Vec<_> = report.base_addrs.iter().map(|per_cube| per_cube[1]).collect();
    assert_eq!(bases, vec![Some(0), Some(16), Some(48)]);
    assert_eq!(report.base_addrs[2][0], Some(48));

    let loaded: Vec<_> = report
        .events
        .iter()
        .filter_map(|e| match e {
            LoadEvent::GroupLoaded {
                cube, base_addr, ..
            } if cube.raw() == 1 => *base_addr,
            _ => None,
        })
        .collect();
    assert_eq!(loaded, vec![0, 16, 48]);
}

#[test]
fn test_remapped_volume_needs_no_segment() {
    let pack = packed();
    let addressing = Addressing::Remapped { handle: 3 };
    let staged = stage(&pack.groups, &stage_options(addressing)).unwrap();

    let report = run(&pack.payload, 3, addressing, &staged, &sim_options(0b1, 7)).unwrap();
    assert_eq!(report.stream(CubeId::new(0).unwrap()), expected(&pack).as_slice());
    assert!(report.all_verified());
}

#[test]
fn test_slow_drain_still_completes() {
    let pack = packed();
    let addressing = Addressing::Virtual(Segment::One);
    let staged = stage(&pack.groups, &stage_options(addressing)).unwrap();

    let fast = run(&pack.payload, 1, addressing, &staged, &sim_options(0b1, 64)).unwrap();
    let slow = run(&pack.payload, 1, addressing, &staged, &sim_options(0b1, 1)).unwrap();

    assert_eq!(fast.streams, slow.streams);
    assert!(slow.steps > fast.steps);
}

#[test]
fn test_corruption_is_reported_not_hidden() {
    let mut pack = packed();
    let addressing = Addressing::Virtual(Segment::Zero);
    let staged = stage(&pack.groups, &stage_options(addressing)).unwrap();
    let at = pack.groups[1].data_offset() as usize;
    pack.payload[at] ^= 0xFF;

    let report = run(&pack.payload, 1, addressing, &staged, &sim_options(0b1, 16)).unwrap();

    assert!(!report.all_verified());
    let verified: Vec<_> = report
        .events
        .iter()
        .filter_map(|e| match e {
            LoadEvent::GroupLoaded { verified, .. } => Some(*verified),
            _ => None,
        })
        .collect();
    assert_eq!(verified, vec![true, false, true]);
}

#[test]
fn test_bad_runs_are_refused() {
    let pack = packed();
    let addressing = Addressing::Virtual(Segment::Zero);
    let staged = stage(&pack.groups, &stage_options(addressing)).unwrap();

    assert!(run(&pack.payload, 1, addressing, &staged, &sim_options(0, 16)).is_err());
    assert!(run(&pack.payload, 1, addressing, &staged, &sim_options(0b1, 0)).is_err());
    assert!(run(&pack.payload, 0, addressing, &staged, &sim_options(0b1, 16)).is_err());

    let mut short = sim_options(0b1, 16);
    short.max_steps = 2;
    assert!(run(&pack.payload, 1, addressing, &staged, &short).is_err());

    let mut unbound = sim_options(0b1, 16);
    unbound.slots = BoundSlots::NONE;
    assert!(run(&pack.payload, 1, addressing, &staged, &unbound).is_err());
}
