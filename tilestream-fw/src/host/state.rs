// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

/// Host link state machine states.
#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum HostState {
    /// Waiting for a link request.
    Standby,
    /// Initializing USB transport.
    InitializingUsb,
    /// Link is up and commands are accepted.
    Ready,
}
