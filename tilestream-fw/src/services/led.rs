// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! LED service for status indication.

use crate::peripherals::Peripherals;
use core::cell::Cell;
use embedded_hal::digital::OutputPin;
use tilestream_common::service::{Event, Service, ServiceContext};

/// LED state machine
#[derive(Clone, Copy)]
enum LedState {
    On { since_us: u64 },
    Off { since_us: u64 },
}

/// Service that blinks the LED; faster while loading, fastest after an abort.
pub struct LedBlinkService {
    state: Cell<LedState>,
    aborted: Cell<bool>,
}

const IDLE_PERIOD_US: u64 = 500_000;
const LOADING_PERIOD_US: u64 = 100_000;
const ABORTED_PERIOD_US: u64 = 50_000;

impl LedBlinkService {
    pub fn new() -> Self {
        Self {
            state: Cell::new(LedState::Off { since_us: 0 }),
            aborted: Cell::new(false),
        }
    }

    fn period(&self, ctx: &mut ServiceContext<Peripherals>) -> u64 {
        if ctx
            .events
            .consume(|event| matches!(event, Event::UnitAborted(_)))
            > 0
        {
            self.aborted.set(true);
        }

        let loading = !ctx.peripherals.engine.loader.is_idle();
        if loading {
            // A new load clears the abort indication
            self.aborted.set(false);
        }

        match (self.aborted.get(), loading) {
            (true, _) => ABORTED_PERIOD_US,
            (false, true) => LOADING_PERIOD_US,
            (false, false) => IDLE_PERIOD_US,
        }
    }
}

impl Service<Peripherals> for LedBlinkService {
    fn process(&self, ctx: &mut ServiceContext<Peripherals>) {
        let period = self.period(ctx);
        let now = ctx.peripherals.timer.get_counter().ticks();

        match self.state.get() {
            LedState::On { since_us } => {
                if now - since_us >= period {
                    ctx.peripherals.led_pin.set_low().ok();
                    self.state.set(LedState::Off { since_us: now });
                }
            }
            LedState::Off { since_us } => {
                if now - since_us >= period {
                    ctx.peripherals.led_pin.set_high().ok();
                    self.state.set(LedState::On { since_us: now });
                }
            }
        }
    }
}
