// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host link service: brings USB up on request, then serves commands.

use crate::{host, host::HostState, peripherals, peripherals::Peripherals, services::usb};
use core::cell::Cell;
use embedded_hal::digital::OutputPin;
use tilestream_common::protocol::Response;
use tilestream_common::service::{Event, Service, ServiceContext};

pub struct HostLinkService {
    state: Cell<HostState>,
}

/// External event observed by the service-level FSM.
#[derive(Clone, Copy)]
enum FsmEvent {
    Tick,
    LinkRequested,
}

/// Side effect to execute after a state transition.
#[derive(Clone, Copy)]
enum FsmAction {
    None,
    InitializeUsb,
    ServeHost,
}

/// Result of one pure FSM transition step.
#[derive(Clone, Copy)]
struct FsmStep {
    next_state: HostState,
    action: FsmAction,
}

impl HostLinkService {
    pub fn new() -> Self {
        Self {
            state: Cell::new(HostState::Standby),
        }
    }

    fn consume_link_request(ctx: &mut ServiceContext<Peripherals>) -> bool {
        ctx.events
            .consume(|event| matches!(event, Event::RequestLink))
            > 0
    }

    fn initialize_usb(ctx: &mut ServiceContext<Peripherals>) -> HostState {
        let Some(mut usb) = ctx.peripherals.usb.take() else {
            defmt::warn!("Host: USB peripheral unavailable during initialization");
            return HostState::Standby;
        };

        let usb_bus = usb_device::class_prelude::UsbBusAllocator::new(
            rp2040_hal::usb::UsbBus::new(usb.regs, usb.dpram, usb.clock, true, &mut usb.resets),
        );

        peripherals::store_usb_bus(usb_bus);
        let Some(usb_bus) = peripherals::usb_bus_ref() else {
            return HostState::Standby;
        };

        match crate::usb_transport::UsbTransport::new(usb_bus) {
            Ok(transport) => {
                defmt::println!("USB CDC initialized");
                ctx.peripherals.led_pin.set_high().ok();
                usb::store_transport(transport);
                HostState::Ready
            }
            Err(e) => {
                defmt::error!("Failed to initialize USB transport: {:?}", e);
                HostState::Standby
            }
        }
    }

    /// Forward loader events, then handle at most one queued command.
    fn serve_host(ctx: &mut ServiceContext<Peripherals>) {
        // Events raised while no host is attached are dropped
        ctx.events.take(
            |event| match *event {
                Event::Load(load) => Some(load),
                _ => None,
            },
            |load| {
                usb::with_configured_transport(|transport| {
                    let _ = transport.send(&Response::Load(load));
                });
            },
        );

        let Some(cmd) = usb::pop_command() else {
            return;
        };

        let t_start = ctx.peripherals.timer.get_counter().ticks();
        let engine = &mut ctx.peripherals.engine;
        let events = ctx.events;
        if usb::with_transport(|transport| host::dispatch_command(transport, engine, events, cmd))
            .is_none()
        {
            defmt::error!("Host: with_transport returned None!");
            return;
        }

        let t_end = ctx.peripherals.timer.get_counter().ticks();
        defmt::trace!("Host: command took {} us", t_end - t_start);
    }

    fn transition(state: HostState, event: FsmEvent) -> FsmStep {
        match (state, event) {
            (HostState::Standby, FsmEvent::LinkRequested) => FsmStep {
                next_state: HostState::InitializingUsb,
                action: FsmAction::None,
            },
            (HostState::Standby, FsmEvent::Tick) => FsmStep {
                next_state: HostState::Standby,
                action: FsmAction::None,
            },
            (HostState::InitializingUsb, _) => FsmStep {
                next_state: HostState::InitializingUsb,
                action: FsmAction::InitializeUsb,
            },
            (HostState::Ready, _) => FsmStep {
                next_state: HostState::Ready,
                action: FsmAction::ServeHost,
            },
        }
    }

    fn detect_event(ctx: &mut ServiceContext<Peripherals>, state: HostState) -> FsmEvent {
        match state {
            HostState::Standby if Self::consume_link_request(ctx) => FsmEvent::LinkRequested,
            _ => FsmEvent::Tick,
        }
    }

    fn run_action(
        ctx: &mut ServiceContext<Peripherals>,
        state: HostState,
        action: FsmAction,
    ) -> HostState {
        match action {
            FsmAction::None => state,
            FsmAction::InitializeUsb => Self::initialize_usb(ctx),
            FsmAction::ServeHost => {
                Self::serve_host(ctx);
                state
            }
        }
    }

    fn step(ctx: &mut ServiceContext<Peripherals>, state: HostState) -> HostState {
        let event = Self::detect_event(ctx, state);
        let fsm_step = Self::transition(state, event);
        if matches!(event, FsmEvent::LinkRequested) {
            defmt::println!("Host link requested");
        }
        Self::run_action(ctx, fsm_step.next_state, fsm_step.action)
    }
}

impl Default for HostLinkService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Peripherals> for HostLinkService {
    fn process(&self, ctx: &mut ServiceContext<Peripherals>) {
        let state = self.state.get();
        let new_state = Self::step(ctx, state);

        if new_state != state {
            defmt::println!("Host: State: {:?} -> {:?}", state, new_state);
        }
        self.state.set(new_state);
    }
}
