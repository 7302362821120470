// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport speaking COBS-framed postcard to the firmware.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serialport::SerialPort;

use tilestream_common::protocol::{Command, Response};

const BAUD_RATE: u32 = 115_200;
const DEFAULT_TIMEOUT_MS: u64 = 2_000;
const READ_TIMEOUT: Duration = Duration::from_millis(50);
const MAX_FRAME: usize = 1024;

pub struct Transport {
    port: Box<dyn SerialPort>,
    port_name: String,
    rx: Vec<u8>,
}

impl Transport {
    pub fn new(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .with_context(|| format!("Failed to open {}", port_name))?;

        Ok(Self {
            port,
            port_name: port_name.to_string(),
            rx: Vec::with_capacity(MAX_FRAME),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn send(&mut self, cmd: &Command) -> Result<()> {
        let frame = postcard::to_stdvec_cobs(cmd).context("Failed to encode command")?;
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Receive the next frame of any kind, or `None` once `timeout` elapses.
    pub fn recv(&mut self, timeout: Duration) -> Result<Option<Response>> {
        let deadline = Instant::now() + timeout;
        let mut byte = [0u8; 1];

        while Instant::now() < deadline {
            match self.port.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {
                    if byte[0] != 0x00 {
                        if self.rx.len() == MAX_FRAME {
                            self.rx.clear();
                            bail!("Frame exceeds {} bytes", MAX_FRAME);
                        }
                        self.rx.push(byte[0]);
                        continue;
                    }
                    if self.rx.is_empty() {
                        continue;
                    }
                    let mut frame = std::mem::take(&mut self.rx);
                    let response = postcard::from_bytes_cobs::<Response>(&mut frame)
                        .context("Failed to decode response")?;
                    return Ok(Some(response));
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Send a command and wait for its reply, skipping unsolicited frames.
    pub fn send_recv(&mut self, cmd: &Command) -> Result<Response> {
        self.send_recv_timeout(cmd, DEFAULT_TIMEOUT_MS)
    }

    pub fn send_recv_timeout(&mut self, cmd: &Command, timeout_ms: u64) -> Result<Response> {
        self.send(cmd)?;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv(remaining)? {
                Some(Response::AssetData { .. } | Response::Load(_)) => continue,
                Some(response) => return Ok(response),
                None => bail!("Timed out waiting for response to {:?}", cmd),
            }
        }
    }
}
