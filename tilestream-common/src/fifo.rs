// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Per-cube asset streaming FIFO.
//!
//! A single-producer/single-consumer byte ring. The loader is the producer and
//! only ever advances `tail`; the transmission path is the consumer and only
//! ever advances `head`. Data is never moved, only indices wrap.
//!
//! Both indices run over `0..2*N`, so an empty ring offers all `N` bytes and a
//! full one is still distinguishable from an empty one. The byte position is
//! the index modulo `N`.
//!
//! The producer writes straight into the live buffer and then publishes the new
//! `tail` once, with release ordering, so the consumer never sees a slot
//! before its bytes are in place.

use crate::abi::{CubeId, ASSET_FIFO_SIZE, NUM_CUBE_SLOTS};
use crate::error::{AssetError, BusError};
use crate::group::AssetGroupInfo;
use crate::memory::AssetBus;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct AssetFifo<const N: usize = ASSET_FIFO_SIZE> {
    buf: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: the producer and consumer handles obtained through `split` touch
// disjoint regions of `buf`, and hand regions over via the release/acquire
// pair on `head` and `tail`.
unsafe impl<const N: usize> Sync for AssetFifo<N> {}

impl<const N: usize> AssetFifo<N> {
    const NONZERO: () = assert!(N > 0, "FIFO capacity must be nonzero");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO;
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes currently buffered, as seen from outside either handle.
    pub fn len(&self) -> usize {
        distance(self.head.load(Ordering::Acquire), self.tail.load(Ordering::Acquire), N)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into the producer and consumer halves.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let fifo: &Self = self;
        (Producer { fifo }, Consumer { fifo })
    }

    fn slot_ptr(&self, pos: usize) -> *mut u8 {
        debug_assert!(pos < N);
        // SAFETY: pos < N keeps the pointer inside the array.
        unsafe { (self.buf.get() as *mut u8).add(pos) }
    }
}

impl<const N: usize> Default for AssetFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn distance(head: usize, tail: usize, n: usize) -> usize {
    if tail >= head {
        tail - head
    } else {
        tail + 2 * n - head
    }
}

fn advance(index: usize, by: usize, n: usize) -> usize {
    let next = index + by;
    if next >= 2 * n {
        next - 2 * n
    } else {
        next
    }
}

fn position(index: usize, n: usize) -> usize {
    if index >= n {
        index - n
    } else {
        index
    }
}

/// Write side of an [`AssetFifo`].
pub struct Producer<'a, const N: usize = ASSET_FIFO_SIZE> {
    fifo: &'a AssetFifo<N>,
}

impl<const N: usize> Producer<'_, N> {
    pub fn write_available(&self) -> usize {
        let head = self.fifo.head.load(Ordering::Acquire);
        let tail = self.fifo.tail.load(Ordering::Relaxed);
        N - distance(head, tail, N)
    }

    /// Write `len` bytes (at most [`Self::write_available`]) in contiguous
    /// chunks. `fill` produces each chunk in place; if it fails, nothing is
    /// committed. Once every chunk is filled, `inspect` sees them in order and
    /// the new tail is published.
    fn write_chunks<E>(
        &mut self,
        len: usize,
        mut fill: impl FnMut(&mut [u8]) -> Result<(), E>,
        mut inspect: impl FnMut(&[u8]),
    ) -> Result<(), E> {
        debug_assert!(len <= self.write_available());
        let start = self.fifo.tail.load(Ordering::Relaxed);

        let mut tail = start;
        let mut remaining = len;
        while remaining > 0 {
            let pos = position(tail, N);
            let chunk = remaining.min(N - pos);
            // SAFETY: [pos, pos + chunk) lies in the free region the consumer
            // cannot read until `tail` is published below.
            let slot = unsafe { core::slice::from_raw_parts_mut(self.fifo.slot_ptr(pos), chunk) };
            fill(slot)?;
            remaining -= chunk;
            tail = advance(tail, chunk, N);
        }

        let mut index = start;
        let mut remaining = len;
        while remaining > 0 {
            let pos = position(index, N);
            let chunk = remaining.min(N - pos);
            // SAFETY: same region as above, now fully written and still unpublished.
            inspect(unsafe { core::slice::from_raw_parts(self.fifo.slot_ptr(pos), chunk) });
            remaining -= chunk;
            index = advance(index, chunk, N);
        }

        self.fifo.tail.store(tail, Ordering::Release);
        Ok(())
    }

    /// Copy as much of `data` as fits. Returns the number of bytes written.
    pub fn push_slice(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.write_available());
        let mut src = &data[..len];
        let written: Result<(), core::convert::Infallible> = self.write_chunks(
            len,
            |slot| {
                let (now, rest) = src.split_at(slot.len());
                slot.copy_from_slice(now);
                src = rest;
                Ok(())
            },
            |_| {},
        );
        match written {
            Ok(()) => len,
            Err(never) => match never {},
        }
    }

    /// Stream group data starting at `offset` into the FIFO.
    ///
    /// Returns the number of bytes transferred, limited by free space and by
    /// the data left in the group. `0` is not an error: either the group is
    /// exhausted or the consumer has not caught up yet.
    pub fn fetch_from_group<B: AssetBus + ?Sized>(
        &mut self,
        bus: &B,
        group: &AssetGroupInfo,
        offset: u32,
    ) -> Result<u32, AssetError> {
        self.fetch_from_group_with(bus, group, offset, |_| {})
    }

    /// Like [`Self::fetch_from_group`], handing every committed chunk to `inspect`.
    pub fn fetch_from_group_with<B: AssetBus + ?Sized>(
        &mut self,
        bus: &B,
        group: &AssetGroupInfo,
        offset: u32,
        inspect: impl FnMut(&[u8]),
    ) -> Result<u32, AssetError> {
        if offset >= group.data_size {
            return Ok(0);
        }

        // Bounded by N, so it fits in u32 whenever N does.
        let space = u32::try_from(self.write_available()).unwrap_or(u32::MAX);
        let actual = (group.data_size - offset).min(space);
        if actual == 0 {
            return Ok(0);
        }

        let mut src = offset;
        self.write_chunks(
            actual as usize,
            |slot: &mut [u8]| -> Result<(), BusError> {
                group.read_data(bus, src, slot)?;
                src += slot.len() as u32;
                Ok(())
            },
            inspect,
        )
        .map_err(|_| {
            diag!(
                "ASSET: Group 0x{:08x} unreadable at offset {}",
                group.va,
                src
            );
            AssetError::SourceUnreadable
        })?;

        Ok(actual)
    }
}

/// Read side of an [`AssetFifo`].
pub struct Consumer<'a, const N: usize = ASSET_FIFO_SIZE> {
    fifo: &'a AssetFifo<N>,
}

impl<const N: usize> Consumer<'_, N> {
    pub fn read_available(&self) -> usize {
        let head = self.fifo.head.load(Ordering::Relaxed);
        let tail = self.fifo.tail.load(Ordering::Acquire);
        distance(head, tail, N)
    }

    /// Longest contiguous run of readable bytes starting at `head`.
    pub fn peek(&self) -> &[u8] {
        let available = self.read_available();
        let pos = position(self.fifo.head.load(Ordering::Relaxed), N);
        let len = available.min(N - pos);
        // SAFETY: [pos, pos + len) has been published by the producer and is
        // not rewritten until `head` moves past it.
        unsafe { core::slice::from_raw_parts(self.fifo.slot_ptr(pos), len) }
    }

    /// Release `n` bytes back to the producer. Clamped to what is readable.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.read_available());
        let head = self.fifo.head.load(Ordering::Relaxed);
        self.fifo.head.store(advance(head, n, N), Ordering::Release);
    }

    /// Copy out and consume up to `dest.len()` bytes.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let mut done = 0;
        while done < dest.len() {
            let run = self.peek();
            if run.is_empty() {
                break;
            }
            let n = run.len().min(dest.len() - done);
            dest[done..done + n].copy_from_slice(&run[..n]);
            self.consume(n);
            done += n;
        }
        done
    }

    /// Hand up to `max` readable bytes to `send` and release them only if it
    /// succeeds. On error the bytes stay queued for the next attempt.
    pub fn transmit<E>(
        &mut self,
        max: usize,
        send: impl FnOnce(&[u8]) -> Result<(), E>,
    ) -> Result<usize, E> {
        let run = self.peek();
        let n = run.len().min(max);
        if n == 0 {
            return Ok(0);
        }
        send(&run[..n])?;
        self.consume(n);
        Ok(n)
    }

    pub fn pop(&mut self) -> Option<u8> {
        let byte = *self.peek().first()?;
        self.consume(1);
        Some(byte)
    }

    /// Drop everything currently buffered.
    pub fn clear(&mut self) {
        self.consume(self.read_available());
    }
}

/// One FIFO per cube, built once at startup.
pub struct CubeFifos<const N: usize = ASSET_FIFO_SIZE, const CUBES: usize = NUM_CUBE_SLOTS> {
    fifos: [AssetFifo<N>; CUBES],
}

impl<const N: usize, const CUBES: usize> CubeFifos<N, CUBES> {
    pub const fn new() -> Self {
        Self {
            fifos: [const { AssetFifo::new() }; CUBES],
        }
    }

    pub fn split(&mut self) -> (CubeProducers<'_, N, CUBES>, CubeConsumers<'_, N, CUBES>) {
        let fifos: &[AssetFifo<N>; CUBES] = &self.fifos;
        (CubeProducers { fifos }, CubeConsumers { fifos })
    }
}

impl<const N: usize, const CUBES: usize> Default for CubeFifos<N, CUBES> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer halves of every cube FIFO.
pub struct CubeProducers<'a, const N: usize = ASSET_FIFO_SIZE, const CUBES: usize = NUM_CUBE_SLOTS> {
    fifos: &'a [AssetFifo<N>; CUBES],
}

impl<const N: usize, const CUBES: usize> CubeProducers<'_, N, CUBES> {
    pub fn get(&mut self, cube: CubeId) -> Option<Producer<'_, N>> {
        self.fifos.get(cube.index()).map(|fifo| Producer { fifo })
    }
}

/// Consumer halves of every cube FIFO.
pub struct CubeConsumers<'a, const N: usize = ASSET_FIFO_SIZE, const CUBES: usize = NUM_CUBE_SLOTS> {
    fifos: &'a [AssetFifo<N>; CUBES],
}

impl<const N: usize, const CUBES: usize> CubeConsumers<'_, N, CUBES> {
    pub fn get(&mut self, cube: CubeId) -> Option<Consumer<'_, N>> {
        self.fifos.get(cube.index()).map(|fifo| Consumer { fifo })
    }

    /// Mask of cubes with bytes waiting.
    pub fn pending_mask(&self) -> u32 {
        self.fifos
            .iter()
            .enumerate()
            .filter(|(_, fifo)| !fifo.is_empty())
            .fold(0, |mask, (i, _)| mask | (1u32 << i))
    }
}
