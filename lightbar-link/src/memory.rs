//! In-memory link for dry runs and tests
//!
//! Keeps the last color written to each pixel and counts operations. Clones
//! share the same state, so a test can keep a handle while the controller
//! owns the link.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::error::LinkError;
use crate::types::{LedIndex, Rgb, LED_COUNT};
use crate::LedLink;

#[derive(Debug, Default)]
struct MemoryState {
    pixels: [Rgb; LED_COUNT],
    writes: usize,
    clears: usize,
    closed: bool,
    pending_failures: u32,
    failures_injected: u32,
}

/// Link that renders into a pixel buffer instead of a bus.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the buffer from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current color of every pixel.
    pub fn pixels(&self) -> [Rgb; LED_COUNT] {
        self.state().pixels
    }

    /// Number of successful `set_pixel` calls (a `set_all` counts once).
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    pub fn clears(&self) -> usize {
        self.state().clears
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Make the next `n` operations fail with a transient bus error.
    pub fn fail_next(&self, n: u32) {
        self.state().pending_failures = n;
    }

    pub fn failures_injected(&self) -> u32 {
        self.state().failures_injected
    }

    fn check(state: &mut MemoryState) -> Result<(), LinkError> {
        if state.closed {
            return Err(LinkError::Closed);
        }
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            state.failures_injected += 1;
            return Err(LinkError::Bus("injected fault".into()));
        }
        Ok(())
    }
}

impl LedLink for MemoryLink {
    fn set_pixel(&mut self, index: LedIndex, color: Rgb) -> Result<(), LinkError> {
        let mut state = self.state();
        Self::check(&mut state)?;
        match index {
            LedIndex::Pixel(i) => {
                let slot = state
                    .pixels
                    .get_mut(i as usize)
                    .ok_or(LinkError::InvalidIndex(i as usize))?;
                *slot = color;
            }
            LedIndex::All => state.pixels = [color; LED_COUNT],
        }
        state.writes += 1;
        trace!(?index, ?color, "memory link write");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), LinkError> {
        let mut state = self.state();
        Self::check(&mut state)?;
        state.pixels = [Rgb::BLACK; LED_COUNT];
        state.clears += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        self.state().closed = true;
        Ok(())
    }
}
