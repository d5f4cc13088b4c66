// History slot for the temporal shadow filter.
// One slot per viewport; it holds last frame's *filtered* shadow.

use crate::error::Error;
use crate::types::{HistoryBuffer, NO_SHADOW, Resolution};
use log::info;

/// Reuse `slot` when it already has `resolution`, otherwise drop it and
/// hand back a fresh buffer cleared to full transmittance.
pub fn reallocate_history(
    slot: Option<HistoryBuffer>,
    resolution: Resolution,
) -> Result<HistoryBuffer, Error> {
    match slot {
        Some(buffer) if buffer.resolution == resolution => Ok(buffer),
        stale => {
            // Release before allocating so two histories never coexist.
            drop(stale);
            HistoryBuffer::try_filled(resolution, NO_SHADOW)
        }
    }
}

/// Previous-frame shadow plus the resolution it was allocated at.
#[derive(Debug, Default)]
pub struct CompositorState {
    prev_shadow: Option<HistoryBuffer>,
    prev_resolution: Resolution,
}

impl CompositorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a history buffer of exactly `resolution` exists.
    /// Does nothing (and keeps the contents) when it already does.
    /// A zero-sized request is refused before the current history is touched.
    pub fn ensure_history_buffer(&mut self, resolution: Resolution) -> Result<(), Error> {
        if resolution.is_empty() {
            return Err(Error::InvalidResolution(resolution));
        }
        if self.prev_shadow.is_some() && self.prev_resolution == resolution {
            return Ok(());
        }

        let previous = self.prev_resolution;
        // The old buffer is released before the new one is allocated; if that
        // allocation fails the slot stays empty and the tag goes back to the sentinel.
        self.prev_resolution = Resolution::UNINITIALIZED;
        let buffer = reallocate_history(self.prev_shadow.take(), resolution)?;
        self.prev_shadow = Some(buffer);
        self.prev_resolution = resolution;

        if previous == Resolution::UNINITIALIZED {
            info!("allocated shadow history at {resolution}");
        } else {
            info!("reallocated shadow history {previous} -> {resolution}");
        }
        Ok(())
    }

    pub fn history(&self) -> Option<&HistoryBuffer> {
        self.prev_shadow.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut HistoryBuffer> {
        self.prev_shadow.as_mut()
    }

    /// `(0, 0)` until the first allocation.
    pub fn resolution(&self) -> Resolution {
        self.prev_resolution
    }

    pub fn release(&mut self) {
        self.prev_shadow = None;
        self.prev_resolution = Resolution::UNINITIALIZED;
    }
}
