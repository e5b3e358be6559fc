// SPDX-License-Identifier: CEPL-1.0
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counts presented frames and reports a rate once per second.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frames: u32,
    window_start: Instant,
    last: Option<u32>,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
            last: None,
        }
    }

    /// Records one frame. Returns the frame count of the window that just
    /// closed, if a full second has elapsed.
    pub fn frame(&mut self, now: Instant) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);
        self.poll(now)
    }

    /// Closes the current window without counting a frame (skipped ticks).
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        if now.duration_since(self.window_start) < WINDOW {
            return None;
        }
        let fps = self.frames;
        self.frames = 0;
        self.window_start = now;
        self.last = Some(fps);
        Some(fps)
    }

    pub fn last(&self) -> Option<u32> {
        self.last
    }

    pub fn reset(&mut self, now: Instant) {
        self.frames = 0;
        self.window_start = now;
    }
}
