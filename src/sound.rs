use glam::Vec2;

use crate::types::{NoiseCategory, NoiseEvent};

/// Single-slot noise channel. A new event replaces the previous one whether or
/// not anyone heard it.
#[derive(Clone, Debug, Default)]
pub struct SoundEventBus {
    latest: Option<NoiseEvent>,
}

impl SoundEventBus {
    pub fn publish(&mut self, position: Vec2, category: NoiseCategory, timestamp_ms: u64) {
        self.latest = Some(NoiseEvent {
            position,
            category,
            timestamp_ms,
        });
    }

    pub fn latest(&self) -> Option<&NoiseEvent> {
        self.latest.as_ref()
    }
}

/// Per-listener watermark over a [`SoundEventBus`].
#[derive(Clone, Debug, Default)]
pub struct NoiseListener {
    watermark_ms: u64,
}

impl NoiseListener {
    pub fn watermark_ms(&self) -> u64 {
        self.watermark_ms
    }

    /// Consumes the latest event if it is newer than the watermark and within
    /// `hearing_range` of `position`. An out-of-range event stays unconsumed
    /// and is checked again on the next poll.
    pub fn poll(&mut self, bus: &SoundEventBus, position: Vec2, hearing_range: f32) -> Option<NoiseEvent> {
        let event = bus.latest()?;
        if event.timestamp_ms <= self.watermark_ms {
            return None;
        }
        if event.position.distance(position) >= hearing_range {
            return None;
        }
        self.watermark_ms = event.timestamp_ms;
        Some(*event)
    }
}
