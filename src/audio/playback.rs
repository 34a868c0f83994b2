//! Gapless scheduling of inbound audio.
//!
//! [`PlaybackScheduler`] owns a timeline measured in output frames. Each
//! decoded chunk is placed right after the previous one (or at the current
//! clock if playback has caught up), so chunks never overlap and never
//! reorder. The output device pulls rendered audio from the same timeline,
//! which advances the clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::audio::codec::{ChunkDecoder, EncodedChunk};
use crate::audio::frame::AudioFrame;
use crate::live::CallError;
use crate::pipeline::Pullable;

/// Where a chunk landed on the output timeline, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledUnit {
    pub id: u64,
    pub start_at: u64,
    pub duration: u64,
}

impl ScheduledUnit {
    pub fn end(&self) -> u64 {
        self.start_at + self.duration
    }
}

struct PlaybackUnit {
    id: u64,
    start_at: u64,
    samples: Vec<f32>,
}

impl PlaybackUnit {
    fn end(&self) -> u64 {
        self.start_at + self.samples.len() as u64
    }
}

#[derive(Default)]
struct Timeline {
    clock: u64,
    next_free: u64,
    active: VecDeque<PlaybackUnit>,
    next_id: u64,
}

/// Schedules decoded chunks back to back and renders them on pull.
///
/// Cloning shares the timeline: the call driver enqueues on one clone while
/// the output stream pulls from another.
#[derive(Clone)]
pub struct PlaybackScheduler {
    timeline: Arc<Mutex<Timeline>>,
    decoder: ChunkDecoder,
    sample_rate: u32,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline::default())),
            decoder: ChunkDecoder::new(sample_rate),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decodes `chunk` and schedules it after everything already queued.
    ///
    /// A malformed chunk is returned as an error and leaves the timeline
    /// untouched.
    pub fn enqueue(&self, chunk: &EncodedChunk) -> Result<ScheduledUnit, CallError> {
        let frame = self.decoder.decode(chunk)?;
        Ok(self.schedule(frame))
    }

    /// Places an already decoded frame on the timeline.
    pub fn schedule(&self, frame: AudioFrame) -> ScheduledUnit {
        let samples = frame.into_inner();
        let mut timeline = self.timeline.lock().unwrap();

        let id = timeline.next_id;
        timeline.next_id += 1;

        let start_at = timeline.clock.max(timeline.next_free);
        let duration = samples.len() as u64;
        timeline.next_free = start_at + duration;

        if duration > 0 {
            timeline.active.push_back(PlaybackUnit {
                id,
                start_at,
                samples,
            });
        }

        debug!("Scheduled unit {} at frame {} for {} frames", id, start_at, duration);
        ScheduledUnit {
            id,
            start_at,
            duration,
        }
    }

    /// Drops every scheduled unit. The next chunk starts at the current clock.
    pub fn reset(&self) {
        let mut timeline = self.timeline.lock().unwrap();
        let dropped = timeline.active.len();
        timeline.active.clear();
        timeline.next_free = 0;
        if dropped > 0 {
            debug!("Playback reset, dropped {} units", dropped);
        }
    }

    /// Resets and rewinds the clock, as for a fresh output device.
    pub fn teardown(&self) {
        let mut timeline = self.timeline.lock().unwrap();
        timeline.active.clear();
        timeline.next_free = 0;
        timeline.clock = 0;
    }

    /// Current output position in frames.
    pub fn clock(&self) -> u64 {
        self.timeline.lock().unwrap().clock
    }

    /// Number of units not yet fully rendered.
    pub fn active_units(&self) -> usize {
        self.timeline.lock().unwrap().active.len()
    }

    /// Ids of units not yet fully rendered, in start order.
    pub fn active_ids(&self) -> Vec<u64> {
        self.timeline
            .lock()
            .unwrap()
            .active
            .iter()
            .map(|u| u.id)
            .collect()
    }
}

impl Pullable<AudioFrame> for PlaybackScheduler {
    /// Renders the next `len` frames. Gaps are silence, so this never
    /// returns `None`.
    fn pull(&self, len: usize) -> Option<AudioFrame> {
        let mut timeline = self.timeline.lock().unwrap();
        let start = timeline.clock;
        let end = start + len as u64;
        let mut out = vec![0.0f32; len];

        for unit in timeline.active.iter() {
            if unit.end() <= start || unit.start_at >= end {
                continue;
            }
            let from = unit.start_at.max(start);
            let to = unit.end().min(end);
            for t in from..to {
                out[(t - start) as usize] += unit.samples[(t - unit.start_at) as usize];
            }
        }

        timeline.clock = end;
        timeline.active.retain(|u| u.end() > end);
        drop(timeline);

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
        AudioFrame::new(self.sample_rate, out).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::encode_to_transport;
    use crate::audio::pcm::pcm_to_bytes;

    fn chunk(pcm: &[i16]) -> EncodedChunk {
        EncodedChunk::pcm(24_000, encode_to_transport(&pcm_to_bytes(pcm)))
    }

    #[test]
    fn test_units_never_overlap() {
        let scheduler = PlaybackScheduler::new(24_000);

        let a = scheduler.enqueue(&chunk(&[0; 100])).unwrap();
        let b = scheduler.enqueue(&chunk(&[0; 50])).unwrap();
        let c = scheduler.enqueue(&chunk(&[0; 200])).unwrap();

        assert_eq!((a.start_at, a.duration), (0, 100));
        assert_eq!(b.start_at, a.end());
        assert_eq!(c.start_at, b.end());
        assert_eq!(scheduler.active_ids(), vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_late_chunk_starts_at_clock() {
        let scheduler = PlaybackScheduler::new(24_000);
        scheduler.enqueue(&chunk(&[0; 100])).unwrap();

        scheduler.pull(500);
        assert_eq!(scheduler.active_units(), 0);

        let unit = scheduler.enqueue(&chunk(&[0; 10])).unwrap();
        assert_eq!(unit.start_at, 500);
    }

    #[test]
    fn test_pull_renders_in_order_with_trailing_silence() {
        let scheduler = PlaybackScheduler::new(24_000);
        scheduler.enqueue(&chunk(&[16384; 4])).unwrap();
        scheduler.enqueue(&chunk(&[8192; 4])).unwrap();

        let frame = scheduler.pull(10).unwrap();
        assert_eq!(frame.sample_rate(), 24_000);
        assert_eq!(
            frame.samples(),
            &[0.5, 0.5, 0.5, 0.5, 0.25, 0.25, 0.25, 0.25, 0.0, 0.0]
        );
        assert_eq!(scheduler.clock(), 10);
    }

    #[test]
    fn test_pull_spanning_unit_boundary_keeps_remainder() {
        let scheduler = PlaybackScheduler::new(24_000);
        scheduler.enqueue(&chunk(&[16384; 6])).unwrap();

        assert_eq!(scheduler.pull(4).unwrap().samples(), &[0.5; 4]);
        assert_eq!(scheduler.active_units(), 1);
        assert_eq!(scheduler.pull(4).unwrap().samples(), &[0.5, 0.5, 0.0, 0.0]);
        assert_eq!(scheduler.active_units(), 0);
    }

    #[test]
    fn test_reset_drops_units_and_restarts_at_clock() {
        let scheduler = PlaybackScheduler::new(24_000);
        scheduler.enqueue(&chunk(&[16384; 1000])).unwrap();
        scheduler.enqueue(&chunk(&[16384; 1000])).unwrap();

        scheduler.pull(300);
        scheduler.reset();
        assert_eq!(scheduler.active_units(), 0);
        assert_eq!(scheduler.pull(5).unwrap().samples(), &[0.0; 5]);

        let unit = scheduler.enqueue(&chunk(&[0; 10])).unwrap();
        assert_eq!(unit.start_at, 305);
        assert_eq!(scheduler.active_units(), 1);
    }

    #[test]
    fn test_malformed_chunk_schedules_nothing() {
        let scheduler = PlaybackScheduler::new(24_000);
        let odd = EncodedChunk::pcm(24_000, encode_to_transport(&[1, 2, 3]));

        assert!(matches!(
            scheduler.enqueue(&odd),
            Err(CallError::MalformedPayload(_))
        ));
        assert_eq!(scheduler.active_units(), 0);

        let unit = scheduler.enqueue(&chunk(&[0; 4])).unwrap();
        assert_eq!(unit.start_at, 0);
    }

    #[test]
    fn test_empty_chunk_is_not_tracked() {
        let scheduler = PlaybackScheduler::new(24_000);
        let unit = scheduler.enqueue(&chunk(&[])).unwrap();

        assert_eq!(unit.duration, 0);
        assert_eq!(scheduler.active_units(), 0);
    }

    #[test]
    fn test_teardown_rewinds_clock() {
        let scheduler = PlaybackScheduler::new(24_000);
        scheduler.enqueue(&chunk(&[0; 100])).unwrap();
        scheduler.pull(40);

        scheduler.teardown();
        assert_eq!(scheduler.clock(), 0);
        assert_eq!(scheduler.active_units(), 0);
        assert_eq!(scheduler.enqueue(&chunk(&[0; 4])).unwrap().start_at, 0);
    }

    #[test]
    fn test_clones_share_timeline() {
        let scheduler = PlaybackScheduler::new(24_000);
        let output = scheduler.clone();

        scheduler.enqueue(&chunk(&[16384; 2])).unwrap();
        assert_eq!(output.pull(2).unwrap().samples(), &[0.5, 0.5]);
        assert_eq!(scheduler.clock(), 2);
    }
}
