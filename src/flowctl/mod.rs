//! Stream-time calculator and per-subscriber write-ahead normalizer.

use std::time::Duration;

use crate::tag::{Tag, TagKind};

/// Tracks `media_time_ms` (the media's internal clock) and
/// `stream_time_ms` (the walltime-coupled reading derived from it).
#[derive(Debug, Default)]
pub struct StreamTimeCalculator {
    media_time_ms: u64,
    stream_time_ms: u64,
}

impl StreamTimeCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_time_ms(&self) -> u64 {
        self.stream_time_ms
    }

    /// Feed one tag, updating and returning the new `stream_time_ms`.
    pub fn on_tag(&mut self, tag: &Tag) -> u64 {
        match tag.kind {
            TagKind::SourceStarted | TagKind::SeekPerformed => {
                // The media/stream offset resets; the next ordinary tag's
                // delta is computed against this new media timestamp.
                self.media_time_ms = tag.timestamp_ms as u64;
            }
            TagKind::SegmentStarted => {
                self.stream_time_ms = tag.timestamp_ms as u64;
                self.media_time_ms = tag.timestamp_ms as u64;
            }
            TagKind::BootstrapBegin
            | TagKind::BootstrapEnd
            | TagKind::SourceEnded
            | TagKind::EndOfStream { .. }
            | TagKind::ContainerHeader => {
                // Administrative kinds never advance either counter.
            }
            _ => {
                let ts = tag.timestamp_ms as u64;
                let delta = ts.saturating_sub(self.media_time_ms);
                self.media_time_ms = ts;
                self.stream_time_ms += delta;
            }
        }
        self.stream_time_ms
    }
}

/// What a caller should do after feeding a tag to a [`Normalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerAction {
    /// No flow-control action needed.
    None,
    /// Pause the upstream now; resume after the given delay.
    PauseAndScheduleResume(Duration),
    /// Resume the upstream now (the scheduled delay above has elapsed).
    Resume,
}

/// Per-subscriber write-ahead flow control. Decouples the decision ("should
/// we pause/resume") from the mechanism (an actual `tokio::time::sleep` or
/// controller call), which the caller drives.
pub struct Normalizer {
    write_ahead_ms: u64,
    /// `now - anchor` is how much wall-clock time has elapsed since
    /// `stream_time_ms` was last `0`.
    anchor_offset_ms: u64,
    paused: bool,
}

impl Normalizer {
    pub fn new(write_ahead_ms: u64) -> Self {
        Self {
            write_ahead_ms,
            anchor_offset_ms: 0,
            paused: false,
        }
    }

    /// Rearm the anchor on `source_started`/`seek_performed`, per the fixed
    /// open question: `now - stream_time_ms + write_ahead_ms`.
    pub fn rearm(&mut self, now_ms: u64, stream_time_ms: u64) {
        self.anchor_offset_ms = now_ms
            .saturating_sub(stream_time_ms)
            .saturating_add(self.write_ahead_ms);
        self.paused = false;
    }

    /// Evaluate flow control for the current `stream_time_ms` at wall time
    /// `now_ms`, given whether the upstream controller can be paused.
    pub fn evaluate(&mut self, stream_time_ms: u64, now_ms: u64, controller_supports_pause: bool) -> NormalizerAction {
        let elapsed = now_ms.saturating_sub(self.anchor_offset_ms);
        let lead = stream_time_ms.saturating_sub(elapsed);

        if !self.paused && lead > self.write_ahead_ms && controller_supports_pause {
            self.paused = true;
            let delay = lead - self.write_ahead_ms + self.write_ahead_ms / 2;
            return NormalizerAction::PauseAndScheduleResume(Duration::from_millis(delay));
        }
        NormalizerAction::None
    }

    /// Caller invokes this when a previously-scheduled resume delay elapses.
    pub fn resume(&mut self) -> NormalizerAction {
        self.paused = false;
        NormalizerAction::Resume
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{FlavourMask, TagAttributes};

    #[test]
    fn stream_time_advances_monotonically_with_media_tags() {
        let mut calc = StreamTimeCalculator::new();
        let t1 = Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 100);
        let t2 = Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 150);
        assert_eq!(calc.on_tag(&t1), 100);
        assert_eq!(calc.on_tag(&t2), 150);
    }

    #[test]
    fn administrative_kinds_do_not_advance_stream_time() {
        let mut calc = StreamTimeCalculator::new();
        calc.on_tag(&Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 100));
        let before = calc.stream_time_ms();
        calc.on_tag(&Tag::bootstrap_begin(FlavourMask::ALL));
        assert_eq!(calc.stream_time_ms(), before);
    }

    #[test]
    fn segment_started_advances_to_declared_timestamp() {
        let mut calc = StreamTimeCalculator::new();
        calc.on_tag(&Tag::new(TagKind::Aac, TagAttributes::AUDIO, FlavourMask::ALL, 50));
        calc.on_tag(&Tag::new(TagKind::SegmentStarted, TagAttributes::empty(), FlavourMask::ALL, 5000));
        assert_eq!(calc.stream_time_ms(), 5000);
    }

    #[test]
    fn normalizer_pauses_when_lead_exceeds_write_ahead() {
        let mut norm = Normalizer::new(1000);
        norm.rearm(0, 0);
        let action = norm.evaluate(5000, 0, true);
        assert!(matches!(action, NormalizerAction::PauseAndScheduleResume(_)));
        assert!(norm.is_paused());
    }

    #[test]
    fn normalizer_does_not_pause_without_pause_capable_controller() {
        let mut norm = Normalizer::new(1000);
        norm.rearm(0, 0);
        let action = norm.evaluate(5000, 0, false);
        assert_eq!(action, NormalizerAction::None);
    }
}
