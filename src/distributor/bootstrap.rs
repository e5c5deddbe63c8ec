//! Per-distributor bootstrapper state: the minimum tag sequence a joining
//! subscriber needs to begin rendering from the live point.

use crate::tag::{FlavourMask, Tag, TagKind};

/// Sticky state a [`super::Distributor`] accumulates from the tags it has
/// seen, replayed to every subscriber that joins mid-stream.
#[derive(Default)]
pub struct Bootstrapper {
    started_stack: Vec<(String, FlavourMask)>,
    metadata: Option<Tag>,
    cue_points: Option<Tag>,
    avc_header: Option<Tag>,
    aac_header: Option<Tag>,
    moov: Option<Tag>,
    media_buffer: Vec<Tag>,
    keep_media: bool,
}

impl Bootstrapper {
    pub fn new(keep_media: bool) -> Self {
        Self {
            keep_media,
            ..Self::default()
        }
    }

    /// Feed one live tag into the bootstrapper's sticky state. Lifecycle
    /// markers created by the distributor itself (`bootstrap_begin`/`end`)
    /// are never passed here.
    pub fn process_tag(&mut self, tag: &Tag) {
        match tag.kind {
            TagKind::SourceStarted => {
                let name = tag.source_name().unwrap_or_default();
                self.started_stack.push((name, tag.flavour_mask));
                self.media_buffer.clear();
                self.avc_header = None;
                self.aac_header = None;
            }
            TagKind::SourceEnded => {
                let name = tag.source_name().unwrap_or_default();
                if let Some(pos) = self.started_stack.iter().rposition(|(n, _)| *n == name) {
                    self.started_stack.remove(pos);
                }
                self.media_buffer.clear();
                self.avc_header = None;
                self.aac_header = None;
            }
            TagKind::MediaInfo => {
                if tag.media_info.as_ref().is_some_and(|info| info.moov.is_some()) {
                    self.set_moov(tag.clone());
                } else {
                    self.metadata = Some(tag.clone());
                }
            }
            TagKind::CuePoints => self.cue_points = Some(tag.clone()),
            TagKind::Flv | TagKind::F4v => {
                if tag.is_avc_header() {
                    self.avc_header = Some(tag.clone());
                } else if tag.is_aac_header() {
                    self.aac_header = Some(tag.clone());
                } else if self.keep_media {
                    self.accumulate_media(tag.clone());
                }
            }
            TagKind::Ts | TagKind::Mp3 | TagKind::Aac => {
                if self.keep_media {
                    self.accumulate_media(tag.clone());
                }
            }
            _ => {}
        }
    }

    fn accumulate_media(&mut self, tag: Tag) {
        if tag.is_keyframe() {
            self.media_buffer.clear();
            self.media_buffer.push(tag);
        } else if !self.media_buffer.is_empty() {
            self.media_buffer.push(tag);
        }
        // If the buffer is empty and the tag is not a keyframe, drop it: no
        // partial GOP can be replayed to a joining subscriber.
    }

    /// The tag sequence to deliver to a subscriber joining now: all of this
    /// bootstrapper's sticky state framed by `bootstrap_begin`/`bootstrap_end`.
    /// `rebase_to_ms`, if given, re-timestamps every tag to that value.
    pub fn play_at_begin(&self, mask: FlavourMask, rebase_to_ms: Option<u32>) -> Vec<Tag> {
        let mut out = vec![Tag::bootstrap_begin(mask)];

        for (name, source_mask) in &self.started_stack {
            out.push(Tag::source_started(name.clone(), *source_mask));
        }
        for sticky in [&self.metadata, &self.cue_points, &self.avc_header, &self.aac_header, &self.moov] {
            if let Some(tag) = sticky {
                out.push(tag.clone());
            }
        }
        out.extend(self.media_buffer.iter().cloned());

        out.push(Tag::bootstrap_end(mask));

        if let Some(ts) = rebase_to_ms {
            for tag in out.iter_mut() {
                *tag = tag.clone_with_timestamp(ts);
            }
        }
        out
    }

    /// Tags to deliver to a leaving subscriber: a synthetic `source_ended`
    /// for every still-open `source_started` whose flavour bit intersects
    /// `mask`.
    pub fn play_at_end(&self, mask: FlavourMask) -> Vec<Tag> {
        self.started_stack
            .iter()
            .rev()
            .filter(|(_, source_mask)| source_mask.matches(mask))
            .map(|(name, source_mask)| Tag::source_ended(name.clone(), *source_mask))
            .collect()
    }

    pub fn set_moov(&mut self, moov: Tag) {
        self.moov = Some(moov);
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.keep_media);
    }
}
