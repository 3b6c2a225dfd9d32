//! Decorative image slots with a static fallback.
//!
//! Each slot is keyed by caller identity (which venue a sketch belongs
//! to) and always has something to show: the pre-rendered fallback until
//! a generated sketch arrives, and the fallback forever if generation
//! fails.
//!
//! Results are matched back to the round that requested them with a
//! [`Generation`] ticket. Starting a new round or calling
//! [`SketchSlots::cancel`] supersedes every outstanding ticket, so late
//! completions from a torn-down view are dropped instead of applied.

use std::collections::BTreeMap;
use std::fmt;

use keepsake_pipeline::{ErrorKind, SketchConfig, SketchError, SketchOutput};

use crate::generate::generate_sketch;
use crate::loader::SourceLoader;
use crate::source::SourceRef;

/// Ticket identifying one round of generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// What a slot currently displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotImage<'a> {
    /// The generated sketch.
    Sketch(&'a SketchOutput),
    /// The static pre-rendered image.
    Fallback(&'a SourceRef),
}

/// Outcome of delivering a result to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The sketch replaced the fallback.
    Applied,
    /// Generation failed; the fallback stays.
    KeptFallback(ErrorKind),
    /// The ticket was superseded; the result was discarded.
    Stale,
    /// No slot with that key exists; the result was discarded.
    UnknownSlot,
}

#[derive(Debug, Clone)]
struct Slot {
    fallback: SourceRef,
    source: Option<SourceRef>,
    sketch: Option<SketchOutput>,
}

/// A keyed set of decorative sketch slots.
#[derive(Debug, Clone)]
pub struct SketchSlots<K> {
    slots: BTreeMap<K, Slot>,
    generation: u64,
}

impl<K> Default for SketchSlots<K> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            generation: 0,
        }
    }
}

impl<K: Ord + Clone + fmt::Debug> SketchSlots<K> {
    /// An empty set of slots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot, builder style. See [`insert`](Self::insert).
    #[must_use]
    pub fn with_slot(mut self, key: K, fallback: SourceRef, source: Option<SourceRef>) -> Self {
        self.insert(key, fallback, source);
        self
    }

    /// Add or replace a slot.
    ///
    /// `source` is the photograph to sketch; slots without one only ever
    /// show their fallback. Replacing a slot drops any sketch it held.
    pub fn insert(&mut self, key: K, fallback: SourceRef, source: Option<SourceRef>) {
        self.slots.insert(
            key,
            Slot {
                fallback,
                source,
                sketch: None,
            },
        );
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// What the slot should display right now.
    #[must_use]
    pub fn image(&self, key: &K) -> Option<SlotImage<'_>> {
        self.slots.get(key).map(|slot| {
            slot.sketch
                .as_ref()
                .map_or(SlotImage::Fallback(&slot.fallback), SlotImage::Sketch)
        })
    }

    /// The generated sketch for a slot, if one has been applied.
    #[must_use]
    pub fn sketch(&self, key: &K) -> Option<&SketchOutput> {
        self.slots.get(key).and_then(|slot| slot.sketch.as_ref())
    }

    /// Slots that have a source but no sketch yet.
    #[must_use]
    pub fn pending(&self) -> Vec<(K, SourceRef)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.sketch.is_none())
            .filter_map(|(key, slot)| slot.source.clone().map(|source| (key.clone(), source)))
            .collect()
    }

    /// Start a new round, superseding all earlier tickets.
    pub const fn begin(&mut self) -> Generation {
        self.generation += 1;
        Generation(self.generation)
    }

    /// Supersede all outstanding tickets without starting a round.
    pub const fn cancel(&mut self) {
        self.generation += 1;
    }

    /// Returns `true` if `ticket` belongs to the latest round.
    #[must_use]
    pub const fn is_current(&self, ticket: Generation) -> bool {
        ticket.0 == self.generation
    }

    /// Deliver a generation result for `key`.
    ///
    /// Successes from the current round replace the fallback. Failures
    /// are logged and leave the slot as it was. Results carrying a
    /// superseded ticket are discarded.
    pub fn complete(
        &mut self,
        ticket: Generation,
        key: &K,
        result: Result<SketchOutput, SketchError>,
    ) -> Completion {
        if !self.is_current(ticket) {
            tracing::debug!(slot = ?key, "discarding stale sketch result");
            return Completion::Stale;
        }
        let Some(slot) = self.slots.get_mut(key) else {
            tracing::debug!(slot = ?key, "discarding sketch for unknown slot");
            return Completion::UnknownSlot;
        };
        match result {
            Ok(output) => {
                slot.sketch = Some(output);
                Completion::Applied
            }
            Err(e) => {
                tracing::warn!(slot = ?key, error = %e, "keeping fallback image");
                Completion::KeptFallback(e.kind())
            }
        }
    }

    /// Drop the sketch held by a slot so it shows its fallback again.
    pub fn clear(&mut self, key: &K) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.sketch = None;
        }
    }

    /// Generate every pending slot under one ticket.
    ///
    /// Slots are generated one after another; each load awaits the
    /// loader, so a single-threaded host stays responsive between them.
    /// Slots that already hold a sketch are skipped.
    pub async fn generate_all<L: SourceLoader>(
        &mut self,
        loader: &L,
        config: &SketchConfig,
    ) -> Vec<(K, Completion)> {
        let ticket = self.begin();
        let mut completions = Vec::new();
        for (key, source) in self.pending() {
            let result = generate_sketch(loader, &source, config).await;
            let completion = self.complete(ticket, &key, result);
            completions.push((key, completion));
        }
        completions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::ImageEncoder;
    use keepsake_pipeline::{Dimensions, SourceError};

    use super::*;
    use crate::loader::MemoryLoader;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .unwrap();
        buf
    }

    fn output() -> SketchOutput {
        keepsake_pipeline::generate(&png(8, 8), &SketchConfig::default()).unwrap()
    }

    fn venues() -> SketchSlots<&'static str> {
        SketchSlots::new()
            .with_slot(
                "ceremony",
                SourceRef::parse("/assets/church-sketch.jpg"),
                Some(SourceRef::parse("/assets/church-image.jpg")),
            )
            .with_slot(
                "reception",
                SourceRef::parse("/assets/reception-sketch.jpg"),
                Some(SourceRef::parse("/assets/potch-grand-banquet.jpg")),
            )
    }

    #[test]
    fn shows_fallback_before_generation() {
        let slots = venues();
        assert_eq!(
            slots.image(&"ceremony"),
            Some(SlotImage::Fallback(&SourceRef::parse("/assets/church-sketch.jpg")))
        );
        assert_eq!(slots.image(&"missing"), None);
    }

    #[test]
    fn applied_sketch_replaces_fallback() {
        let mut slots = venues();
        let ticket = slots.begin();
        let out = output();
        assert_eq!(
            slots.complete(ticket, &"ceremony", Ok(out.clone())),
            Completion::Applied
        );
        assert_eq!(slots.image(&"ceremony"), Some(SlotImage::Sketch(&out)));
        assert!(matches!(
            slots.image(&"reception"),
            Some(SlotImage::Fallback(_))
        ));
    }

    #[test]
    fn failure_keeps_fallback() {
        let mut slots = venues();
        let ticket = slots.begin();
        let completion = slots.complete(
            ticket,
            &"reception",
            Err(SourceError::load("/assets/potch-grand-banquet.jpg", "404").into()),
        );
        assert_eq!(
            completion,
            Completion::KeptFallback(ErrorKind::SourceUnavailable)
        );
        assert!(matches!(
            slots.image(&"reception"),
            Some(SlotImage::Fallback(_))
        ));
    }

    #[test]
    fn failure_does_not_discard_earlier_sketch() {
        let mut slots = venues();
        let ticket = slots.begin();
        slots.complete(ticket, &"ceremony", Ok(output()));
        let ticket = slots.begin();
        slots.complete(ticket, &"ceremony", Err(SketchError::canvas("gone")));
        assert!(slots.sketch(&"ceremony").is_some());
    }

    #[test]
    fn superseded_ticket_is_stale() {
        let mut slots = venues();
        let old = slots.begin();
        let new = slots.begin();
        assert_eq!(
            slots.complete(old, &"ceremony", Ok(output())),
            Completion::Stale
        );
        assert!(slots.sketch(&"ceremony").is_none());
        assert_eq!(
            slots.complete(new, &"ceremony", Ok(output())),
            Completion::Applied
        );
    }

    #[test]
    fn cancel_discards_in_flight_results() {
        let mut slots = venues();
        let ticket = slots.begin();
        slots.cancel();
        assert!(!slots.is_current(ticket));
        assert_eq!(
            slots.complete(ticket, &"ceremony", Ok(output())),
            Completion::Stale
        );
        assert!(matches!(
            slots.image(&"ceremony"),
            Some(SlotImage::Fallback(_))
        ));
    }

    #[test]
    fn unknown_slot_is_reported() {
        let mut slots = venues();
        let ticket = slots.begin();
        assert_eq!(
            slots.complete(ticket, &"afterparty", Ok(output())),
            Completion::UnknownSlot
        );
    }

    #[test]
    fn slots_without_source_are_never_pending() {
        let slots = venues().with_slot(
            "dress-code",
            SourceRef::parse("/assets/dress-guest-sketch.jpg"),
            None,
        );
        let pending: Vec<_> = slots.pending().into_iter().map(|(k, _)| k).collect();
        assert_eq!(pending, vec!["ceremony", "reception"]);
    }

    #[test]
    fn clear_reverts_to_fallback() {
        let mut slots = venues();
        let ticket = slots.begin();
        slots.complete(ticket, &"ceremony", Ok(output()));
        slots.clear(&"ceremony");
        assert!(matches!(
            slots.image(&"ceremony"),
            Some(SlotImage::Fallback(_))
        ));
    }

    #[test]
    fn generate_all_applies_successes_and_keeps_fallbacks() {
        let loader = MemoryLoader::new().with("/assets/church-image.jpg", png(12, 10));
        let mut slots = venues();

        let completions =
            pollster::block_on(slots.generate_all(&loader, &SketchConfig::default()));
        assert_eq!(
            completions,
            vec![
                ("ceremony", Completion::Applied),
                (
                    "reception",
                    Completion::KeptFallback(ErrorKind::SourceUnavailable)
                ),
            ]
        );
        assert_eq!(
            slots.sketch(&"ceremony").map(|s| s.dimensions),
            Some(Dimensions::new(12, 10))
        );
        assert!(matches!(
            slots.image(&"reception"),
            Some(SlotImage::Fallback(_))
        ));

        // A second round only retries what is still pending.
        let completions =
            pollster::block_on(slots.generate_all(&loader, &SketchConfig::default()));
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].0, "reception");
    }
}
