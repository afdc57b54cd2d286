//! Group sequencer
//!
//! The main loop of a mix. Each turn picks a source by weighted round-robin, draws a
//! group length for it, and emits that many items chosen through the shape strategy.
//!
//! # Turn order
//!
//! Every active source accrues its turn share as credit each turn. The source with
//! the highest credit wins the turn and pays back the sum of the active shares, so
//! credit is conserved among active sources and no source can fall more than one
//! turn behind its share. Turn shares are `proportion / mean_group_length`,
//! normalized: a source with long groups takes proportionally fewer turns, which
//! keeps its share of *items* at its proportion. Credits are integers in parts per
//! million so runs are reproducible bit-for-bit.
//!
//! # States
//!
//! ```text
//! Running ──target reached──────────────────────────► StoppedComplete
//!    │
//!    ├──dry source wins a turn, policy Stop─────────► StoppedExhausted
//!    ├──no source left, count/duration target───────► StoppedExhausted
//!    └──no source left, all-sources target──────────► StoppedAllExhausted
//! ```
//!
//! A source that runs dry stays in the rotation and keeps accruing credit. Nothing
//! happens until it would win a turn: under the stop policy the run ends there,
//! otherwise the source is dropped and the turn goes to the next source. An exact
//! fit therefore completes even when the last items empty every source.

use std::collections::VecDeque;

use rand::Rng;
use tracing::{debug, trace};

use crate::model::{GroupRun, MixTarget, MixedItem, ShapeStrategy, StopReason};
use crate::projection::{ExhaustionAction, ExhaustionProjector};
use crate::quadrant::{Quadrant, QuadrantMap};
use crate::shape::ShapeStrategist;
use crate::weights::NormalizedSource;

/// Credit scale: one turn's worth of shares
const CREDIT_SCALE: f64 = 1_000_000.0;

/// Sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Running,
    StoppedComplete,
    StoppedExhausted,
    StoppedAllExhausted,
}

impl SequencerState {
    /// Terminal states map onto a stop reason
    pub fn stop_reason(self) -> Option<StopReason> {
        match self {
            SequencerState::Running => None,
            SequencerState::StoppedComplete => Some(StopReason::Complete),
            SequencerState::StoppedExhausted => Some(StopReason::Exhausted),
            SequencerState::StoppedAllExhausted => Some(StopReason::AllExhausted),
        }
    }
}

/// Output of a completed run
#[derive(Debug, Clone)]
pub struct Sequence {
    pub items: Vec<MixedItem>,
    pub groups: Vec<GroupRun>,
    pub stop: StopReason,
    /// First source that ran dry during the run
    pub limiting_source_id: Option<String>,
}

/// Remaining items of one source, bucketed by quadrant in catalog order
struct Cursor {
    quadrants: QuadrantMap,
    buckets: [VecDeque<usize>; 4],
    unscored: VecDeque<usize>,
    remaining: usize,
    share: i64,
    credit: i64,
    active: bool,
}

impl Cursor {
    fn new(source: &NormalizedSource<'_>, share: i64) -> Self {
        let quadrants = QuadrantMap::classify(&source.pool.items);
        let mut buckets: [VecDeque<usize>; 4] = Default::default();
        let mut unscored = VecDeque::new();
        for index in 0..source.pool.items.len() {
            match quadrants.quadrant_of(index) {
                Some(q) => buckets[q.index()].push_back(index),
                None => unscored.push_back(index),
            }
        }
        let remaining = source.pool.items.len();
        debug!(
            "Source '{}': {} items per quadrant {:?}, {} unscored",
            source.id(),
            remaining,
            quadrants.counts(),
            quadrants.unscored()
        );
        Self {
            quadrants,
            buckets,
            unscored,
            remaining,
            share,
            credit: 0,
            active: remaining > 0,
        }
    }

    fn available(&self) -> [bool; 4] {
        [
            !self.buckets[0].is_empty(),
            !self.buckets[1].is_empty(),
            !self.buckets[2].is_empty(),
            !self.buckets[3].is_empty(),
        ]
    }
}

/// Weighted group sequencer
pub struct GroupSequencer<'s, 'a> {
    sources: &'s [NormalizedSource<'a>],
    target: MixTarget,
    strategist: ShapeStrategist,
    shuffle_within_groups: bool,
    on_exhausted: ExhaustionAction,
}

impl<'s, 'a> GroupSequencer<'s, 'a> {
    pub fn new(
        sources: &'s [NormalizedSource<'a>],
        target: MixTarget,
        shape: ShapeStrategy,
        shuffle_within_groups: bool,
        on_exhausted: ExhaustionAction,
    ) -> Self {
        Self {
            sources,
            target,
            strategist: ShapeStrategist::new(shape),
            shuffle_within_groups,
            on_exhausted,
        }
    }

    /// Integer turn shares, one per source
    fn turn_shares(&self) -> Vec<i64> {
        let raw: Vec<f64> = self
            .sources
            .iter()
            .map(|s| s.proportion / s.entry.mean_group())
            .collect();
        let total: f64 = raw.iter().sum();
        raw.iter()
            .map(|w| ((w / total * CREDIT_SCALE).round() as i64).max(1))
            .collect()
    }

    /// Run to a terminal state
    pub fn run<R: Rng>(&self, rng: &mut R) -> Sequence {
        let mut cursors: Vec<Cursor> = self
            .sources
            .iter()
            .zip(self.turn_shares())
            .map(|(source, share)| Cursor::new(source, share))
            .collect();

        for (source, cursor) in self.sources.iter().zip(&cursors) {
            if !cursor.active {
                debug!("Source '{}' is empty, excluded from generation", source.id());
            }
        }

        let total_items: usize = cursors.iter().map(|c| c.remaining).sum();
        let projected = ExhaustionProjector::new(self.sources).project(self.target.unit());

        let mut items: Vec<MixedItem> = Vec::new();
        let mut groups: Vec<GroupRun> = Vec::new();
        let mut emitted_ms: u64 = 0;
        let mut limiting_source_id: Option<String> = None;
        let mut state = SequencerState::Running;

        while state == SequencerState::Running {
            if self.target_reached(items.len(), emitted_ms) {
                state = SequencerState::StoppedComplete;
                break;
            }

            let Some(winner) = select_source(&mut cursors) else {
                state = match self.target {
                    MixTarget::AllSources => SequencerState::StoppedAllExhausted,
                    _ => SequencerState::StoppedExhausted,
                };
                break;
            };

            if cursors[winner].remaining == 0 {
                match self.on_exhausted {
                    ExhaustionAction::Stop => {
                        debug!(
                            "Source '{}' is dry at its turn, stopping at {} items / {} ms",
                            self.sources[winner].id(),
                            items.len(),
                            emitted_ms
                        );
                        state = SequencerState::StoppedExhausted;
                        break;
                    }
                    ExhaustionAction::Continue => {
                        debug!(
                            "Source '{}' is dry at its turn, skipped",
                            self.sources[winner].id()
                        );
                        cursors[winner].active = false;
                        continue;
                    }
                }
            }

            let source = &self.sources[winner];
            let drawn = rng.gen_range(source.entry.min_group..=source.entry.max_group) as usize;
            let mut length = drawn.min(cursors[winner].remaining);
            if let MixTarget::Count(n) = self.target {
                length = length.min((n as usize).saturating_sub(items.len()));
            }

            let group_index = groups.len();
            let start = items.len();
            for _ in 0..length {
                let progress = self.progress(items.len(), emitted_ms, total_items);
                let (index, quadrant) = self.draw_item(&mut cursors[winner], progress, rng);
                let item = &source.pool.items[index];
                let effective_duration_ms = source.effective_duration_ms(item);
                emitted_ms = emitted_ms.saturating_add(effective_duration_ms);
                items.push(MixedItem {
                    index: items.len(),
                    source_id: source.id().to_string(),
                    item: item.clone(),
                    quadrant,
                    group: group_index,
                    effective_duration_ms,
                });

                if matches!(self.target, MixTarget::DurationMs(_))
                    && self.target_reached(items.len(), emitted_ms)
                {
                    break;
                }
            }

            let emitted = items.len() - start;
            trace!(
                "Group {}: '{}' drew {} (min {}, max {}), emitted {}",
                group_index,
                source.id(),
                drawn,
                source.entry.min_group,
                source.entry.max_group,
                emitted
            );
            groups.push(GroupRun {
                source_id: source.id().to_string(),
                start,
                len: emitted,
                truncated: emitted < drawn,
            });

            if cursors[winner].remaining == 0 {
                debug!(
                    "Source '{}' ran dry at {} items / {} ms (projected {})",
                    source.id(),
                    items.len(),
                    emitted_ms,
                    projected[winner].projected_at
                );
                if limiting_source_id.is_none() {
                    limiting_source_id = Some(source.id().to_string());
                }
            }
        }

        let stop = state.stop_reason().unwrap_or(StopReason::Complete);
        debug!(
            "Sequencer stopped ({:?}) after {} items in {} groups",
            stop,
            items.len(),
            groups.len()
        );
        Sequence {
            items,
            groups,
            stop,
            limiting_source_id,
        }
    }

    fn target_reached(&self, emitted: usize, emitted_ms: u64) -> bool {
        match self.target {
            MixTarget::AllSources => false,
            MixTarget::Count(n) => emitted >= n as usize,
            MixTarget::DurationMs(ms) => emitted_ms >= ms,
        }
    }

    /// Progress through the mix in the target's unit, in 0..=1
    fn progress(&self, emitted: usize, emitted_ms: u64, total_items: usize) -> f64 {
        let ratio = match self.target {
            MixTarget::AllSources if total_items > 0 => emitted as f64 / total_items as f64,
            MixTarget::AllSources => 0.0,
            MixTarget::Count(n) => emitted as f64 / n.max(1) as f64,
            MixTarget::DurationMs(ms) => emitted_ms as f64 / ms.max(1) as f64,
        };
        ratio.clamp(0.0, 1.0)
    }

    /// Take the next item from a source's remaining items
    fn draw_item<R: Rng>(
        &self,
        cursor: &mut Cursor,
        progress: f64,
        rng: &mut R,
    ) -> (usize, Option<Quadrant>) {
        let order = self
            .strategist
            .preference(progress, cursor.available(), rng);
        let shuffle = self.shuffle_within_groups;

        let (bucket, quadrant) = match order.first() {
            Some(q) => (&mut cursor.buckets[q.index()], Some(*q)),
            None => (&mut cursor.unscored, None),
        };
        let index = if shuffle && bucket.len() > 1 {
            let pick = rng.gen_range(0..bucket.len());
            bucket.remove(pick)
        } else {
            bucket.pop_front()
        };

        cursor.remaining -= 1;
        // A non-empty cursor always has an item in the chosen bucket
        let index = index.unwrap_or_default();
        debug_assert_eq!(cursor.quadrants.quadrant_of(index), quadrant);
        (index, quadrant)
    }
}

/// Weighted round-robin pick among sources still in the rotation
///
/// Ties go to the larger share, then to the earlier source. The winner may be dry;
/// the caller applies the exhaustion policy.
fn select_source(cursors: &mut [Cursor]) -> Option<usize> {
    let mut active_total = 0i64;
    for cursor in cursors.iter_mut().filter(|c| c.active) {
        cursor.credit += cursor.share;
        active_total += cursor.share;
    }

    let winner = cursors
        .iter()
        .enumerate()
        .filter(|(_, c)| c.active)
        .max_by(|(ia, a), (ib, b)| {
            a.credit
                .cmp(&b.credit)
                .then(a.share.cmp(&b.share))
                .then(ib.cmp(ia))
        })
        .map(|(i, _)| i)?;

    cursors[winner].credit -= active_total;
    Some(winner)
}
