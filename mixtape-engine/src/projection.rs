//! Exhaustion projection and content sufficiency
//!
//! Predicts where each source would run dry if every source were drawn strictly in
//! proportion from the first item on:
//!
//! ```text
//! count unit:    point_i = items_i / proportion_i
//! duration unit: point_i = playtime_i / playtime_share_i
//!                playtime_share_i = proportion_i * avg_i / sum_j(proportion_j * avg_j)
//! ```
//!
//! The earliest point names the limiting source. The sequencer can stop a little
//! earlier or later than projected (group lengths are integers and a source can run
//! dry mid-group), but it draws with the same proportions, so the advisory and the
//! actual run agree on which source limits the mix.

use tracing::debug;

use crate::model::{
    ContentShortfall, ExhaustionProjection, MixTarget, SourceProjection, TargetUnit,
};
use crate::weights::NormalizedSource;

/// Tolerance for float points that should land exactly on an integer
const POINT_EPSILON: f64 = 1e-6;

/// What the sequencer does when a source runs dry before the target is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionAction {
    /// Drop the source and keep drawing from the rest
    Continue,
    /// End the run as exhausted
    Stop,
}

/// Exhaustion policy for a validated target
pub fn exhaustion_action(target: MixTarget, continue_on_source_exhaustion: bool) -> ExhaustionAction {
    match target {
        MixTarget::AllSources => ExhaustionAction::Continue,
        _ if continue_on_source_exhaustion => ExhaustionAction::Continue,
        _ => ExhaustionAction::Stop,
    }
}

/// Projection over a set of normalized sources
pub struct ExhaustionProjector<'s, 'a> {
    sources: &'s [NormalizedSource<'a>],
}

impl<'s, 'a> ExhaustionProjector<'s, 'a> {
    pub fn new(sources: &'s [NormalizedSource<'a>]) -> Self {
        Self { sources }
    }

    /// Mean output playtime per item under proportional consumption
    fn mean_item_ms(&self) -> f64 {
        self.sources
            .iter()
            .map(|s| s.proportion * s.average_duration_ms as f64)
            .sum()
    }

    /// Raw projected point of each source, in pool order
    fn raw_points(&self, unit: TargetUnit) -> Vec<f64> {
        let mean_item_ms = self.mean_item_ms();
        self.sources
            .iter()
            .map(|source| {
                let items = source.pool.items.len() as f64;
                if items == 0.0 {
                    return 0.0;
                }
                let item_point = items / source.proportion;
                match unit {
                    TargetUnit::Count => item_point,
                    TargetUnit::Duration => {
                        let weighted = source.proportion * source.average_duration_ms as f64;
                        if weighted > 0.0 && mean_item_ms > 0.0 {
                            let share = weighted / mean_item_ms;
                            source.total_duration_ms() as f64 / share
                        } else {
                            // No playtime share: fall back to the item point in mean playtime
                            item_point * mean_item_ms
                        }
                    }
                }
            })
            .collect()
    }

    /// Projected exhaustion point of every source, in pool order
    pub fn project(&self, unit: TargetUnit) -> Vec<SourceProjection> {
        self.sources
            .iter()
            .zip(self.raw_points(unit))
            .map(|(source, point)| SourceProjection {
                source_id: source.pool.id.clone(),
                projected_at: to_point(point),
            })
            .collect()
    }

    /// The limiting source and its point, regardless of target
    ///
    /// Ties go to the earlier source. `None` only when there are no sources.
    pub fn limiting(&self, unit: TargetUnit) -> Option<ExhaustionProjection> {
        let per_source = self.project(unit);
        let limiting = per_source
            .iter()
            .zip(self.raw_points(unit))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p.clone())?;

        Some(ExhaustionProjection {
            limiting_source_id: limiting.source_id,
            projected_at: limiting.projected_at,
            unit,
            per_source,
        })
    }

    /// Ratio-imbalance advisory
    ///
    /// Returns the projection when the limiting source runs dry before the target.
    /// For `AllSources` the target is the total enabled content, so the advisory
    /// fires whenever sources would not all run out together.
    pub fn advisory(&self, target: MixTarget) -> Option<ExhaustionProjection> {
        let unit = target.unit();
        let goal = match target {
            MixTarget::AllSources => self.available(TargetUnit::Count) as f64,
            MixTarget::Count(n) => n as f64,
            MixTarget::DurationMs(ms) => ms as f64,
        };

        let limit = self
            .raw_points(unit)
            .into_iter()
            .fold(f64::INFINITY, f64::min);
        if limit + POINT_EPSILON >= goal {
            return None;
        }

        let projection = self.limiting(unit)?;
        debug!(
            "Source '{}' projected to run dry at {} ({:?}) before target {}",
            projection.limiting_source_id, projection.projected_at, unit, goal
        );
        Some(projection)
    }

    /// Total enabled content in `unit`
    pub fn available(&self, unit: TargetUnit) -> u64 {
        match unit {
            TargetUnit::Count => self.sources.iter().map(|s| s.pool.items.len() as u64).sum(),
            TargetUnit::Duration => self.sources.iter().map(|s| s.total_duration_ms()).sum(),
        }
    }

    /// Insufficient-content advisory: the target exceeds everything enabled
    pub fn shortfall(&self, target: MixTarget) -> Option<ContentShortfall> {
        let (unit, requested) = match target {
            MixTarget::AllSources => return None,
            MixTarget::Count(n) => (TargetUnit::Count, n as u64),
            MixTarget::DurationMs(ms) => (TargetUnit::Duration, ms),
        };
        let available = self.available(unit);
        (requested > available).then_some(ContentShortfall {
            unit,
            requested,
            available,
        })
    }
}

fn to_point(raw: f64) -> u64 {
    if raw.is_finite() {
        (raw + POINT_EPSILON).floor().max(0.0) as u64
    } else {
        u64::MAX
    }
}
