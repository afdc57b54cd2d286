//! Mix engine
//!
//! The single entry point the rest of an application calls. A mix runs:
//!
//! 1. Validation: enabled sources, ratio entries, target
//! 2. Weight normalization
//! 3. Exhaustion projection (advisory, always computed)
//! 4. Group sequencing to a terminal state
//! 5. Statistics from the emitted sequence
//!
//! The engine only holds immutable settings. Every call is a pure function of its
//! arguments and the seed, so one engine can be shared freely across threads.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::MixerSettings;
use crate::error::ConfigError;
use crate::model::{
    ContentShortfall, ExhaustionProjection, MixOptions, MixResult, MixTarget, MixedItem,
    RatioConfig, SourcePool, SourceShare, SourceStats, StopReason,
};
use crate::projection::{exhaustion_action, ExhaustionProjector};
use crate::sequencer::GroupSequencer;
use crate::weights::{enabled_sources, NormalizedSource, WeightNormalizer};

/// Mixing engine
#[derive(Debug, Clone, Default)]
pub struct MixEngine {
    settings: MixerSettings,
}

impl MixEngine {
    pub fn new(settings: MixerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MixerSettings {
        &self.settings
    }

    /// Validate inputs and normalize weights
    fn prepare<'a>(
        &self,
        pools: &'a [SourcePool],
        ratios: &RatioConfig,
        options: &MixOptions,
    ) -> Result<(Vec<NormalizedSource<'a>>, MixTarget), ConfigError> {
        let enabled = enabled_sources(pools, ratios)?;
        if enabled.iter().all(|s| s.pool.is_empty()) {
            return Err(ConfigError::InsufficientSources);
        }
        let target = options.target(enabled.len())?;
        let normalized = WeightNormalizer::new(self.settings.fallback()).normalize(&enabled)?;
        Ok((normalized, target))
    }

    /// Blend the pools into one sequence
    ///
    /// Without a `seed` the configured default seed is used, so repeated calls with
    /// identical arguments return identical results.
    ///
    /// # Errors
    /// Any `ConfigError`; nothing is emitted when validation fails.
    pub fn mix(
        &self,
        pools: &[SourcePool],
        ratios: &RatioConfig,
        options: &MixOptions,
        seed: Option<u64>,
    ) -> Result<MixResult, ConfigError> {
        let (sources, target) = self.prepare(pools, ratios, options)?;
        let seed = seed.unwrap_or(self.settings.default_seed);

        let projection = ExhaustionProjector::new(&sources).advisory(target);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let sequence = GroupSequencer::new(
            &sources,
            target,
            options.shape_strategy,
            options.shuffle_within_groups,
            exhaustion_action(target, options.continue_on_source_exhaustion),
        )
        .run(&mut rng);

        let per_source = source_stats(&sources, &sequence.items);
        let total_duration_ms = per_source.iter().map(|s| s.total_duration_ms).sum();

        info!(
            "Mixed {} items ({} ms) from {} sources, {} shape, seed {}: {:?}",
            sequence.items.len(),
            total_duration_ms,
            sources.len(),
            options.shape_strategy,
            seed,
            sequence.stop
        );

        Ok(MixResult {
            items: sequence.items,
            per_source,
            total_duration_ms,
            incomplete: sequence.stop == StopReason::Exhausted,
            stop: sequence.stop,
            limiting_source_id: sequence.limiting_source_id,
            groups: sequence.groups,
            projection,
            seed,
        })
    }

    /// Pre-flight ratio-imbalance advisory
    ///
    /// `Some` names the source that would run dry before the target is reached.
    pub fn project_exhaustion(
        &self,
        pools: &[SourcePool],
        ratios: &RatioConfig,
        options: &MixOptions,
    ) -> Result<Option<ExhaustionProjection>, ConfigError> {
        let (sources, target) = self.prepare(pools, ratios, options)?;
        Ok(ExhaustionProjector::new(&sources).advisory(target))
    }

    /// Pre-flight insufficient-content advisory
    ///
    /// `Some` when the target exceeds everything the enabled pools hold.
    pub fn check_sufficient_content(
        &self,
        pools: &[SourcePool],
        ratios: &RatioConfig,
        options: &MixOptions,
    ) -> Result<Option<ContentShortfall>, ConfigError> {
        let (sources, target) = self.prepare(pools, ratios, options)?;
        Ok(ExhaustionProjector::new(&sources).shortfall(target))
    }

    /// Normalized share of every enabled source, in pool order
    pub fn proportions(
        &self,
        pools: &[SourcePool],
        ratios: &RatioConfig,
        options: &MixOptions,
    ) -> Result<Vec<SourceShare>, ConfigError> {
        let (sources, _) = self.prepare(pools, ratios, options)?;
        Ok(sources.iter().map(NormalizedSource::share).collect())
    }
}

/// Per-source totals, counted from the emitted items
fn source_stats(sources: &[NormalizedSource<'_>], items: &[MixedItem]) -> Vec<SourceStats> {
    sources
        .iter()
        .map(|source| {
            let emitted = items.iter().filter(|m| m.source_id == source.pool.id);
            let (count, total_duration_ms) = emitted.fold((0usize, 0u64), |(n, ms), m| {
                (n + 1, ms.saturating_add(m.effective_duration_ms))
            });
            SourceStats {
                source_id: source.pool.id.clone(),
                name: source.pool.name.clone(),
                count,
                total_duration_ms,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, RatioEntry};

    fn pool(id: &str, n: usize) -> SourcePool {
        let items = (0..n)
            .map(|i| Item::new(format!("{}{}", id, i), id).with_duration_ms(1_000 + i as u64))
            .collect();
        SourcePool::new(id, id.to_uppercase(), items)
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MixEngine>();
    }

    #[test]
    fn test_validation_happens_before_emission() {
        let engine = MixEngine::default();
        let pools = [pool("a", 3), pool("b", 3)];

        let err = engine
            .mix(&pools, &RatioConfig::new(), &MixOptions::default(), None)
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingTarget);

        let empty = [pool("a", 0), pool("b", 0)];
        let err = engine
            .mix(&empty, &RatioConfig::new(), &MixOptions::count(3), None)
            .unwrap_err();
        assert_eq!(err, ConfigError::InsufficientSources);

        let err = engine.mix(&[], &RatioConfig::new(), &MixOptions::count(3), None).unwrap_err();
        assert_eq!(err, ConfigError::InsufficientSources);
    }

    #[test]
    fn test_stats_match_emitted_items() {
        let engine = MixEngine::default();
        let pools = [pool("a", 10), pool("b", 10)];
        let result = engine
            .mix(&pools, &RatioConfig::new(), &MixOptions::count(7), Some(3))
            .unwrap();

        let a = result.stats_for("a").unwrap();
        let b = result.stats_for("b").unwrap();
        assert_eq!(a.name, "A");
        assert_eq!(a.count + b.count, result.items.len());
        assert_eq!(a.total_duration_ms + b.total_duration_ms, result.total_duration_ms);
        let summed: u64 = result.items.iter().map(|m| m.item.duration_ms.unwrap()).sum();
        assert_eq!(summed, result.total_duration_ms);
    }

    #[test]
    fn test_default_seed_is_reported() {
        let engine = MixEngine::default();
        let pools = [pool("a", 4)];
        let result = engine
            .mix(&pools, &RatioConfig::new(), &MixOptions::all_sources(), None)
            .unwrap();
        assert_eq!(result.seed, engine.settings().default_seed);
    }

    #[test]
    fn test_proportions() {
        let engine = MixEngine::default();
        let pools = [pool("a", 2), pool("b", 2)];
        let ratios: RatioConfig = [("b".to_string(), RatioEntry::weighted(3))].into_iter().collect();
        let shares = engine.proportions(&pools, &ratios, &MixOptions::count(4)).unwrap();
        assert_eq!(shares.len(), 2);
        assert!((shares[0].percent() - 25.0).abs() < 1e-9);
        assert!((shares[1].percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_durations_count_the_pool_average() {
        let engine = MixEngine::default();
        let pools = [SourcePool::new("a", "A", vec![Item::new("x", "a"), Item::new("y", "a")])
            .with_average_duration_ms(90_000)];
        let result = engine
            .mix(&pools, &RatioConfig::new(), &MixOptions::all_sources(), None)
            .unwrap();
        assert_eq!(result.total_duration_ms, 180_000);
    }
}
