//! Weight normalization
//!
//! Turns each enabled source's integer weight and weight mode into a proportion of
//! the output. Count-mode weights are used as-is. Duration-mode weights are first
//! scaled by `target_average / source_average` so that equal weights produce equal
//! playtime instead of equal item counts. All effective weights are then normalized
//! together so the proportions sum to 1.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::model::{Item, RatioConfig, RatioEntry, SourcePool, SourceShare, WeightMode};

/// Fallback average item duration when a pool has no known durations (3.5 minutes)
pub const DEFAULT_FALLBACK_AVERAGE_DURATION_MS: u64 = 210_000;

/// An enabled source paired with its validated ratio entry
#[derive(Debug, Clone)]
pub struct EnabledSource<'a> {
    pub pool: &'a SourcePool,
    pub entry: RatioEntry,
}

/// An enabled source with its normalized proportion
#[derive(Debug, Clone)]
pub struct NormalizedSource<'a> {
    pub pool: &'a SourcePool,
    pub entry: RatioEntry,
    /// Share of output items, in (0, 1]
    pub proportion: f64,
    /// Average item duration; 0 when nothing is known and no fallback exists
    pub average_duration_ms: u64,
}

impl NormalizedSource<'_> {
    pub fn id(&self) -> &str {
        &self.pool.id
    }

    /// Duration counted for an item of this source
    pub fn effective_duration_ms(&self, item: &Item) -> u64 {
        item.duration_ms.unwrap_or(self.average_duration_ms)
    }

    /// Summed effective duration of the whole pool
    pub fn total_duration_ms(&self) -> u64 {
        self.pool
            .items
            .iter()
            .map(|item| self.effective_duration_ms(item))
            .sum()
    }

    pub fn share(&self) -> SourceShare {
        SourceShare {
            source_id: self.pool.id.clone(),
            proportion: self.proportion,
            average_duration_ms: self.average_duration_ms,
        }
    }
}

/// Pick the enabled sources out of `pools`, in pool order
///
/// Pools without a ratio entry use `RatioEntry::default()`. Entries that name no
/// pool are ignored. Every enabled entry is validated, and pool ids must be unique.
pub fn enabled_sources<'a>(
    pools: &'a [SourcePool],
    ratios: &RatioConfig,
) -> Result<Vec<EnabledSource<'a>>, ConfigError> {
    let mut seen = HashSet::new();
    for pool in pools {
        if !seen.insert(pool.id.as_str()) {
            return Err(ConfigError::DuplicateSource {
                source_id: pool.id.clone(),
            });
        }
    }

    for source_id in ratios.keys() {
        if !pools.iter().any(|p| &p.id == source_id) {
            warn!("Ratio entry for unknown source '{}' ignored", source_id);
        }
    }

    let mut enabled = Vec::new();
    for pool in pools {
        let entry = ratios.get(&pool.id).copied().unwrap_or_default();
        if !entry.enabled {
            debug!("Source '{}' disabled, excluded from mix", pool.id);
            continue;
        }
        entry.validate(&pool.id)?;
        enabled.push(EnabledSource { pool, entry });
    }
    Ok(enabled)
}

/// Average item duration of a pool
///
/// Mean of the known item durations, else the pool's own average, else `fallback`.
pub fn average_duration_ms(pool: &SourcePool, fallback: Option<u64>) -> Option<u64> {
    let (sum, known) = pool
        .items
        .iter()
        .filter_map(|item| item.duration_ms)
        .fold((0u64, 0u64), |(sum, n), d| (sum.saturating_add(d), n + 1));

    if known > 0 {
        Some(sum / known)
    } else {
        pool.average_duration_ms.or(fallback)
    }
}

/// Weight normalizer
#[derive(Debug, Clone, Copy)]
pub struct WeightNormalizer {
    fallback_average_duration_ms: Option<u64>,
}

impl Default for WeightNormalizer {
    fn default() -> Self {
        Self::new(Some(DEFAULT_FALLBACK_AVERAGE_DURATION_MS))
    }
}

impl WeightNormalizer {
    pub fn new(fallback_average_duration_ms: Option<u64>) -> Self {
        Self {
            fallback_average_duration_ms,
        }
    }

    /// Compute proportions for the enabled sources
    ///
    /// # Errors
    /// - `InsufficientSources` when `sources` is empty
    /// - `InvalidRatioEntry` when a duration-mode source has no usable average
    ///   duration, or an effective weight is not a positive finite number
    pub fn normalize<'a>(
        &self,
        sources: &[EnabledSource<'a>],
    ) -> Result<Vec<NormalizedSource<'a>>, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::InsufficientSources);
        }

        let averages: Vec<Option<u64>> = sources
            .iter()
            .map(|s| average_duration_ms(s.pool, self.fallback_average_duration_ms))
            .collect();

        // Playtime-balanced weights are scaled against the mean of the duration-mode averages
        let mut duration_averages = Vec::new();
        for (source, average) in sources.iter().zip(&averages) {
            if source.entry.weight_mode != WeightMode::Duration {
                continue;
            }
            match average {
                Some(0) => {
                    return Err(ConfigError::invalid_entry(
                        &source.pool.id,
                        "average item duration is zero",
                    ))
                }
                Some(avg) => duration_averages.push(*avg as f64),
                None => {
                    return Err(ConfigError::invalid_entry(
                        &source.pool.id,
                        "no known item durations and no fallback average duration configured",
                    ))
                }
            }
        }
        let target_average = if duration_averages.is_empty() {
            0.0
        } else {
            duration_averages.iter().sum::<f64>() / duration_averages.len() as f64
        };

        let effective: Vec<f64> = sources
            .iter()
            .zip(&averages)
            .map(|(source, average)| {
                let weight = source.entry.weight as f64;
                match (source.entry.weight_mode, average) {
                    (WeightMode::Duration, Some(avg)) => weight * target_average / *avg as f64,
                    _ => weight,
                }
            })
            .collect();

        for (source, weight) in sources.iter().zip(&effective) {
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(ConfigError::invalid_entry(
                    &source.pool.id,
                    format!("effective weight {} is not positive", weight),
                ));
            }
        }

        let total: f64 = effective.iter().sum();
        let normalized = sources
            .iter()
            .zip(effective)
            .zip(averages)
            .map(|((source, weight), average)| NormalizedSource {
                pool: source.pool,
                entry: source.entry,
                proportion: weight / total,
                average_duration_ms: average.unwrap_or(0),
            })
            .collect::<Vec<_>>();

        for source in &normalized {
            debug!(
                "Source '{}': weight {} ({}), proportion {:.4}, average {} ms",
                source.pool.id,
                source.entry.weight,
                source.entry.weight_mode.as_str(),
                source.proportion,
                source.average_duration_ms
            );
        }
        Ok(normalized)
    }
}
