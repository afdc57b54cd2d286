//! Input and output types for a mix
//!
//! Everything here is plain data. Pools and ratio entries arrive fully materialized
//! from the catalog side; `MixResult` is produced once per call and never mutated.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::quadrant::Quadrant;

/// Per-source ratio configuration keyed by source id
pub type RatioConfig = HashMap<String, RatioEntry>;

/// Largest allowed group size
pub const MAX_GROUP_SIZE: u8 = 8;

/// Largest allowed weight
pub const MAX_WEIGHT: u8 = 10;

/// Highest popularity score; larger inputs are clamped to it
pub const MAX_POPULARITY: u8 = 100;

/// One playable unit from a source pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable catalog identifier
    pub id: String,

    /// Duration in milliseconds, if known
    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// Popularity score 0-100, if known
    #[serde(default, deserialize_with = "deserialize_popularity")]
    pub popularity: Option<u8>,

    /// Id of the pool this item belongs to
    #[serde(default)]
    pub source_id: String,
}

impl Item {
    pub fn new(id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            duration_ms: None,
            popularity: None,
            source_id: source_id.into(),
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_popularity(mut self, popularity: u8) -> Self {
        self.popularity = Some(popularity.min(MAX_POPULARITY));
        self
    }
}

fn deserialize_popularity<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let score = Option::<u64>::deserialize(deserializer)?;
    Ok(score.map(|s| s.min(MAX_POPULARITY as u64) as u8))
}

/// One input playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePool {
    pub id: String,
    pub name: String,

    /// Items in catalog order
    #[serde(default)]
    pub items: Vec<Item>,

    /// Known average item duration, used for items without their own duration
    #[serde(default)]
    pub average_duration_ms: Option<u64>,
}

impl SourcePool {
    /// Build a pool, stamping every item with this pool's id
    pub fn new(id: impl Into<String>, name: impl Into<String>, items: Vec<Item>) -> Self {
        let id = id.into();
        let items = items
            .into_iter()
            .map(|mut item| {
                item.source_id = id.clone();
                item
            })
            .collect();
        Self {
            id,
            name: name.into(),
            items,
            average_duration_ms: None,
        }
    }

    pub fn with_average_duration_ms(mut self, average_duration_ms: u64) -> Self {
        self.average_duration_ms = Some(average_duration_ms);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// How a source's weight is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    /// Equal weights yield equal item counts
    #[default]
    Count,
    /// Equal weights yield equal playtime
    Duration,
}

impl WeightMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightMode::Count => "count",
            WeightMode::Duration => "duration",
        }
    }
}

/// Ratio configuration for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioEntry {
    pub min_group: u8,
    pub max_group: u8,
    pub weight: u8,
    pub weight_mode: WeightMode,
    pub enabled: bool,
}

impl Default for RatioEntry {
    fn default() -> Self {
        Self {
            min_group: 1,
            max_group: 1,
            weight: 1,
            weight_mode: WeightMode::Count,
            enabled: true,
        }
    }
}

impl RatioEntry {
    pub fn weighted(weight: u8) -> Self {
        Self {
            weight,
            ..Self::default()
        }
    }

    pub fn with_groups(mut self, min_group: u8, max_group: u8) -> Self {
        self.min_group = min_group;
        self.max_group = max_group;
        self
    }

    pub fn with_mode(mut self, weight_mode: WeightMode) -> Self {
        self.weight_mode = weight_mode;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check bounds for an enabled entry
    pub fn validate(&self, source_id: &str) -> Result<(), ConfigError> {
        if self.min_group == 0 {
            return Err(ConfigError::invalid_entry(source_id, "min_group must be at least 1"));
        }
        if self.max_group > MAX_GROUP_SIZE {
            return Err(ConfigError::invalid_entry(
                source_id,
                format!("max_group {} exceeds {}", self.max_group, MAX_GROUP_SIZE),
            ));
        }
        if self.min_group > self.max_group {
            return Err(ConfigError::invalid_entry(
                source_id,
                format!(
                    "min_group {} is greater than max_group {}",
                    self.min_group, self.max_group
                ),
            ));
        }
        if self.weight == 0 || self.weight > MAX_WEIGHT {
            return Err(ConfigError::invalid_entry(
                source_id,
                format!("weight {} outside 1..={}", self.weight, MAX_WEIGHT),
            ));
        }
        Ok(())
    }

    /// Mean group length, used to turn an item share into a turn share
    pub fn mean_group(&self) -> f64 {
        (self.min_group as f64 + self.max_group as f64) / 2.0
    }
}

/// Where popular and less popular items land over the course of the mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeStrategy {
    /// No positional bias
    #[default]
    Mixed,
    /// Hits first, deep cuts last
    FrontLoaded,
    /// Deep cuts at both ends, hits in the middle
    MidPeak,
    /// Deep cuts first, hits last
    Crescendo,
}

impl ShapeStrategy {
    /// Parse from a user-supplied name (case-insensitive, `-` or `_`)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "mixed" => Some(ShapeStrategy::Mixed),
            "front-loaded" | "frontloaded" => Some(ShapeStrategy::FrontLoaded),
            "mid-peak" | "midpeak" => Some(ShapeStrategy::MidPeak),
            "crescendo" => Some(ShapeStrategy::Crescendo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeStrategy::Mixed => "mixed",
            ShapeStrategy::FrontLoaded => "front-loaded",
            ShapeStrategy::MidPeak => "mid-peak",
            ShapeStrategy::Crescendo => "crescendo",
        }
    }

    pub fn all_variants() -> &'static [ShapeStrategy] {
        &[
            ShapeStrategy::Mixed,
            ShapeStrategy::FrontLoaded,
            ShapeStrategy::MidPeak,
            ShapeStrategy::Crescendo,
        ]
    }
}

impl std::fmt::Display for ShapeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-facing mix options
///
/// The target fields are validated into a [`MixTarget`] before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MixOptions {
    /// Consume every enabled source to exhaustion
    pub use_all_sources: bool,
    pub target_count: Option<u32>,
    pub target_duration_ms: Option<u64>,
    pub shape_strategy: ShapeStrategy,
    pub shuffle_within_groups: bool,
    /// Ignored when `use_all_sources` is set
    pub continue_on_source_exhaustion: bool,
}

impl MixOptions {
    pub fn count(target_count: u32) -> Self {
        Self {
            target_count: Some(target_count),
            ..Self::default()
        }
    }

    pub fn duration_ms(target_duration_ms: u64) -> Self {
        Self {
            target_duration_ms: Some(target_duration_ms),
            ..Self::default()
        }
    }

    pub fn all_sources() -> Self {
        Self {
            use_all_sources: true,
            ..Self::default()
        }
    }

    pub fn with_shape(mut self, shape_strategy: ShapeStrategy) -> Self {
        self.shape_strategy = shape_strategy;
        self
    }

    pub fn shuffled(mut self, shuffle_within_groups: bool) -> Self {
        self.shuffle_within_groups = shuffle_within_groups;
        self
    }

    pub fn continue_on_exhaustion(mut self, continue_on_source_exhaustion: bool) -> Self {
        self.continue_on_source_exhaustion = continue_on_source_exhaustion;
        self
    }

    /// Resolve the target fields
    ///
    /// Zero-valued targets count as unset. With a single enabled source and no
    /// target, the source is consumed whole.
    pub fn target(&self, enabled_sources: usize) -> Result<MixTarget, ConfigError> {
        if self.use_all_sources {
            return Ok(MixTarget::AllSources);
        }
        let count = self.target_count.filter(|&n| n > 0);
        let duration = self.target_duration_ms.filter(|&ms| ms > 0);
        match (count, duration) {
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousTarget),
            (Some(n), None) => Ok(MixTarget::Count(n)),
            (None, Some(ms)) => Ok(MixTarget::DurationMs(ms)),
            (None, None) if enabled_sources <= 1 => Ok(MixTarget::AllSources),
            (None, None) => Err(ConfigError::MissingTarget),
        }
    }
}

/// Validated target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixTarget {
    AllSources,
    Count(u32),
    DurationMs(u64),
}

impl MixTarget {
    /// Unit that progress and projections are measured in
    pub fn unit(&self) -> TargetUnit {
        match self {
            MixTarget::AllSources | MixTarget::Count(_) => TargetUnit::Count,
            MixTarget::DurationMs(_) => TargetUnit::Duration,
        }
    }
}

/// Unit of a target or projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetUnit {
    Count,
    Duration,
}

/// Terminal state of the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Target reached
    Complete,
    /// Stopped before the target because a source ran dry
    Exhausted,
    /// Every source consumed, as requested by `use_all_sources`
    AllExhausted,
}

/// One emitted item with its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixedItem {
    /// Emission index, starting at 0
    pub index: usize,
    pub source_id: String,
    pub item: Item,
    /// Popularity band the item was drawn from
    pub quadrant: Option<Quadrant>,
    /// Index into `MixResult::groups`
    pub group: usize,
    /// Duration counted for this item (own duration or the pool average)
    pub effective_duration_ms: u64,
}

/// One turn's worth of consecutive items from a single source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRun {
    pub source_id: String,
    pub start: usize,
    pub len: usize,
    /// Drawn length (after clamping to pool and target) was not fully emitted,
    /// or was clamped below `min_group`
    pub truncated: bool,
}

/// Per-source totals computed from the emitted sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source_id: String,
    pub name: String,
    pub count: usize,
    pub total_duration_ms: u64,
}

/// Projected exhaustion point of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProjection {
    pub source_id: String,
    /// Output index (count) or output playtime in ms (duration) at which the
    /// source runs dry under strictly proportional consumption
    pub projected_at: u64,
}

/// Advisory: which source becomes the bottleneck, and where
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExhaustionProjection {
    pub limiting_source_id: String,
    pub projected_at: u64,
    pub unit: TargetUnit,
    /// All enabled sources in pool order
    pub per_source: Vec<SourceProjection>,
}

/// Advisory: the enabled pools cannot fill the requested target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentShortfall {
    pub unit: TargetUnit,
    pub requested: u64,
    pub available: u64,
}

/// Normalized share of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceShare {
    pub source_id: String,
    pub proportion: f64,
    pub average_duration_ms: u64,
}

impl SourceShare {
    pub fn percent(&self) -> f64 {
        self.proportion * 100.0
    }
}

/// Output of one mix call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixResult {
    pub items: Vec<MixedItem>,
    /// Enabled sources in pool order
    pub per_source: Vec<SourceStats>,
    pub total_duration_ms: u64,
    pub stop: StopReason,
    /// The target was not reached
    pub incomplete: bool,
    /// First source that ran dry during the run, if any
    pub limiting_source_id: Option<String>,
    pub groups: Vec<GroupRun>,
    /// Pre-flight projection computed for this call
    pub projection: Option<ExhaustionProjection>,
    pub seed: u64,
}

impl MixResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_ids(&self) -> Vec<&str> {
        self.items.iter().map(|m| m.item.id.as_str()).collect()
    }

    pub fn stats_for(&self, source_id: &str) -> Option<&SourceStats> {
        self.per_source.iter().find(|s| s.source_id == source_id)
    }

    /// Maximal runs of consecutive items from the same source, as (source id, length)
    ///
    /// Adjacent groups from the same source merge into one run here.
    pub fn runs(&self) -> Vec<(&str, usize)> {
        let mut runs: Vec<(&str, usize)> = Vec::new();
        for mixed in &self.items {
            match runs.last_mut() {
                Some((source, len)) if *source == mixed.source_id.as_str() => *len += 1,
                _ => runs.push((mixed.source_id.as_str(), 1)),
            }
        }
        runs
    }
}
