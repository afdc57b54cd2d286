//! # Mixtape Engine
//!
//! Blends several independently weighted playlists into one bounded sequence:
//! - Weight normalization (count or playtime weighting)
//! - Popularity quadrants and shape strategies
//! - Weighted group sequencing with exhaustion handling
//! - Pre-flight advisories (exhaustion projection, insufficient content)
//! - Settings loading
//!
//! The engine does no I/O during a mix. Callers hand in fully materialized pools and
//! get back an immutable [`MixResult`].
//!
//! ```rust
//! use mixtape_engine::{Item, MixEngine, MixOptions, RatioConfig, SourcePool};
//!
//! let rock = SourcePool::new("rock", "Rock", vec![Item::new("r1", ""), Item::new("r2", "")]);
//! let jazz = SourcePool::new("jazz", "Jazz", vec![Item::new("j1", ""), Item::new("j2", "")]);
//!
//! let result = MixEngine::default()
//!     .mix(&[rock, jazz], &RatioConfig::new(), &MixOptions::count(4), Some(1))
//!     .unwrap();
//! assert_eq!(result.item_ids(), vec!["r1", "j1", "r2", "j2"]);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod human_time;
pub mod model;
pub mod projection;
pub mod quadrant;
pub mod sequencer;
pub mod shape;
pub mod weights;

pub use config::{MixerSettings, SettingsOrigin, TomlConfig};
pub use engine::MixEngine;
pub use error::{ConfigError, Error, Result};
pub use model::{
    ContentShortfall, ExhaustionProjection, GroupRun, Item, MixOptions, MixResult, MixTarget,
    MixedItem, RatioConfig, RatioEntry, ShapeStrategy, SourcePool, SourceProjection,
    SourceShare, SourceStats, StopReason, TargetUnit, WeightMode,
};
pub use quadrant::Quadrant;
