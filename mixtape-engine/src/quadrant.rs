//! Popularity quadrants
//!
//! Items with a popularity score are ranked within their own pool and split into four
//! contiguous bands of `floor(n / 4)` items each, top band first. Any remainder goes
//! to `DeepCuts`. Items without a score are left unclassified and only drawn once a
//! source has no classified items left.

use serde::{Deserialize, Serialize};

use crate::model::Item;

/// Popularity band within one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    TopHits,
    Popular,
    Moderate,
    DeepCuts,
}

impl Quadrant {
    /// All quadrants, most popular first
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopHits,
        Quadrant::Popular,
        Quadrant::Moderate,
        Quadrant::DeepCuts,
    ];

    pub fn index(self) -> usize {
        match self {
            Quadrant::TopHits => 0,
            Quadrant::Popular => 1,
            Quadrant::Moderate => 2,
            Quadrant::DeepCuts => 3,
        }
    }

    /// Popularity level on a 0..1 scale (TopHits = 1, DeepCuts = 0)
    pub fn level(self) -> f64 {
        1.0 - self.index() as f64 / 3.0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::TopHits => "top_hits",
            Quadrant::Popular => "popular",
            Quadrant::Moderate => "moderate",
            Quadrant::DeepCuts => "deep_cuts",
        }
    }
}

impl std::fmt::Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quadrant assignment for every item of one pool, by catalog position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadrantMap {
    assignments: Vec<Option<Quadrant>>,
}

impl QuadrantMap {
    /// Classify a pool's items
    ///
    /// The ranking is a stable sort on descending score, so equal scores keep catalog
    /// order and the result depends only on the input ordering.
    pub fn classify(items: &[Item]) -> Self {
        let mut scored: Vec<(usize, u8)> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.popularity.map(|score| (i, score)))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let band = scored.len() / 4;
        let mut assignments = vec![None; items.len()];
        for (rank, (position, _)) in scored.iter().enumerate() {
            let quadrant = match rank.checked_div(band) {
                Some(0) => Quadrant::TopHits,
                Some(1) => Quadrant::Popular,
                Some(2) => Quadrant::Moderate,
                _ => Quadrant::DeepCuts,
            };
            assignments[*position] = Some(quadrant);
        }

        Self { assignments }
    }

    /// Quadrant of the item at `index` in catalog order; `None` when unscored
    pub fn quadrant_of(&self, index: usize) -> Option<Quadrant> {
        self.assignments.get(index).copied().flatten()
    }

    /// Number of items per quadrant, indexed by `Quadrant::index`
    pub fn counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for quadrant in self.assignments.iter().flatten() {
            counts[quadrant.index()] += 1;
        }
        counts
    }

    pub fn unscored(&self) -> usize {
        self.assignments.iter().filter(|q| q.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(scores: &[Option<u8>]) -> Vec<Item> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let item = Item::new(format!("t{}", i), "p");
                match s {
                    Some(score) => item.with_popularity(*score),
                    None => item,
                }
            })
            .collect()
    }

    #[test]
    fn test_even_split() {
        let pool = items(&[
            Some(10), Some(80), Some(50), Some(90),
            Some(20), Some(70), Some(40), Some(60),
        ]);
        let map = QuadrantMap::classify(&pool);

        assert_eq!(map.quadrant_of(3), Some(Quadrant::TopHits)); // 90
        assert_eq!(map.quadrant_of(1), Some(Quadrant::TopHits)); // 80
        assert_eq!(map.quadrant_of(5), Some(Quadrant::Popular)); // 70
        assert_eq!(map.quadrant_of(7), Some(Quadrant::Popular)); // 60
        assert_eq!(map.quadrant_of(2), Some(Quadrant::Moderate)); // 50
        assert_eq!(map.quadrant_of(6), Some(Quadrant::Moderate)); // 40
        assert_eq!(map.quadrant_of(4), Some(Quadrant::DeepCuts)); // 20
        assert_eq!(map.quadrant_of(0), Some(Quadrant::DeepCuts)); // 10
        assert_eq!(map.counts(), [2, 2, 2, 2]);
    }

    #[test]
    fn test_remainder_goes_to_deep_cuts() {
        let pool = items(&[Some(90), Some(80), Some(70), Some(60), Some(50), Some(40), Some(30)]);
        let map = QuadrantMap::classify(&pool);
        assert_eq!(map.counts(), [1, 1, 1, 4]);
    }

    #[test]
    fn test_fewer_than_four_scored_items_are_all_deep_cuts() {
        let pool = items(&[Some(99), Some(50), Some(1)]);
        let map = QuadrantMap::classify(&pool);
        assert_eq!(map.counts(), [0, 0, 0, 3]);
    }

    #[test]
    fn test_unscored_items_are_unclassified() {
        let pool = items(&[None, Some(50), None, Some(40), Some(30), Some(20)]);
        let map = QuadrantMap::classify(&pool);
        assert_eq!(map.quadrant_of(0), None);
        assert_eq!(map.quadrant_of(2), None);
        assert_eq!(map.unscored(), 2);
        assert_eq!(map.counts(), [1, 1, 1, 1]);
        assert_eq!(map.quadrant_of(99), None);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        // Eight equal scores: catalog order decides the bands
        let pool = items(&[Some(50); 8]);
        let map = QuadrantMap::classify(&pool);
        let assigned: Vec<_> = (0..8).map(|i| map.quadrant_of(i).unwrap()).collect();
        assert_eq!(
            assigned,
            vec![
                Quadrant::TopHits, Quadrant::TopHits,
                Quadrant::Popular, Quadrant::Popular,
                Quadrant::Moderate, Quadrant::Moderate,
                Quadrant::DeepCuts, Quadrant::DeepCuts,
            ]
        );
    }

    #[test]
    fn test_reclassification_is_stable() {
        let pool = items(&[Some(3), Some(3), None, Some(77), Some(3), Some(12), Some(77), Some(0), Some(3)]);
        let first = QuadrantMap::classify(&pool);
        let second = QuadrantMap::classify(&pool);
        assert_eq!(first, second);
    }

    #[test]
    fn test_levels() {
        assert_eq!(Quadrant::TopHits.level(), 1.0);
        assert_eq!(Quadrant::DeepCuts.level(), 0.0);
        assert!(Quadrant::Popular.level() > Quadrant::Moderate.level());
    }
}
