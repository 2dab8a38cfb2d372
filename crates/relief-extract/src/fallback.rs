//! Seeded resolution of unresolved link tiers and directions.
//!
//! One generator per pipeline, seeded once. Draws happen in row order and,
//! within a row, tier before direction; that order is what makes two runs
//! over the same input produce identical assignments.

use std::collections::BTreeMap;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use relief_core::models::{Category, Direction, LinkLeg, PointRow, Tier};
use relief_core::settings::FallbackConfig;
use tracing::warn;

/// Choice table with weights renormalised by the sampler. `dist` is `None`
/// when the configured weights are unusable; draws are then uniform.
struct Choices<T> {
    options: Vec<T>,
    dist: Option<WeightedIndex<f64>>,
}

impl<T: Copy + Ord> Choices<T> {
    fn new(name: &str, probs: &BTreeMap<T, f64>, all: &[T]) -> Self {
        let weights: Vec<f64> = probs.values().copied().collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => Self {
                options: probs.keys().copied().collect(),
                dist: Some(dist),
            },
            Err(e) => {
                warn!("Invalid {} weights ({}), drawing uniformly", name, e);
                Self {
                    options: all.to_vec(),
                    dist: None,
                }
            }
        }
    }

    fn draw(&self, rng: &mut ChaCha8Rng) -> T {
        let index = match &self.dist {
            Some(dist) => dist.sample(rng),
            None => rng.gen_range(0..self.options.len()),
        };
        self.options[index]
    }
}

pub struct FallbackAssigner {
    rng: ChaCha8Rng,
    tiers: Choices<Tier>,
    directions: Choices<Direction>,
}

impl FallbackAssigner {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            tiers: Choices::new("link", &config.link_probs, &Tier::ALL),
            directions: Choices::new("direction", &config.direction_probs, &Direction::ALL),
        }
    }

    pub fn draw_tier(&mut self) -> Tier {
        self.tiers.draw(&mut self.rng)
    }

    pub fn draw_direction(&mut self) -> Direction {
        self.directions.draw(&mut self.rng)
    }

    /// Fill whichever fields of `leg` are unresolved, tier first.
    pub fn resolve(&mut self, leg: LinkLeg) -> LinkLeg {
        let tier = match leg.tier {
            Some(t) => t,
            None => self.draw_tier(),
        };
        let direction = match leg.direction {
            Some(d) => d,
            None => self.draw_direction(),
        };
        LinkLeg::resolved(tier, direction)
    }

    /// Resolve a category if it is an unresolved link; other categories pass through.
    pub fn resolve_category(&mut self, category: Category) -> Category {
        match category {
            Category::Link(leg) if !leg.is_resolved() => Category::Link(self.resolve(leg)),
            other => other,
        }
    }

    /// Terminal sweep: a new sequence in which every link row is resolved.
    pub fn sweep(&mut self, rows: &[PointRow]) -> Vec<PointRow> {
        rows.iter()
            .map(|row| PointRow::new(self.resolve_category(row.category), row.date, row.value))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
