// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Audience Targeting
//
// Every auction carries the properties of the user it is shown to. Campaigns
// may restrict themselves to a set of values per property; an auction is
// relevant to a campaign only when every targeted property matches.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::SimulationError;

/// Property name → value drawn for one auction.
pub type UserProperties = BTreeMap<String, u32>;

// ─── Audience ───────────────────────────────────────────────────────────────

/// User population: for each property, the relative weight of each value.
/// Value `i` of a property is drawn with probability `weights[i] / sum`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudienceConfig {
    pub properties: BTreeMap<String, Vec<f64>>,
}

impl AudienceConfig {
    pub fn new<K: Into<String>>(properties: impl IntoIterator<Item = (K, Vec<f64>)>) -> Result<Self, SimulationError> {
        let audience = Self { properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect() };
        audience.validate()?;
        Ok(audience)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        for (name, weights) in &self.properties {
            let valid = weights.iter().all(|w| w.is_finite() && *w >= 0.0);
            if !valid || weights.iter().sum::<f64>() <= 0.0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "user property {name} needs non-negative weights with a positive sum, got {weights:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Draw one value per property into `out`, overwriting previous draws.
    pub fn sample_into(&self, rng: &mut ChaCha8Rng, out: &mut UserProperties) {
        for (name, weights) in &self.properties {
            let value = weighted_index(rng, weights);
            match out.get_mut(name) {
                Some(slot) => *slot = value,
                None => {
                    out.insert(name.clone(), value);
                }
            }
        }
    }
}

fn weighted_index(rng: &mut ChaCha8Rng, weights: &[f64]) -> u32 {
    let total: f64 = weights.iter().sum();
    let mut r = rng.gen::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        if r < *w {
            return i as u32;
        }
        r -= w;
    }
    // rounding can leave r just above the last bucket
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(0) as u32
}

// ─── Targeting ──────────────────────────────────────────────────────────────

/// Accepted values per property. Properties not listed are unrestricted, so
/// an empty set of groups matches every auction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetingGroups(BTreeMap<String, BTreeSet<u32>>);

impl TargetingGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: impl Into<String>, values: impl IntoIterator<Item = u32>) -> Self {
        self.0.insert(property.into(), values.into_iter().collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, property: &str) -> Option<&BTreeSet<u32>> {
        self.0.get(property)
    }

    /// An auction matches when, for every targeted property, the user has a
    /// value and it is one of the accepted ones.
    pub fn matches(&self, user: &UserProperties) -> bool {
        self.0
            .iter()
            .all(|(property, accepted)| user.get(property).is_some_and(|v| accepted.contains(v)))
    }

    /// Random groups over `audience`: each property is targeted with a
    /// uniformly drawn number of distinct values, zero meaning untargeted.
    pub fn generate(audience: &AudienceConfig, rng: &mut ChaCha8Rng) -> Self {
        let mut groups = Self::new();
        for (property, weights) in &audience.properties {
            let n = weights.len();
            let k = rng.gen_range(0..=n);
            if k > 0 {
                let values = rand::seq::index::sample(rng, n, k).into_iter().map(|i| i as u32);
                groups = groups.with(property.clone(), values);
            }
        }
        groups
    }
}
