use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};

const DEFAULT_BATCH_SIZE: usize = 4096;

/// Merge `bars_to_merge` rows once bar spacing drops to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConflationRule {
    pub bars_to_merge: usize,
    pub for_bar_spacing_larger_than: f64,
}

impl ConflationRule {
    #[must_use]
    pub const fn new(bars_to_merge: usize, for_bar_spacing_larger_than: f64) -> Self {
        Self {
            bars_to_merge,
            for_bar_spacing_larger_than,
        }
    }
}

/// Power-of-two table: no merging above one pixel per bar, then the factor
/// doubles every time the spacing halves.
#[must_use]
pub fn default_rules() -> Vec<ConflationRule> {
    vec![
        ConflationRule::new(1, 1.0),
        ConflationRule::new(2, 0.5),
        ConflationRule::new(4, 0.25),
        ConflationRule::new(8, 0.125),
        ConflationRule::new(16, 0.0625),
        ConflationRule::new(32, 0.031_25),
        ConflationRule::new(64, 0.0),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflationOptions {
    pub enabled: bool,
    pub rules: Vec<ConflationRule>,
    /// Rows handed to the reducers per [`super::BatchConflation::process_batch`] step.
    pub batch_size: usize,
}

impl Default for ConflationOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            rules: default_rules(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ConflationOptions {
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Vec<ConflationRule>) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Validates the table and sorts rules by decreasing threshold.
    pub fn normalized(mut self) -> ChartResult<Self> {
        if self.batch_size == 0 {
            return Err(ChartError::InvalidConfiguration(
                "conflation batch size must be > 0".to_owned(),
            ));
        }
        if self.rules.is_empty() {
            return Err(ChartError::InvalidConfiguration(
                "conflation needs at least one rule".to_owned(),
            ));
        }
        for rule in &self.rules {
            if rule.bars_to_merge == 0 {
                return Err(ChartError::InvalidConfiguration(
                    "conflation rule must merge at least one bar".to_owned(),
                ));
            }
            if !rule.for_bar_spacing_larger_than.is_finite()
                || rule.for_bar_spacing_larger_than < 0.0
            {
                return Err(ChartError::InvalidConfiguration(format!(
                    "conflation threshold must be finite and >= 0, got {}",
                    rule.for_bar_spacing_larger_than
                )));
            }
        }
        self.rules.sort_by(|left, right| {
            right
                .for_bar_spacing_larger_than
                .total_cmp(&left.for_bar_spacing_larger_than)
        });
        Ok(self)
    }

    /// Factor for `bar_spacing`: the first rule whose threshold the spacing
    /// reaches, else the last (smallest threshold) rule. Disabled options
    /// always answer `1`.
    #[must_use]
    pub fn factor_for_bar_spacing(&self, bar_spacing: f64) -> usize {
        if !self.enabled {
            return 1;
        }
        select_rule(&self.rules, bar_spacing).map_or(1, |rule| rule.bars_to_merge)
    }
}

fn select_rule(rules: &[ConflationRule], bar_spacing: f64) -> Option<ConflationRule> {
    rules
        .iter()
        .copied()
        .find(|rule| bar_spacing >= rule.for_bar_spacing_larger_than)
        .or_else(|| rules.last().copied())
}
