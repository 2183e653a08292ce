//! Turning objective weights into integer question counts.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigurationError;
use crate::model::ObjectiveId;

/// Nominal base used when the session has no fixed question count.
const UNBOUNDED_BASE: f64 = 100.0;

/// How many questions a distribution must add up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionBudget {
    /// Open-ended; shares are rounded against a base of 100 with no exact sum.
    Unbounded,
    Fixed(u32),
}

impl QuestionBudget {
    #[must_use]
    pub fn fixed(self) -> Option<u32> {
        match self {
            Self::Unbounded => None,
            Self::Fixed(n) => Some(n),
        }
    }
}

/// Questions assigned to one objective.
///
/// `target_count` is signed: the last objective absorbs the rounding remainder
/// and can fall below one when earlier objectives were rounded up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub objective_id: ObjectiveId,
    pub target_count: i64,
    pub weight_percent: f64,
}

/// Distribute `budget` questions over `weights` proportionally.
///
/// Every objective but the last gets `max(1, round(total * w / sum))`; the last
/// takes `total - assigned` so fixed budgets always sum exactly.
///
/// # Errors
///
/// - `EmptyObjectives` for an empty list
/// - `InvalidWeight` for a negative or non-finite weight
/// - `ZeroTotalWeight` when the weights sum to zero
pub fn distribute(
    weights: &[(ObjectiveId, f64)],
    budget: QuestionBudget,
) -> Result<Vec<Allocation>, ConfigurationError> {
    if weights.is_empty() {
        return Err(ConfigurationError::EmptyObjectives);
    }
    if let Some((id, _)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
        return Err(ConfigurationError::InvalidWeight(id.clone()));
    }
    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if sum <= 0.0 {
        return Err(ConfigurationError::ZeroTotalWeight);
    }

    let percent = |w: f64| 100.0 * w / sum;

    let Some(total) = budget.fixed() else {
        return Ok(weights
            .iter()
            .map(|(id, w)| Allocation {
                objective_id: id.clone(),
                #[allow(clippy::cast_possible_truncation)]
                target_count: (UNBOUNDED_BASE * w / sum).round() as i64,
                weight_percent: percent(*w),
            })
            .collect());
    };

    let total = i64::from(total);
    let (last, head) = weights
        .split_last()
        .ok_or(ConfigurationError::EmptyObjectives)?;

    let mut out = Vec::with_capacity(weights.len());
    let mut assigned = 0_i64;
    for (id, w) in head {
        #[allow(clippy::cast_possible_truncation)]
        let count = ((total as f64 * w / sum).round() as i64).max(1);
        assigned += count;
        out.push(Allocation {
            objective_id: id.clone(),
            target_count: count,
            weight_percent: percent(*w),
        });
    }

    let remainder = total - assigned;
    if remainder < 1 {
        warn!(
            objective = %last.0,
            remainder,
            total,
            "rounding over-allocated earlier objectives; last objective gets no questions"
        );
    }
    out.push(Allocation {
        objective_id: last.0.clone(),
        target_count: remainder,
        weight_percent: percent(last.1),
    });

    Ok(out)
}
