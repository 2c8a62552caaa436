//! Value similarity
//!
//! `similarity(a, b) = min(a, b) / max(a, b)`: 1 when the values match, towards
//! 0 the further apart they are.

use bgdv_common::ParameterValue;

/// How a range operand is reduced to one similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeReduction {
    /// Average over the elements (statistical deviation)
    Mean,
    /// Least similar element (root selection)
    Min,
}

/// Similarity of two numbers, in 0..=1
///
/// Identical values score 1. Pairs the ratio is meaningless for (a zero
/// maximum, mixed signs) score 0.
pub fn value_similarity(a: f64, b: f64) -> f64 {
    if a == b {
        return 1.0;
    }
    let ratio = a.min(b) / a.max(b);
    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Similarity of a number to a parameter value
///
/// `None` for text values or empty ranges.
pub fn similarity_to(a: f64, value: &ParameterValue, reduction: RangeReduction) -> Option<f64> {
    match value {
        ParameterValue::Number(b) => Some(value_similarity(a, *b)),
        ParameterValue::Range(list) if !list.is_empty() => {
            let scores = list.iter().map(|b| value_similarity(a, *b));
            Some(match reduction {
                RangeReduction::Mean => scores.sum::<f64>() / list.len() as f64,
                RangeReduction::Min => scores.fold(f64::INFINITY, f64::min),
            })
        }
        _ => None,
    }
}
