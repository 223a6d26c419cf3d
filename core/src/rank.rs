//! Arg-max, arg-sort and the top-5 rank of a ground-truth label.
//!
//! The rank inspects fixed positions 999..=995 of the ascending arg-sort,
//! i.e. the five highest scores of a 1000-class output. Outputs with other
//! class counts are not remapped: more than 1000 scores shifts which classes
//! land on those positions, fewer than 1000 is an error.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{MigxError, Result};

/// Positions of the ascending arg-sort checked for first..fifth place.
pub const RANK_POSITIONS: [usize; 5] = [999, 998, 997, 996, 995];

/// Where the true label landed among the top five.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Missing,
}

impl Rank {
    fn from_place(place: usize) -> Self {
        match place {
            0 => Self::First,
            1 => Self::Second,
            2 => Self::Third,
            3 => Self::Fourth,
            4 => Self::Fifth,
            _ => Self::Missing,
        }
    }

    /// Counted towards top-1 accuracy.
    pub fn is_top1(&self) -> bool {
        *self == Self::First
    }

    /// Counted towards top-5 accuracy.
    pub fn is_top5(&self) -> bool {
        *self != Self::Missing
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
            Self::Fourth => "fourth",
            Self::Fifth => "fifth",
            Self::Missing => "missing",
        };
        f.write_str(s)
    }
}

/// Rank of a label plus the class indices found at [`RANK_POSITIONS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopFive {
    pub rank: Rank,
    pub classes: [usize; 5],
}

/// Total order on scores with NaN above every number.
fn compare(a: f32, b: f32) -> Ordering {
    a.is_nan()
        .cmp(&b.is_nan())
        .then_with(|| a.partial_cmp(&b).unwrap_or(Ordering::Equal))
}

/// Index of the first maximum, `None` for an empty slice. A NaN counts as
/// the maximum.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if compare(v, b) != Ordering::Greater => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Indices that sort `scores` ascending; ties keep index order and NaN
/// scores sort last.
pub fn argsort(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| compare(scores[a], scores[b]));
    order
}

/// Classify `label` against the top five of `scores`.
pub fn rank_label(scores: &[f32], label: usize) -> Result<TopFive> {
    if scores.len() <= RANK_POSITIONS[0] {
        return Err(MigxError::tensor(format!(
            "Expected at least {} class scores, got {}",
            RANK_POSITIONS[0] + 1,
            scores.len()
        )));
    }
    let order = argsort(scores);
    let classes = RANK_POSITIONS.map(|pos| order[pos]);
    let place = classes
        .iter()
        .position(|&c| c == label)
        .unwrap_or(classes.len());
    Ok(TopFive {
        rank: Rank::from_place(place),
        classes,
    })
}
