//! Peak and hot-window detection over minute curves
//!
//! A minute curve is a list of rows with a `minute` column and one or more
//! numeric series. Two questions get asked of every curve:
//!
//! 1. Where is the single hottest minute? ([`find_peak`])
//! 2. Which few non-overlapping windows hold the most activity?
//!    ([`top_k_intervals`])
//!
//! The window search slides a fixed-width window anchored at every row and
//! scores it with a prefix-sum lookup, then greedily keeps the best
//! non-overlapping candidates:
//!
//! ```text
//! minute: 0   1   2   3   4   5   6   7
//! value:  2  14   3   0   9   8   1   0      window = 2
//!             ┌─────┐
//!             │14+3 │  ← candidate anchored at minute 1
//!             └─────┘
//!                         ┌─────┐
//!                         │ 9+8 │  ← next best that doesn't overlap
//!                         └─────┘
//! ```
//!
//! Curves are sparse (minutes with zero activity are often absent), so a
//! window covers the rows whose minute falls inside `[anchor, anchor+w-1]`,
//! not a fixed row count. Overlap is judged on covered row ranges.

use crate::store::Row;
use serde::Serialize;

/// The hottest single minute of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakPoint {
    pub minute: i64,
    pub value: f64,
}

/// One scored window. Minutes are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub start_minute: i64,
    pub end_minute: i64,
    pub score: f64,
}

// Rows carry minutes in file order; every consumer wants them ascending.
// Sort is stable so duplicate minutes keep their file order.
fn sorted_points(rows: &[Row], series_key: &str) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = rows
        .iter()
        .map(|row| (row.num_or("minute", 0.0), row.num_or(series_key, 0.0)))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

/// Find the maximum of a series, earliest minute winning ties.
///
/// Returns `None` for an empty series and when the maximum is not
/// positive: a curve that is all zeros (usually default-filled) has no
/// peak worth annotating.
pub fn find_peak(rows: &[Row], series_key: &str) -> Option<PeakPoint> {
    let mut best: Option<(f64, f64)> = None;
    for (minute, value) in sorted_points(rows, series_key) {
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((minute, value)),
        }
    }
    best.filter(|(_, value)| *value > 0.0)
        .map(|(minute, value)| PeakPoint {
            minute: minute.round() as i64,
            value,
        })
}

/// Find up to `k` non-overlapping windows of `window_minutes` with the
/// highest series totals, returned in ascending start order.
///
/// `window_minutes` is clamped to `[1, 20]` and `k` to `[1, 5]`. Ties in
/// score go to the earlier window. Unlike [`find_peak`], an all-zero
/// series still yields its (zero-scored) best windows; the caller decides
/// whether they are worth showing.
pub fn top_k_intervals(
    rows: &[Row],
    series_key: &str,
    window_minutes: i64,
    k: usize,
) -> Vec<Interval> {
    let window = window_minutes.clamp(1, 20) as f64;
    let k = k.clamp(1, 5);

    let points = sorted_points(rows, series_key);
    if points.is_empty() {
        return Vec::new();
    }

    let mut prefix = vec![0.0; points.len() + 1];
    for (i, (_, value)) in points.iter().enumerate() {
        prefix[i + 1] = prefix[i] + value;
    }

    // (score, start row, end row) anchored at every row; `end` advances
    // monotonically because minutes are sorted.
    let mut candidates = Vec::with_capacity(points.len());
    let mut end = 0usize;
    for start in 0..points.len() {
        if end < start {
            end = start;
        }
        while end + 1 < points.len() && points[end + 1].0 <= points[start].0 + window - 1.0 {
            end += 1;
        }
        candidates.push((prefix[end + 1] - prefix[start], start, end));
    }

    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut chosen: Vec<(f64, usize, usize)> = Vec::with_capacity(k);
    for candidate in candidates {
        if chosen.len() == k {
            break;
        }
        let disjoint = chosen
            .iter()
            .all(|c| candidate.1 > c.2 || candidate.2 < c.1);
        if disjoint {
            chosen.push(candidate);
        }
    }
    chosen.sort_by_key(|c| c.1);

    chosen
        .into_iter()
        .map(|(score, start, end)| Interval {
            start_minute: points[start].0.round() as i64,
            end_minute: points[end].0.round() as i64,
            score,
        })
        .collect()
}
