//! Read-only analytics over a store snapshot
//!
//! Nothing in here mutates the store or fails: analytics run after
//! ingestion on an immutable snapshot, and missing data degrades to empty
//! results the callers render as placeholders.

pub mod distribution;
pub mod peaks;

pub use distribution::{compare_distributions, top_entries, DistributionComparison, DistributionRow};
pub use peaks::{find_peak, top_k_intervals, Interval, PeakPoint};

use crate::ingest::classify::TableKind;
use crate::store::{EpisodeId, Row, Store};
use std::collections::BTreeSet;

/// Rows of one episode's minute curve, empty when the table is missing.
pub fn curve_rows<'a>(store: &'a Store, episode: &EpisodeId, kind: TableKind) -> &'a [Row] {
    store
        .table(episode, kind)
        .map(|t| t.rows.as_slice())
        .unwrap_or(&[])
}

/// The numeric series names one episode's curve offers, sorted.
pub fn series_options(store: &Store, episode: &EpisodeId, kind: TableKind) -> Vec<String> {
    store
        .table(episode, kind)
        .map(|t| t.numeric_keys_except("minute"))
        .unwrap_or_default()
}

/// Every numeric series any of the selected episodes' curves offer,
/// sorted and deduplicated. This is the series menu for a selection.
pub fn series_union(store: &Store, episodes: &[EpisodeId], kind: TableKind) -> Vec<String> {
    let mut available = BTreeSet::new();
    for episode in episodes {
        available.extend(series_options(store, episode, kind));
    }
    available.into_iter().collect()
}

/// Pick the series to plot: the requested one when any selected episode
/// carries it, else `total`, else the alphabetically first series on
/// offer. Falls back to the request verbatim when no curve has data (the
/// resulting chart is empty either way).
pub fn resolve_series(
    store: &Store,
    episodes: &[EpisodeId],
    kind: TableKind,
    requested: &str,
) -> String {
    let available = series_union(store, episodes, kind);
    if available.iter().any(|s| s == requested) {
        return requested.to_string();
    }
    if available.iter().any(|s| s == "total") {
        return "total".to_string();
    }
    available
        .into_iter()
        .next()
        .unwrap_or_else(|| requested.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreUpdate, Table};

    fn curve_table(series: &[(&str, f64)]) -> Table {
        let mut row = Row::new();
        row.set_num("minute", 0.0);
        for (key, value) in series {
            row.set_num(*key, *value);
        }
        Table::new(TableKind::MinuteEmoCurve, vec![row])
    }

    fn store_with_curve(episode: &str, series: &[(&str, f64)]) -> Store {
        Store::from_updates(vec![StoreUpdate::EpisodeTable {
            episode: EpisodeId::new(episode),
            kind: TableKind::MinuteEmoCurve,
            table: curve_table(series),
        }])
    }

    #[test]
    fn missing_curves_read_as_empty() {
        let store = Store::new();
        assert!(curve_rows(&store, &EpisodeId::new("1"), TableKind::MinuteEmoCurve).is_empty());
        assert!(series_options(&store, &EpisodeId::new("1"), TableKind::MinuteEmoCurve).is_empty());
    }

    #[test]
    fn series_union_merges_and_sorts_across_episodes() {
        let mut store = store_with_curve("1", &[("joy", 1.0), ("total", 5.0)]);
        store.apply(StoreUpdate::EpisodeTable {
            episode: EpisodeId::new("2"),
            kind: TableKind::MinuteEmoCurve,
            table: curve_table(&[("anger", 2.0), ("total", 3.0)]),
        });

        let eps = vec![EpisodeId::new("1"), EpisodeId::new("2")];
        assert_eq!(
            series_union(&store, &eps, TableKind::MinuteEmoCurve),
            vec!["anger", "joy", "total"]
        );
    }

    #[test]
    fn series_resolution_prefers_request_then_total_then_first() {
        let store = store_with_curve("1", &[("joy", 1.0), ("total", 5.0), ("anger", 2.0)]);
        let eps = vec![EpisodeId::new("1")];

        assert_eq!(
            resolve_series(&store, &eps, TableKind::MinuteEmoCurve, "joy"),
            "joy"
        );
        assert_eq!(
            resolve_series(&store, &eps, TableKind::MinuteEmoCurve, "zeal"),
            "total"
        );

        let no_total = store_with_curve("1", &[("joy", 1.0), ("anger", 2.0)]);
        assert_eq!(
            resolve_series(&no_total, &eps, TableKind::MinuteEmoCurve, "zeal"),
            "anger"
        );

        let empty = Store::new();
        assert_eq!(
            resolve_series(&empty, &eps, TableKind::MinuteEmoCurve, "zeal"),
            "zeal"
        );
    }
}
