//! Cross-episode distribution comparison
//!
//! Distribution tables hold `(label, ratio)` rows per episode. Comparing
//! them across episodes needs one shared category axis, and how that axis
//! is built depends on the vocabulary:
//!
//! * **Closed** (emotions, polarity): the axis is the fixed label order.
//!   Every selected episode gets a row with every category present, 0
//!   where its table or a label is missing. Labels outside the vocabulary
//!   (upstream drift) fold into the sentinel bucket.
//! * **Open** (function tags): tags are ranked by mean ratio across the
//!   episodes that actually have the table, the top `n` become named
//!   categories, and each episode's remainder lands in a synthetic
//!   `other = max(0, 1 - sum named)` so inconsistent upstream rounding
//!   never produces a negative bucket. Only episodes with data get rows.
//!
//! When no selected episode has any relevant rows the comparison is empty
//! rather than a grid of fabricated zeros; the `missing` list (a presence
//! check on the table, not its rows) tells the caller who lacked data
//! either way.

use crate::color::color_for;
use crate::ingest::classify::{TableKind, Vocabulary};
use crate::store::{EpisodeId, Row, Store, Table};
use serde::Serialize;
use std::collections::BTreeMap;

/// One episode's ratios, aligned with the comparison's category axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    pub episode: EpisodeId,
    pub ratios: Vec<f64>,
}

/// A chart-ready comparison: shared categories, their colors, one ratio
/// row per episode, and the episodes that lacked the table entirely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionComparison {
    pub kind: TableKind,
    pub categories: Vec<String>,
    /// `colors[i]` colors `categories[i]`.
    pub colors: Vec<String>,
    pub rows: Vec<DistributionRow>,
    pub missing: Vec<EpisodeId>,
}

impl DistributionComparison {
    fn empty(kind: TableKind, missing: Vec<EpisodeId>) -> Self {
        DistributionComparison {
            kind,
            categories: Vec::new(),
            colors: Vec::new(),
            rows: Vec::new(),
            missing,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Label cells go through the canonical form so a numeric-looking tag
// ("03") matches itself across episodes; a row with no label at all
// counts toward the vocabulary's sentinel bucket.
fn ratio_map(table: &Table, sentinel: &str) -> BTreeMap<String, f64> {
    let mut map = BTreeMap::new();
    for row in &table.rows {
        let label = match row.label("label") {
            Some(label) if !label.is_empty() => label,
            _ => sentinel.to_string(),
        };
        *map.entry(label).or_insert(0.0) += row.num_or("ratio", 0.0);
    }
    map
}

fn entry_label(row: &Row, sentinel: &str) -> String {
    match row.label("label") {
        Some(label) if !label.is_empty() => label,
        _ => sentinel.to_string(),
    }
}

/// Compare one distribution kind across the selected episodes.
///
/// `top_n` bounds the named categories in open-vocabulary mode (at least
/// one named category is always kept; surfaces that take user input clamp
/// their bound before calling). Closed-vocabulary kinds ignore it.
pub fn compare_distributions(
    store: &Store,
    episodes: &[EpisodeId],
    kind: TableKind,
    top_n: usize,
) -> DistributionComparison {
    let Some(vocabulary) = kind.vocabulary() else {
        return DistributionComparison::empty(kind, Vec::new());
    };
    let sentinel = vocabulary.sentinel();

    let missing: Vec<EpisodeId> = episodes
        .iter()
        .filter(|ep| store.table(ep, kind).is_none())
        .cloned()
        .collect();

    let with_rows: Vec<(&EpisodeId, &Table)> = episodes
        .iter()
        .filter_map(|ep| store.table(ep, kind).map(|t| (ep, t)))
        .filter(|(_, t)| !t.rows.is_empty())
        .collect();
    if with_rows.is_empty() {
        return DistributionComparison::empty(kind, missing);
    }

    match vocabulary.fixed_labels() {
        Some(labels) => {
            let categories: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
            let sentinel_pos = labels
                .iter()
                .position(|l| *l == sentinel)
                .unwrap_or(labels.len() - 1);

            let rows = episodes
                .iter()
                .map(|ep| {
                    let mut ratios = vec![0.0; categories.len()];
                    if let Some(table) = store.table(ep, kind) {
                        for (label, ratio) in ratio_map(table, sentinel) {
                            match labels.iter().position(|l| *l == label) {
                                Some(pos) => ratios[pos] += ratio,
                                None => ratios[sentinel_pos] += ratio,
                            }
                        }
                    }
                    DistributionRow {
                        episode: ep.clone(),
                        ratios,
                    }
                })
                .collect();

            let colors = categories
                .iter()
                .map(|c| color_for(c, vocabulary))
                .collect();
            DistributionComparison {
                kind,
                categories,
                colors,
                rows,
                missing,
            }
        }
        None => {
            let maps: Vec<(&EpisodeId, BTreeMap<String, f64>)> = with_rows
                .iter()
                .map(|(ep, table)| (*ep, ratio_map(table, sentinel)))
                .collect();

            // Mean over the episodes that have data; the explicit `other`
            // tag never competes for a named slot (its mass comes back
            // through the residual).
            let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
            for (_, map) in &maps {
                for (label, ratio) in map {
                    if label != "other" {
                        *sums.entry(label.as_str()).or_insert(0.0) += ratio;
                    }
                }
            }
            let count = maps.len() as f64;
            let mut ranked: Vec<(&str, f64)> = sums
                .into_iter()
                .map(|(label, sum)| (label, sum / count))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
            ranked.truncate(top_n.max(1));

            let mut categories: Vec<String> =
                ranked.iter().map(|(label, _)| label.to_string()).collect();
            categories.push("other".to_string());

            let rows = maps
                .iter()
                .map(|(ep, map)| {
                    let mut ratios: Vec<f64> = ranked
                        .iter()
                        .map(|(label, _)| map.get(*label).copied().unwrap_or(0.0))
                        .collect();
                    let named_sum: f64 = ratios.iter().sum();
                    ratios.push((1.0 - named_sum).max(0.0));
                    DistributionRow {
                        episode: (*ep).clone(),
                        ratios,
                    }
                })
                .collect();

            let colors = categories
                .iter()
                .map(|c| color_for(c, vocabulary))
                .collect();
            DistributionComparison {
                kind,
                categories,
                colors,
                rows,
                missing,
            }
        }
    }
}

/// The top `n` `(label, ratio)` entries of one episode's distribution
/// table, ratio descending, input order breaking ties. Empty when the
/// table is missing.
pub fn top_entries(
    store: &Store,
    episode: &EpisodeId,
    kind: TableKind,
    n: usize,
) -> Vec<(String, f64)> {
    let Some(table) = store.table(episode, kind) else {
        return Vec::new();
    };
    let sentinel = kind
        .vocabulary()
        .map(Vocabulary::sentinel)
        .unwrap_or("other");

    let mut entries: Vec<(String, f64)> = table
        .rows
        .iter()
        .map(|row| (entry_label(row, sentinel), row.num_or("ratio", 0.0)))
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{stable_color, OTHER_COLOR};
    use crate::store::StoreUpdate;

    fn dist_table(kind: TableKind, entries: &[(&str, f64)]) -> Table {
        let rows = entries
            .iter()
            .map(|(label, ratio)| {
                let mut row = Row::new();
                row.set_text("label", *label);
                row.set_num("ratio", *ratio);
                row
            })
            .collect();
        Table::new(kind, rows)
    }

    fn store_with(tables: Vec<(&str, TableKind, Table)>) -> Store {
        let updates = tables
            .into_iter()
            .map(|(ep, kind, table)| StoreUpdate::EpisodeTable {
                episode: EpisodeId::new(ep),
                kind,
                table,
            })
            .collect();
        Store::from_updates(updates)
    }

    fn ids(raw: &[&str]) -> Vec<EpisodeId> {
        raw.iter().map(|s| EpisodeId::new(*s)).collect()
    }

    // ==========================================================================
    // OPEN-VOCABULARY TESTS
    // ==========================================================================

    #[test]
    fn ranks_by_mean_and_buckets_the_rest_into_other() {
        // Two function tables; with a bound of 2 the aggregator keeps
        // spoiler (mean 0.4) and greet (mean 0.25) and pushes hype and
        // other_tag into each episode's residual.
        let store = store_with(vec![
            (
                "1",
                TableKind::DanmakuFuncDist,
                dist_table(
                    TableKind::DanmakuFuncDist,
                    &[("greet", 0.4), ("spoiler", 0.3), ("other_tag", 0.3)],
                ),
            ),
            (
                "2",
                TableKind::DanmakuFuncDist,
                dist_table(
                    TableKind::DanmakuFuncDist,
                    &[("greet", 0.1), ("spoiler", 0.5), ("hype", 0.4)],
                ),
            ),
        ]);

        let cmp = compare_distributions(&store, &ids(&["1", "2"]), TableKind::DanmakuFuncDist, 2);

        assert_eq!(cmp.categories, ["spoiler", "greet", "other"]);
        assert_eq!(cmp.rows.len(), 2);
        assert_eq!(cmp.rows[0].episode.as_str(), "1");
        assert_eq!(cmp.rows[0].ratios[..2], [0.3, 0.4]);
        assert_eq!(cmp.rows[1].ratios[..2], [0.5, 0.1]);
        // residuals are float arithmetic, so compare with a tolerance
        assert!((cmp.rows[0].ratios[2] - 0.3).abs() < 1e-9);
        assert!((cmp.rows[1].ratios[2] - 0.4).abs() < 1e-9);
        assert!(cmp.missing.is_empty());

        // named + other stays at 1 when the inputs summed to 1
        for row in &cmp.rows {
            let total: f64 = row.ratios.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn residual_other_is_never_negative() {
        // upstream rounding pushed the sum over 1
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuFuncDist,
            dist_table(TableKind::DanmakuFuncDist, &[("a", 0.7), ("b", 0.5)]),
        )]);
        let cmp = compare_distributions(&store, &ids(&["1"]), TableKind::DanmakuFuncDist, 5);
        assert_eq!(cmp.categories, ["a", "b", "other"]);
        assert_eq!(*cmp.rows[0].ratios.last().unwrap(), 0.0);
    }

    #[test]
    fn explicit_other_rows_never_take_a_named_slot() {
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuFuncDist,
            dist_table(TableKind::DanmakuFuncDist, &[("other", 0.5), ("greet", 0.5)]),
        )]);
        let cmp = compare_distributions(&store, &ids(&["1"]), TableKind::DanmakuFuncDist, 5);

        assert_eq!(cmp.categories, ["greet", "other"]);
        // the explicit mass comes back through the residual
        assert_eq!(cmp.rows[0].ratios, [0.5, 0.5]);
    }

    #[test]
    fn mean_ties_break_alphabetically() {
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuFuncDist,
            dist_table(TableKind::DanmakuFuncDist, &[("bb", 0.3), ("aa", 0.3), ("cc", 0.4)]),
        )]);
        let cmp = compare_distributions(&store, &ids(&["1"]), TableKind::DanmakuFuncDist, 3);
        assert_eq!(cmp.categories, ["cc", "aa", "bb", "other"]);
    }

    #[test]
    fn episodes_without_the_table_dilute_nothing() {
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuFuncDist,
            dist_table(TableKind::DanmakuFuncDist, &[("a", 0.6), ("b", 0.4)]),
        )]);
        let cmp = compare_distributions(&store, &ids(&["1", "2"]), TableKind::DanmakuFuncDist, 3);

        // means are over the one episode with data, rows exist only for it
        assert_eq!(cmp.categories, ["a", "b", "other"]);
        assert_eq!(cmp.rows.len(), 1);
        assert_eq!(cmp.rows[0].ratios[0], 0.6);
        assert_eq!(cmp.missing, ids(&["2"]));
    }

    // ==========================================================================
    // CLOSED-VOCABULARY TESTS
    // ==========================================================================

    #[test]
    fn closed_mode_emits_the_full_fixed_axis_for_every_episode() {
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuEmoDist,
            dist_table(TableKind::DanmakuEmoDist, &[("joy", 0.6), ("anger", 0.4)]),
        )]);
        let cmp = compare_distributions(&store, &ids(&["1", "2"]), TableKind::DanmakuEmoDist, 8);

        assert_eq!(
            cmp.categories,
            ["joy", "like", "surprise", "anger", "sadness", "fear", "disgust", "other"]
        );
        assert_eq!(cmp.rows.len(), 2);
        assert_eq!(cmp.rows[0].ratios[0], 0.6);
        assert_eq!(cmp.rows[0].ratios[3], 0.4);
        // the episode with no table at all is an all-zero row, and flagged
        assert!(cmp.rows[1].ratios.iter().all(|r| *r == 0.0));
        assert_eq!(cmp.missing, ids(&["2"]));
    }

    #[test]
    fn unknown_closed_labels_fold_into_the_sentinel() {
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuModelEmoDist,
            dist_table(
                TableKind::DanmakuModelEmoDist,
                &[("pos", 0.5), ("mixed", 0.2), ("neg", 0.3)],
            ),
        )]);
        let cmp =
            compare_distributions(&store, &ids(&["1"]), TableKind::DanmakuModelEmoDist, 8);

        assert_eq!(cmp.categories, ["pos", "neu", "neg"]);
        assert_eq!(cmp.rows[0].ratios, [0.5, 0.2, 0.3]);
    }

    #[test]
    fn no_relevant_rows_means_an_empty_result_not_zero_rows() {
        // one episode has an empty table, the other has none
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuEmoDist,
            Table::new(TableKind::DanmakuEmoDist, vec![]),
        )]);
        let cmp = compare_distributions(&store, &ids(&["1", "2"]), TableKind::DanmakuEmoDist, 8);

        assert!(cmp.is_empty());
        assert!(cmp.categories.is_empty());
        // presence check: only the episode with no table at all is missing
        assert_eq!(cmp.missing, ids(&["2"]));
    }

    #[test]
    fn non_distribution_kinds_compare_to_nothing() {
        let store = store_with(vec![]);
        let cmp = compare_distributions(&store, &ids(&["1"]), TableKind::Burst2s, 8);
        assert!(cmp.is_empty());
    }

    // ==========================================================================
    // COLOR AXIS TESTS
    // ==========================================================================

    #[test]
    fn colors_align_with_categories() {
        let store = store_with(vec![
            (
                "1",
                TableKind::DanmakuEmoDist,
                dist_table(TableKind::DanmakuEmoDist, &[("joy", 1.0)]),
            ),
            (
                "1",
                TableKind::DanmakuFuncDist,
                dist_table(TableKind::DanmakuFuncDist, &[("greet", 1.0)]),
            ),
        ]);

        let closed = compare_distributions(&store, &ids(&["1"]), TableKind::DanmakuEmoDist, 8);
        assert_eq!(closed.colors.len(), closed.categories.len());
        assert_eq!(closed.colors[0], "#f6c344");
        assert_eq!(closed.colors.last().unwrap(), OTHER_COLOR);

        let open = compare_distributions(&store, &ids(&["1"]), TableKind::DanmakuFuncDist, 3);
        assert_eq!(open.colors[0], stable_color("greet"));
        assert_eq!(open.colors.last().unwrap(), OTHER_COLOR);
    }

    // ==========================================================================
    // TOP-ENTRY TESTS
    // ==========================================================================

    #[test]
    fn top_entries_rank_by_ratio_with_input_order_ties() {
        let store = store_with(vec![(
            "1",
            TableKind::DanmakuEmoDist,
            dist_table(
                TableKind::DanmakuEmoDist,
                &[("joy", 0.2), ("anger", 0.5), ("like", 0.2), ("fear", 0.1)],
            ),
        )]);

        let top = top_entries(&store, &EpisodeId::new("1"), TableKind::DanmakuEmoDist, 3);
        assert_eq!(
            top,
            vec![
                ("anger".to_string(), 0.5),
                ("joy".to_string(), 0.2),
                ("like".to_string(), 0.2),
            ]
        );

        assert!(top_entries(&store, &EpisodeId::new("9"), TableKind::DanmakuEmoDist, 3).is_empty());
    }
}
