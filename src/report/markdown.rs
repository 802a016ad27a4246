//! Markdown narrative synthesis
//!
//! The narrative is pure templating over the analytics outputs: scalar
//! stats for the focus episode, caption sentences quoting the live top-3
//! distribution entries and the curve peak, per-episode comparison
//! bullets when more than one episode is selected, two conclusion
//! scaffolds meant to be hand-edited, and the distribution comparison as
//! a table. It deliberately contains no analysis of its own; if a number
//! here looks wrong, the pipeline that produced it is wrong.
//!
//! Missing inputs render as explicit placeholder lines. A report over a
//! half-empty store is still a complete document.

use super::ReportParams;
use crate::analytics::{curve_rows, find_peak, top_entries, top_k_intervals};
use crate::ingest::classify::TableKind;
use crate::store::{Cell, Store};

fn fmt_num(value: f64) -> String {
    Cell::Num(value).label()
}

fn fmt_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

// "joy (45.0%), anger (30.0%) and like (25.0%)"
fn join_entries(entries: &[(String, f64)]) -> String {
    let parts: Vec<String> = entries
        .iter()
        .map(|(label, ratio)| format!("{} ({})", label, fmt_percent(*ratio)))
        .collect();
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => format!(
            "{} and {}",
            parts[..parts.len() - 1].join(", "),
            parts[parts.len() - 1]
        ),
    }
}

fn comma_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the full narrative for one parameter set.
pub fn build_report(store: &Store, params: &ReportParams, generated: &str) -> String {
    let mut out = String::new();
    let focus = &params.focus;

    out.push_str(&format!("# Episode {} viewing-response report\n\n", focus));
    out.push_str(&format!("_Generated {}_\n\n", generated));

    // ---- scalar stats ----
    out.push_str("## Scalar statistics\n\n");
    let stats = super::stats_table(store, std::slice::from_ref(focus));
    match stats.rows.first() {
        Some(row) => {
            out.push_str("| stat | value |\n| --- | --- |\n");
            for key in stats.columns.iter().filter(|c| c.as_str() != "episode") {
                let value = row.label(key).unwrap_or_default();
                out.push_str(&format!("| {} | {} |\n", key, value));
            }
            out.push('\n');
        }
        None => {
            out.push_str(&format!(
                "_No scalar statistics available for episode {}._\n\n",
                focus
            ));
        }
    }

    // ---- caption sentences ----
    out.push_str("## Highlights\n\n");

    let emotions = top_entries(store, focus, TableKind::DanmakuEmoDist, 3);
    if emotions.is_empty() {
        out.push_str("- No danmaku emotion distribution is available for this episode.\n");
    } else {
        out.push_str(&format!(
            "- The danmaku emotion mix is led by {}.\n",
            join_entries(&emotions)
        ));
    }

    let functions = top_entries(store, focus, TableKind::DanmakuFuncDist, 3);
    if functions.is_empty() {
        out.push_str("- No danmaku function distribution is available for this episode.\n");
    } else {
        out.push_str(&format!(
            "- The most common message functions are {}.\n",
            join_entries(&functions)
        ));
    }

    let rows = curve_rows(store, focus, params.curve_kind);
    match find_peak(rows, &params.series) {
        Some(peak) => {
            out.push_str(&format!(
                "- The `{}` series of the {} peaks at minute {} with {} messages.\n",
                params.series,
                params.curve_kind.label(),
                peak.minute,
                fmt_num(peak.value)
            ));
        }
        None => {
            out.push_str(&format!(
                "- The {} shows no activity peak.\n",
                params.curve_kind.label()
            ));
        }
    }

    let intervals = top_k_intervals(rows, &params.series, params.window_minutes, params.intervals);
    if !intervals.is_empty() {
        let windows: Vec<String> = intervals
            .iter()
            .map(|i| format!("{}-{}", i.start_minute, i.end_minute))
            .collect();
        out.push_str(&format!(
            "- The busiest {}-minute windows are {}.\n",
            params.window_minutes,
            comma_list(&windows)
        ));
    }
    out.push('\n');

    // ---- per-episode comparison, only in multi-episode mode ----
    let multi = params.episodes.len() >= 2;
    if multi {
        out.push_str("## Episode comparison\n\n");
        for episode in &params.episodes {
            let total = store
                .basic_stats(episode)
                .and_then(|row| row.num("danmaku_total"))
                .or_else(|| {
                    store
                        .episode_stats_row(episode)
                        .and_then(|row| row.num("danmaku_total"))
                });
            let total = match total {
                Some(t) => format!("{} danmaku", fmt_num(t)),
                None => "no danmaku total on record".to_string(),
            };
            let peak = find_peak(
                curve_rows(store, episode, params.curve_kind),
                &params.series,
            );
            let peak = match peak {
                Some(p) => format!("peak at minute {} ({})", p.minute, fmt_num(p.value)),
                None => "no activity peak".to_string(),
            };
            out.push_str(&format!("- Episode {}: {}, {}.\n", episode, total, peak));
        }
        out.push('\n');
    }

    // ---- conclusion scaffolds ----
    out.push_str("## Conclusions (edit before publishing)\n\n");
    if multi {
        out.push_str(&format!(
            "1. Across episodes {}, the `{}` curves suggest that ... (describe the shared pattern here).\n",
            comma_list(&params.episodes),
            params.series
        ));
        out.push_str(&format!(
            "2. The {} comparison indicates that ... (name the strongest contrast and a likely cause here).\n\n",
            params.dist_kind.label()
        ));
    } else {
        out.push_str(&format!(
            "1. Episode {} shows ... (summarize the dominant reaction pattern here).\n",
            focus
        ));
        out.push_str(&format!(
            "2. Its {} profile suggests that ... (interpret the leading categories here).\n\n",
            params.dist_kind.label()
        ));
    }

    // ---- distribution comparison table ----
    out.push_str(&format!("## {} comparison\n\n", params.dist_kind.label()));
    let cmp = crate::analytics::compare_distributions(
        store,
        &params.episodes,
        params.dist_kind,
        params.top_n,
    );
    if cmp.is_empty() {
        out.push_str(&format!(
            "_No {} data for the selected episodes._\n",
            params.dist_kind.label()
        ));
    } else {
        out.push_str(&format!("| episode | {} |\n", cmp.categories.join(" | ")));
        out.push_str(&format!(
            "| --- |{}\n",
            " --- |".repeat(cmp.categories.len())
        ));
        for row in &cmp.rows {
            let cells: Vec<String> = row.ratios.iter().map(|r| fmt_percent(*r)).collect();
            out.push_str(&format!(
                "| {} | {} |\n",
                row.episode,
                cells.join(" | ")
            ));
        }
    }
    if !cmp.missing.is_empty() {
        out.push_str(&format!(
            "\n_Episodes without this table: {}._\n",
            comma_list(&cmp.missing)
        ));
    }

    out
}
