//! Report generation for analysis results
//!
//! Everything a report shows is computed here once, into a [`ReportBundle`]:
//! chart-ready curve lines with their peak/interval annotations, the
//! distribution comparison, term and burst rankings, the scalar-stats
//! table, diagnostics, and the rendered markdown narrative. The output
//! writers below are dumb renderers over that one value:
//!
//! - **Markdown**: the narrative report alone (`.md`)
//! - **HTML**: self-contained dashboard, bundle embedded as JSON (`.html`)
//! - **JSON**: the bundle itself, for programmatic consumption (anything else)
//!
//! # Usage
//!
//! ```ignore
//! use episcope::report::{self, ParamSpec, ReportParams};
//!
//! let params = ReportParams::resolve(&store, &ParamSpec::default()).unwrap();
//! let bundle = report::build_bundle(&store, params);
//! report::generate("report.html", &bundle)?;   // dashboard
//! report::generate("report.json", &bundle)?;   // machine-readable
//! ```

pub mod html;
pub mod json;
pub mod markdown;

use crate::analytics::{
    compare_distributions, curve_rows, find_peak, resolve_series, series_union, top_k_intervals,
    DistributionComparison, Interval, PeakPoint,
};
use crate::color::stable_color;
use crate::ingest::classify::{curve_kind_from_name, dist_kind_from_name, TableKind};
use crate::store::{EpisodeId, Row, SkipRecord, Store};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Seek, Write};
use std::path::Path;

/// Raw, possibly-invalid report options as a user typed them. Resolution
/// against a store turns these into [`ReportParams`].
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Focus episode id; `None` means the first known episode.
    pub focus: Option<String>,
    /// Episodes to compare; `None` or an all-unknown list means every one.
    pub episodes: Option<Vec<String>>,
    pub curve: String,
    pub series: String,
    pub window_minutes: i64,
    pub intervals: usize,
    pub dist: String,
    pub top_n: usize,
}

impl Default for ParamSpec {
    fn default() -> Self {
        ParamSpec {
            focus: None,
            episodes: None,
            curve: "emo".to_string(),
            series: "total".to_string(),
            window_minutes: 5,
            intervals: 3,
            dist: "danmaku-emo".to_string(),
            top_n: 8,
        }
    }
}

/// Validated report parameters: every id is known, every bound clamped.
#[derive(Debug, Clone, Serialize)]
pub struct ReportParams {
    pub focus: EpisodeId,
    pub episodes: Vec<EpisodeId>,
    pub curve_kind: TableKind,
    pub series: String,
    pub window_minutes: i64,
    pub intervals: usize,
    pub dist_kind: TableKind,
    pub top_n: usize,
}

impl ReportParams {
    /// Resolve user input against the store. Returns `None` only when the
    /// store knows no episodes at all.
    ///
    /// Unknown episode ids are dropped (all-unknown falls back to every
    /// episode), the selection keeps store order, names map to table
    /// kinds with the emotion curve / danmaku emotion comparison as
    /// defaults, and the user-supplied bounds are clamped here: window to
    /// [1,20], intervals to [1,5], top-n to [3,12].
    pub fn resolve(store: &Store, spec: &ParamSpec) -> Option<ReportParams> {
        let all: Vec<EpisodeId> = store.episodes().cloned().collect();
        if all.is_empty() {
            return None;
        }

        let episodes: Vec<EpisodeId> = match &spec.episodes {
            Some(requested) => {
                let wanted: BTreeSet<&str> = requested.iter().map(String::as_str).collect();
                let picked: Vec<EpisodeId> = all
                    .iter()
                    .filter(|ep| wanted.contains(ep.as_str()))
                    .cloned()
                    .collect();
                if picked.is_empty() {
                    all.clone()
                } else {
                    picked
                }
            }
            None => all.clone(),
        };

        let focus = spec
            .focus
            .as_deref()
            .map(EpisodeId::new)
            .filter(|id| store.has_episode(id))
            .unwrap_or_else(|| episodes[0].clone());

        let curve_kind =
            curve_kind_from_name(&spec.curve).unwrap_or(TableKind::MinuteEmoCurve);
        let dist_kind =
            dist_kind_from_name(&spec.dist).unwrap_or(TableKind::DanmakuEmoDist);
        let series = resolve_series(store, &episodes, curve_kind, &spec.series);

        Some(ReportParams {
            focus,
            episodes,
            curve_kind,
            series,
            window_minutes: spec.window_minutes.clamp(1, 20),
            intervals: spec.intervals.clamp(1, 5),
            dist_kind,
            top_n: spec.top_n.clamp(3, 12),
        })
    }
}

/// One sample of one episode's curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub minute: i64,
    pub value: f64,
}

/// One episode's line on the minute-curve chart, annotations included.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesLine {
    pub episode: EpisodeId,
    pub color: String,
    pub points: Vec<CurvePoint>,
    pub peak: Option<PeakPoint>,
    pub intervals: Vec<Interval>,
}

/// The minute-curve chart: one line per selected episode.
#[derive(Debug, Clone, Serialize)]
pub struct CurveChart {
    pub kind: TableKind,
    pub series_key: String,
    pub lines: Vec<SeriesLine>,
    /// Selected episodes with no curve table of this kind.
    pub missing: Vec<EpisodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermBar {
    pub term: String,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstRow {
    pub start_s: f64,
    pub text: String,
    pub count: f64,
}

/// Scalar stats for the selected episodes: basic-stats keys overlaid on
/// the episode-stats row, one merged row per episode.
#[derive(Debug, Clone, Serialize)]
pub struct StatsTable {
    /// `episode` first, the union of stat keys after it, sorted.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Everything one report run derived from the store.
#[derive(Debug, Clone, Serialize)]
pub struct ReportBundle {
    pub generated: String,
    pub params: ReportParams,
    /// All known episodes, for selection UIs.
    pub episodes: Vec<EpisodeId>,
    /// Every numeric series the selected episodes' curves offer.
    pub series_options: Vec<String>,
    pub stats: StatsTable,
    pub curve: CurveChart,
    pub distribution: DistributionComparison,
    pub terms: Vec<TermBar>,
    pub bursts: Vec<BurstRow>,
    pub skipped: Vec<SkipRecord>,
    pub markdown: String,
}

const TERM_LIMIT: usize = 15;
const BURST_LIMIT: usize = 10;

/// Derive the full report bundle for one parameter set.
pub fn build_bundle(store: &Store, params: ReportParams) -> ReportBundle {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    build_bundle_at(store, params, generated)
}

// Timestamp injected so outputs are reproducible under test.
pub(crate) fn build_bundle_at(
    store: &Store,
    params: ReportParams,
    generated: String,
) -> ReportBundle {
    let markdown = markdown::build_report(store, &params, &generated);

    ReportBundle {
        episodes: store.episodes().cloned().collect(),
        series_options: series_union(store, &params.episodes, params.curve_kind),
        stats: stats_table(store, &params.episodes),
        curve: curve_chart(store, &params),
        distribution: compare_distributions(
            store,
            &params.episodes,
            params.dist_kind,
            params.top_n,
        ),
        terms: term_bars(store, &params.focus),
        bursts: burst_rows(store, &params.focus),
        skipped: store.skipped().to_vec(),
        markdown,
        generated,
        params,
    }
}

fn curve_chart(store: &Store, params: &ReportParams) -> CurveChart {
    let mut lines = Vec::new();
    let mut missing = Vec::new();
    for episode in &params.episodes {
        if store.table(episode, params.curve_kind).is_none() {
            missing.push(episode.clone());
            continue;
        }
        let rows = curve_rows(store, episode, params.curve_kind);
        let mut points: Vec<CurvePoint> = rows
            .iter()
            .map(|row| CurvePoint {
                minute: row.num_or("minute", 0.0).round() as i64,
                value: row.num_or(&params.series, 0.0),
            })
            .collect();
        points.sort_by_key(|p| p.minute);

        lines.push(SeriesLine {
            episode: episode.clone(),
            // keyed off "ep<id>" so an episode and a category that share
            // a name can never share a hash color
            color: stable_color(&format!("ep{}", episode)),
            peak: find_peak(rows, &params.series),
            intervals: top_k_intervals(
                rows,
                &params.series,
                params.window_minutes,
                params.intervals,
            ),
            points,
        });
    }
    CurveChart {
        kind: params.curve_kind,
        series_key: params.series.clone(),
        lines,
        missing,
    }
}

pub(crate) fn stats_table(store: &Store, episodes: &[EpisodeId]) -> StatsTable {
    let mut rows = Vec::new();
    let mut keys = BTreeSet::new();
    for episode in episodes {
        let mut merged = Row::new();
        if let Some(stats) = store.episode_stats_row(episode) {
            for key in stats.keys() {
                if key != "episode" {
                    if let Some(cell) = stats.get(key) {
                        merged.set(key, cell.clone());
                    }
                }
            }
        }
        if let Some(basic) = store.basic_stats(episode) {
            for key in basic.keys() {
                if let Some(cell) = basic.get(key) {
                    merged.set(key, cell.clone());
                }
            }
        }
        if merged.is_empty() {
            continue;
        }
        keys.extend(merged.keys().filter(|k| *k != "episode").map(str::to_string));
        merged.set_text("episode", episode.as_str());
        rows.push(merged);
    }

    let mut columns = vec!["episode".to_string()];
    columns.extend(keys);
    if rows.is_empty() {
        columns.clear();
    }
    StatsTable { columns, rows }
}

fn term_bars(store: &Store, focus: &EpisodeId) -> Vec<TermBar> {
    let Some(table) = store.table(focus, TableKind::TopTermsDanmaku) else {
        return Vec::new();
    };
    let mut bars: Vec<TermBar> = table
        .rows
        .iter()
        .filter_map(|row| {
            let term = row.label("term").filter(|t| !t.is_empty())?;
            Some(TermBar {
                term,
                count: row.num_or("count", 0.0),
            })
        })
        .collect();
    bars.sort_by(|a, b| b.count.total_cmp(&a.count));
    bars.truncate(TERM_LIMIT);
    bars
}

fn burst_rows(store: &Store, focus: &EpisodeId) -> Vec<BurstRow> {
    let Some(table) = store.table(focus, TableKind::Burst2s) else {
        return Vec::new();
    };
    let mut bursts: Vec<BurstRow> = table
        .rows
        .iter()
        .filter_map(|row| {
            let text = row.label("text").filter(|t| !t.is_empty())?;
            Some(BurstRow {
                start_s: row.num_or("start_s", 0.0),
                text,
                count: row.num_or("count", 0.0),
            })
        })
        .collect();
    bursts.sort_by(|a, b| b.count.total_cmp(&a.count));
    bursts.truncate(BURST_LIMIT);
    bursts
}

/// Write a report in the format the file extension asks for.
pub fn generate<P: AsRef<Path>>(path: P, bundle: &ReportBundle) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut file = std::fs::File::create(path)?;
    match ext.as_str() {
        "md" | "markdown" => file.write_all(bundle.markdown.as_bytes()),
        "html" | "htm" => html::write(&mut file, bundle),
        _ => json::write(&mut file, bundle),
    }
}

/// Write the shareable zip bundle: narrative, dashboard and raw data.
pub fn write_zip_bundle<P: AsRef<Path>>(path: P, bundle: &ReportBundle) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_zip_to(file, bundle)
}

pub fn write_zip_to<W: Write + Seek>(writer: W, bundle: &ReportBundle) -> io::Result<()> {
    let mut zip = zip::ZipWriter::new(writer);
    let options = zip::write::SimpleFileOptions::default();
    let entry = |e: zip::result::ZipError| io::Error::new(io::ErrorKind::Other, e);

    zip.start_file("report.md", options).map_err(entry)?;
    zip.write_all(bundle.markdown.as_bytes())?;

    zip.start_file("report.html", options).map_err(entry)?;
    html::write(&mut zip, bundle)?;

    zip.start_file("report.json", options).map_err(entry)?;
    json::write(&mut zip, bundle)?;

    zip.finish().map_err(entry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest_batch, SourceFile};
    use std::io::{Cursor, Read};

    // One small but complete dataset: two episodes with curves, function
    // and emotion tables, terms, bursts and stats.
    fn fixture_store() -> Store {
        let files = vec![
            SourceFile::new(
                "episode_stats.csv",
                "episode,danmaku_total,comment_total\n1,900,120\n2,700,80\n",
            ),
            SourceFile::new(
                "ep01_danmaku_basic_stats.json",
                r#"{"danmaku_total": 901, "avg_per_minute": 12.5}"#,
            ),
            SourceFile::new(
                "ep01_danmaku_minute_emo_curve.csv",
                "minute,total,joy\n0,4,1\n1,9,5\n2,2,0\n3,8,2\n",
            ),
            SourceFile::new(
                "ep02_danmaku_minute_emo_curve.csv",
                "minute,total,joy\n0,1,0\n1,2,1\n",
            ),
            SourceFile::new(
                "ep01_danmaku_emo_dist.csv",
                "label,count,ratio\njoy,45,0.45\nanger,30,0.3\nlike,25,0.25\n",
            ),
            SourceFile::new(
                "ep01_danmaku_func_dist.csv",
                "label,count,ratio\ngreet,40,0.4\nspoiler,60,0.6\n",
            ),
            SourceFile::new(
                "ep01_top_terms_danmaku.csv",
                "term,count\nhello,12\nwow,30\nnice,7\n",
            ),
            SourceFile::new(
                "ep01_danmaku_burst_2s.csv",
                "start_s,text,count\n10,aaa,3\n62,bbb,9\n",
            ),
            SourceFile::new("notes.txt", "not a table"),
        ];
        let mut store = Store::new();
        ingest_batch(&mut store, &files, |_, _| {}).unwrap();
        store
    }

    fn fixture_bundle() -> ReportBundle {
        let store = fixture_store();
        let params = ReportParams::resolve(&store, &ParamSpec::default()).unwrap();
        build_bundle_at(&store, params, "2026-01-01 12:00:00".to_string())
    }

    // ==========================================================================
    // PARAMETER RESOLUTION TESTS
    // ==========================================================================

    #[test]
    fn defaults_resolve_to_all_episodes_and_first_focus() {
        let store = fixture_store();
        let params = ReportParams::resolve(&store, &ParamSpec::default()).unwrap();

        assert_eq!(params.focus.as_str(), "01");
        // numeric order with the raw string breaking value ties
        let selected: Vec<&str> = params.episodes.iter().map(EpisodeId::as_str).collect();
        assert_eq!(selected, ["01", "1", "02", "2"]);
        assert_eq!(params.curve_kind, TableKind::MinuteEmoCurve);
        assert_eq!(params.series, "total");
        assert_eq!(params.dist_kind, TableKind::DanmakuEmoDist);
    }

    #[test]
    fn unknown_selections_fall_back_and_bounds_clamp() {
        let store = fixture_store();
        let spec = ParamSpec {
            focus: Some("99".to_string()),
            episodes: Some(vec!["02".to_string(), "99".to_string()]),
            curve: "bogus".to_string(),
            series: "zeal".to_string(),
            window_minutes: 999,
            intervals: 0,
            dist: "nope".to_string(),
            top_n: 99,
        };
        let params = ReportParams::resolve(&store, &spec).unwrap();

        // unknown focus falls to the first selected episode
        assert_eq!(params.focus.as_str(), "02");
        assert_eq!(params.episodes.len(), 1);
        assert_eq!(params.window_minutes, 20);
        assert_eq!(params.intervals, 1);
        assert_eq!(params.top_n, 12);
        assert_eq!(params.curve_kind, TableKind::MinuteEmoCurve);
        assert_eq!(params.dist_kind, TableKind::DanmakuEmoDist);
        // requested series does not exist, total does
        assert_eq!(params.series, "total");
    }

    #[test]
    fn empty_store_resolves_to_nothing() {
        assert!(ReportParams::resolve(&Store::new(), &ParamSpec::default()).is_none());
    }

    // ==========================================================================
    // BUNDLE DERIVATION TESTS
    // ==========================================================================

    #[test]
    fn curve_lines_carry_points_colors_and_annotations() {
        let bundle = fixture_bundle();

        assert_eq!(bundle.curve.series_key, "total");
        assert_eq!(bundle.curve.lines.len(), 2);
        let line = &bundle.curve.lines[0];
        assert_eq!(line.episode.as_str(), "01");
        assert_eq!(line.color, stable_color("ep01"));
        assert_eq!(line.points.len(), 4);
        assert_eq!(line.points[1], CurvePoint { minute: 1, value: 9.0 });
        assert_eq!(line.peak.unwrap().minute, 1);
        assert!(!line.intervals.is_empty());
        // the two stats-only episodes have no curve table
        let missing: Vec<&str> = bundle.curve.missing.iter().map(EpisodeId::as_str).collect();
        assert_eq!(missing, ["1", "2"]);
        assert!(bundle.series_options.iter().any(|s| s == "total"));
        assert!(bundle.series_options.iter().any(|s| s == "joy"));
    }

    #[test]
    fn stats_table_merges_episode_and_basic_rows() {
        let bundle = fixture_bundle();
        let stats = &bundle.stats;

        assert_eq!(stats.columns[0], "episode");
        assert!(stats.columns.iter().any(|c| c == "avg_per_minute"));
        assert!(stats.columns.iter().any(|c| c == "comment_total"));

        let ep01 = stats
            .rows
            .iter()
            .find(|r| r.text("episode") == Some("01"))
            .unwrap();
        // basic stats only; "01" has no episode-stats row
        assert_eq!(ep01.num("danmaku_total"), Some(901.0));
        let ep1 = stats
            .rows
            .iter()
            .find(|r| r.text("episode") == Some("1"))
            .unwrap();
        assert_eq!(ep1.num("danmaku_total"), Some(900.0));
        assert_eq!(ep1.num("comment_total"), Some(120.0));
    }

    #[test]
    fn terms_and_bursts_rank_by_count() {
        let bundle = fixture_bundle();

        let terms: Vec<&str> = bundle.terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, ["wow", "hello", "nice"]);
        assert_eq!(bundle.bursts[0].text, "bbb");
        assert_eq!(bundle.bursts[0].start_s, 62.0);
    }

    #[test]
    fn bundle_serializes_with_its_diagnostics() {
        let bundle = fixture_bundle();
        let json = serde_json::to_string(&bundle).unwrap();

        assert!(json.contains("\"generated\":\"2026-01-01 12:00:00\""));
        assert!(json.contains("\"notes.txt\""));
        assert!(json.contains("\"markdown\""));
        assert!(json.contains("\"categories\""));
    }

    // ==========================================================================
    // OUTPUT DISPATCH TESTS
    // ==========================================================================

    #[test]
    fn zip_bundle_holds_all_three_artifacts() {
        let bundle = fixture_bundle();
        let mut cursor = Cursor::new(Vec::new());
        write_zip_to(&mut cursor, &bundle).unwrap();
        cursor.set_position(0);

        let mut archive = zip::ZipArchive::new(cursor).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["report.md", "report.html", "report.json"]);

        let mut markdown = String::new();
        archive
            .by_name("report.md")
            .unwrap()
            .read_to_string(&mut markdown)
            .unwrap();
        assert_eq!(markdown, bundle.markdown);
    }

    #[test]
    fn generate_dispatches_on_extension() {
        let bundle = fixture_bundle();
        let dir = std::env::temp_dir().join(format!(
            "episcope_report_test_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        generate(dir.join("r.md"), &bundle).unwrap();
        generate(dir.join("r.html"), &bundle).unwrap();
        generate(dir.join("r.json"), &bundle).unwrap();

        let md = std::fs::read_to_string(dir.join("r.md")).unwrap();
        assert_eq!(md, bundle.markdown);
        let html = std::fs::read_to_string(dir.join("r.html")).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        let json = std::fs::read_to_string(dir.join("r.json")).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
