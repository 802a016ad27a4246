//! Filename classification and episode identity extraction
//!
//! The upstream pipeline writes one file per (episode, table) pair with a
//! fixed naming scheme, e.g. `ep03_danmaku_emo_dist.csv`. Classification is
//! a case-insensitive substring match on the base filename, gated by the
//! file extension:
//!
//! ```text
//! Filename contains              | Ext   | Table kind
//! -------------------------------|-------|---------------------------------
//! episode_stats                  | .csv  | global per-episode scalar stats
//! danmaku_basic_stats            | .json | per-episode basic stats object
//! danmaku_emo_dist               | .csv  | danmaku emotion distribution
//! comment_root_emo_dist          | .csv  | root comment emotion distribution
//! comment_reply_emo_dist         | .csv  | reply comment emotion distribution
//! *_model_emo_dist               | .csv  | model polarity distributions (3)
//! model_usage                    | .csv  | per-source model coverage
//! *_func_dist                    | .csv  | function-tag distributions (4)
//! danmaku_minute_emo_curve       | .csv  | per-minute emotion curve
//! danmaku_minute_func_curve      | .csv  | per-minute function curve
//! danmaku_burst_2s               | .csv  | 2-second burst/repetition table
//! top_terms_danmaku / _comment   | .csv  | term frequency tables (2)
//! cleaning_report                | .csv  | pipeline diagnostic (not analyzed)
//! ```
//!
//! Anything else is not an error: batch uploads routinely contain readme
//! files, screenshots and other noise, and those are skipped (the skip is
//! recorded so it can be surfaced as a diagnostic).
//!
//! Episode identity comes from the filename as well: the first `ep<digits>`
//! tag wins, with a looser "2-3 digit run bounded by separators" fallback
//! for pipelines that drop the `ep` prefix.

use crate::store::EpisodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// The fixed set of table families the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Global scalar-stats table, one row per episode (`episode_stats.csv`).
    EpisodeStats,
    /// Per-episode basic stats object (`*_danmaku_basic_stats.json`).
    BasicStats,
    DanmakuEmoDist,
    CommentRootEmoDist,
    CommentReplyEmoDist,
    DanmakuModelEmoDist,
    CommentRootModelEmoDist,
    CommentReplyModelEmoDist,
    ModelUsage,
    DanmakuFuncDist,
    CommentFuncDist,
    CommentRootFuncDist,
    CommentReplyFuncDist,
    MinuteEmoCurve,
    MinuteFuncCurve,
    Burst2s,
    TopTermsDanmaku,
    TopTermsComment,
    CleaningReport,
}

/// Source format a table kind is gated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
}

/// Category vocabulary of a distribution table kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    /// Fixed emotion labels in display order.
    Emotion,
    /// Fixed coarse polarity labels in display order.
    Polarity,
    /// Arbitrary tag strings; bounded to top-N + "other" downstream.
    Open,
}

/// Fixed emotion display order. Charts and comparison rows always emit all
/// eight labels in this order; `other` doubles as the missing-label sentinel.
pub const EMOTION_LABELS: [&str; 8] = [
    "joy", "like", "surprise", "anger", "sadness", "fear", "disgust", "other",
];

/// Fixed polarity display order; `neu` is the missing-label sentinel.
pub const POLARITY_LABELS: [&str; 3] = ["pos", "neu", "neg"];

// Classification matrix. Checked in order, so kinds whose needle contains
// another kind's needle (the model_emo variants) must come first.
const CLASSIFICATION: &[(&str, SourceFormat, TableKind)] = &[
    ("danmaku_model_emo_dist", SourceFormat::Csv, TableKind::DanmakuModelEmoDist),
    ("comment_root_model_emo_dist", SourceFormat::Csv, TableKind::CommentRootModelEmoDist),
    ("comment_reply_model_emo_dist", SourceFormat::Csv, TableKind::CommentReplyModelEmoDist),
    ("danmaku_emo_dist", SourceFormat::Csv, TableKind::DanmakuEmoDist),
    ("comment_root_emo_dist", SourceFormat::Csv, TableKind::CommentRootEmoDist),
    ("comment_reply_emo_dist", SourceFormat::Csv, TableKind::CommentReplyEmoDist),
    ("comment_root_func_dist", SourceFormat::Csv, TableKind::CommentRootFuncDist),
    ("comment_reply_func_dist", SourceFormat::Csv, TableKind::CommentReplyFuncDist),
    ("danmaku_func_dist", SourceFormat::Csv, TableKind::DanmakuFuncDist),
    ("comment_func_dist", SourceFormat::Csv, TableKind::CommentFuncDist),
    ("danmaku_minute_emo_curve", SourceFormat::Csv, TableKind::MinuteEmoCurve),
    ("danmaku_minute_func_curve", SourceFormat::Csv, TableKind::MinuteFuncCurve),
    ("danmaku_burst_2s", SourceFormat::Csv, TableKind::Burst2s),
    ("top_terms_danmaku", SourceFormat::Csv, TableKind::TopTermsDanmaku),
    ("top_terms_comment", SourceFormat::Csv, TableKind::TopTermsComment),
    ("model_usage", SourceFormat::Csv, TableKind::ModelUsage),
    ("danmaku_basic_stats", SourceFormat::Json, TableKind::BasicStats),
    ("episode_stats", SourceFormat::Csv, TableKind::EpisodeStats),
    ("cleaning_report", SourceFormat::Csv, TableKind::CleaningReport),
];

static EP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ep(\d+)").unwrap());
static LOOSE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[ ._\-])(\d{2,3})(?:[ ._\-]|$)").unwrap());

impl TableKind {
    /// Human-readable label used in console output and reports.
    pub fn label(self) -> &'static str {
        match self {
            TableKind::EpisodeStats => "episode scalar stats",
            TableKind::BasicStats => "basic stats",
            TableKind::DanmakuEmoDist => "danmaku emotions",
            TableKind::CommentRootEmoDist => "root comment emotions",
            TableKind::CommentReplyEmoDist => "reply comment emotions",
            TableKind::DanmakuModelEmoDist => "danmaku polarity",
            TableKind::CommentRootModelEmoDist => "root comment polarity",
            TableKind::CommentReplyModelEmoDist => "reply comment polarity",
            TableKind::ModelUsage => "model usage coverage",
            TableKind::DanmakuFuncDist => "danmaku functions",
            TableKind::CommentFuncDist => "comment functions",
            TableKind::CommentRootFuncDist => "root comment functions",
            TableKind::CommentReplyFuncDist => "reply comment functions",
            TableKind::MinuteEmoCurve => "minute emotion curve",
            TableKind::MinuteFuncCurve => "minute function curve",
            TableKind::Burst2s => "2s burst table",
            TableKind::TopTermsDanmaku => "top danmaku terms",
            TableKind::TopTermsComment => "top comment terms",
            TableKind::CleaningReport => "cleaning report",
        }
    }

    /// Whether this kind is stored under an episode key. Only the global
    /// scalar-stats table is keyed by its embedded `episode` column instead.
    pub fn requires_episode(self) -> bool {
        self != TableKind::EpisodeStats
    }

    /// Vocabulary of a distribution kind; `None` for non-distribution kinds.
    pub fn vocabulary(self) -> Option<Vocabulary> {
        match self {
            TableKind::DanmakuEmoDist
            | TableKind::CommentRootEmoDist
            | TableKind::CommentReplyEmoDist => Some(Vocabulary::Emotion),
            TableKind::DanmakuModelEmoDist
            | TableKind::CommentRootModelEmoDist
            | TableKind::CommentReplyModelEmoDist => Some(Vocabulary::Polarity),
            TableKind::DanmakuFuncDist
            | TableKind::CommentFuncDist
            | TableKind::CommentRootFuncDist
            | TableKind::CommentReplyFuncDist => Some(Vocabulary::Open),
            _ => None,
        }
    }

    /// Whether this kind is a per-minute time curve.
    pub fn is_curve(self) -> bool {
        matches!(self, TableKind::MinuteEmoCurve | TableKind::MinuteFuncCurve)
    }
}

impl Vocabulary {
    /// Label substituted when a row has no categorical field at all.
    pub fn sentinel(self) -> &'static str {
        match self {
            Vocabulary::Polarity => "neu",
            Vocabulary::Emotion | Vocabulary::Open => "other",
        }
    }

    /// The fixed label order for closed vocabularies.
    pub fn fixed_labels(self) -> Option<&'static [&'static str]> {
        match self {
            Vocabulary::Emotion => Some(&EMOTION_LABELS),
            Vocabulary::Polarity => Some(&POLARITY_LABELS),
            Vocabulary::Open => None,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Strip any directory components (zip entries use `/`, uploads may carry
/// either separator) and return the base filename.
pub fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

fn extension(base: &str) -> Option<&str> {
    let dot = base.rfind('.')?;
    Some(&base[dot + 1..])
}

/// Classify a filename against the fixed table-kind matrix.
///
/// Matching is case-insensitive on the base filename and gated by the
/// extension, so `danmaku_basic_stats.csv` (wrong container for that kind)
/// classifies as nothing rather than as a broken JSON table.
pub fn classify(filename: &str) -> Option<TableKind> {
    let base = base_name(filename).to_ascii_lowercase();
    let ext = extension(&base)?;
    for (needle, format, kind) in CLASSIFICATION {
        let ext_ok = match format {
            SourceFormat::Csv => ext == "csv",
            SourceFormat::Json => ext == "json",
        };
        if ext_ok && base.contains(needle) {
            return Some(*kind);
        }
    }
    None
}

/// Extract the episode identifier from a filename.
///
/// First match of `ep<digits>` (case-insensitive) wins; otherwise the first
/// 2-3 digit run bounded by separators. Returns `None` when neither pattern
/// matches, in which case ingestion skips the file.
pub fn extract_episode_id(filename: &str) -> Option<EpisodeId> {
    let base = base_name(filename);
    if let Some(caps) = EP_TAG.captures(base) {
        return Some(EpisodeId::new(&caps[1]));
    }
    LOOSE_RUN
        .captures(base)
        .map(|caps| EpisodeId::new(&caps[1]))
}

/// Resolve a CLI/query curve name (`emo` / `func`) to its table kind.
pub fn curve_kind_from_name(name: &str) -> Option<TableKind> {
    match name.to_ascii_lowercase().as_str() {
        "emo" | "emotion" => Some(TableKind::MinuteEmoCurve),
        "func" | "function" => Some(TableKind::MinuteFuncCurve),
        _ => None,
    }
}

/// Resolve a CLI/query distribution name to its table kind.
///
/// Names mirror the table families: `danmaku-emo`, `root-emo`, `reply-emo`,
/// `danmaku-model`, `root-model`, `reply-model`, `danmaku-func`,
/// `comment-func`, `root-func`, `reply-func`.
pub fn dist_kind_from_name(name: &str) -> Option<TableKind> {
    match name.to_ascii_lowercase().as_str() {
        "danmaku-emo" => Some(TableKind::DanmakuEmoDist),
        "root-emo" => Some(TableKind::CommentRootEmoDist),
        "reply-emo" => Some(TableKind::CommentReplyEmoDist),
        "danmaku-model" => Some(TableKind::DanmakuModelEmoDist),
        "root-model" => Some(TableKind::CommentRootModelEmoDist),
        "reply-model" => Some(TableKind::CommentReplyModelEmoDist),
        "danmaku-func" => Some(TableKind::DanmakuFuncDist),
        "comment-func" => Some(TableKind::CommentFuncDist),
        "root-func" => Some(TableKind::CommentRootFuncDist),
        "reply-func" => Some(TableKind::CommentReplyFuncDist),
        _ => None,
    }
}
