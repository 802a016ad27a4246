//! In-memory episode/table store
//!
//! Everything downstream (peaks, comparisons, narratives, the dashboard)
//! reads from one `Store` built by ingestion. The store is deliberately
//! dumb: it holds parsed tables keyed by `(episode, table kind)` plus two
//! oddballs: the global episode-stats table (keyed by its own `episode`
//! column rather than a filename) and the per-episode basic-stats rows
//! parsed from JSON.
//!
//! Mutation happens through [`StoreUpdate`] values folded in with
//! [`Store::apply`]. Replaying the same update is a no-op in effect: puts
//! overwrite a slot with identical content and skip diagnostics are
//! deduplicated, so an ingest batch can be retried without corrupting
//! anything.
//!
//! ## Rows and cells
//!
//! Upstream tables are ragged in practice (hand-rerun pipeline stages,
//! trailing columns that appear mid-season), so a row is a key→cell map
//! rather than a positional record. Readers never index; they ask for a
//! key and state a default. A missing key is absence, not an error.
//!
//! ## Episode identity and order
//!
//! Episode ids are the exact strings extracted from filenames (or read
//! from the episode-stats table). `"01"` and `"1"` are different episodes.
//! The ordering is numeric-aware so listings read naturally: ids that
//! parse as integers sort first by value (raw string as tiebreak),
//! everything else follows lexicographically.

use crate::ingest::classify::TableKind;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An episode identifier, preserved exactly as extracted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EpisodeId(String);

impl EpisodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        EpisodeId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for EpisodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EpisodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// One table cell. `Num` is always finite (the parser guarantees it).
/// Untagged so JSON output reads as plain values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Num(f64),
    Text(String),
}

impl Cell {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Cell::Num(n) => Some(*n),
            Cell::Text(_) => None,
        }
    }

    /// Canonical label form, used wherever a cell is matched against an
    /// episode id or category name. Integral numbers lose their float
    /// formatting (`3.0` → `"3"`) so a numeric `episode` column lines up
    /// with the `"3"` extracted from filenames.
    pub fn label(&self) -> String {
        match self {
            Cell::Num(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                format!("{}", *n as i64)
            }
            Cell::Num(n) => n.to_string(),
            Cell::Text(s) => s.trim().to_string(),
        }
    }
}

/// A key→cell map. Missing keys read as their stated default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Cell>);

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    pub fn set(&mut self, key: impl Into<String>, cell: Cell) {
        self.0.insert(key.into(), cell);
    }

    pub fn set_num(&mut self, key: impl Into<String>, value: f64) {
        self.set(key, Cell::Num(value));
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Cell::Text(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.0.get(key)
    }

    pub fn num(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Cell::as_num)
    }

    pub fn num_or(&self, key: &str, default: f64) -> f64 {
        self.num(key).unwrap_or(default)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Cell::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn text_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.text(key).unwrap_or(fallback)
    }

    /// Canonical label of a cell, `None` when the key is absent.
    pub fn label(&self, key: &str) -> Option<String> {
        self.get(key).map(Cell::label)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        Row(iter.into_iter().collect())
    }
}

/// A parsed table: the classified kind plus rows in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub kind: TableKind,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(kind: TableKind, rows: Vec<Row>) -> Self {
        Table { kind, rows }
    }

    /// Union of row keys, sorted.
    pub fn column_names(&self) -> Vec<String> {
        let mut set = BTreeSet::new();
        for row in &self.rows {
            set.extend(row.keys().map(str::to_string));
        }
        set.into_iter().collect()
    }

    /// Keys that hold a number in at least one row, excluding `except`,
    /// sorted. This is the series menu for minute curves.
    pub fn numeric_keys_except(&self, except: &str) -> Vec<String> {
        let mut set = BTreeSet::new();
        for row in &self.rows {
            for key in row.keys() {
                if key != except && row.num(key).is_some() {
                    set.insert(key.to_string());
                }
            }
        }
        set.into_iter().collect()
    }
}

/// Why a file was left out of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Filename matched no table family (or the wrong container format).
    Unrecognized,
    /// Table family needs an episode key but none was extractable.
    MissingEpisodeId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unrecognized => f.write_str("unrecognized filename"),
            SkipReason::MissingEpisodeId => f.write_str("no episode id in filename"),
        }
    }
}

/// A skipped input, kept for the ingest summary and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipRecord {
    pub filename: String,
    pub reason: SkipReason,
}

/// One store mutation. Ingestion produces these; [`Store::apply`] folds
/// them in.
#[derive(Debug, Clone)]
pub enum StoreUpdate {
    /// Full replace of one (episode, kind) slot.
    EpisodeTable {
        episode: EpisodeId,
        kind: TableKind,
        table: Table,
    },
    /// Full replace of one episode's basic-stats row.
    BasicStats { episode: EpisodeId, row: Row },
    /// Full replace of the global episode-stats table.
    EpisodeStats { table: Table },
    /// A file that was looked at and deliberately left out.
    Skip { filename: String, reason: SkipReason },
}

/// The assembled dataset for one run.
#[derive(Debug, Default)]
pub struct Store {
    tables: BTreeMap<EpisodeId, BTreeMap<TableKind, Table>>,
    basic_stats: BTreeMap<EpisodeId, Row>,
    episode_stats: Option<Table>,
    episodes: BTreeSet<EpisodeId>,
    skipped: Vec<SkipRecord>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Fold a batch of updates into a fresh store.
    pub fn from_updates(updates: Vec<StoreUpdate>) -> Self {
        let mut store = Store::new();
        for update in updates {
            store.apply(update);
        }
        store
    }

    /// Apply one update. Puts overwrite their slot; skips are deduplicated
    /// so a replayed batch leaves the diagnostics list unchanged.
    pub fn apply(&mut self, update: StoreUpdate) {
        match update {
            StoreUpdate::EpisodeTable { episode, kind, table } => {
                self.tables.entry(episode).or_default().insert(kind, table);
            }
            StoreUpdate::BasicStats { episode, row } => {
                self.basic_stats.insert(episode, row);
            }
            StoreUpdate::EpisodeStats { table } => {
                self.episode_stats = Some(table);
            }
            StoreUpdate::Skip { filename, reason } => {
                let record = SkipRecord { filename, reason };
                if !self.skipped.contains(&record) {
                    self.skipped.push(record);
                }
            }
        }
        self.recompute_episodes();
    }

    // The known-episode set is derived, never stored ahead of the data:
    // every table key, every basic-stats key, and every label in the
    // episode-stats table's `episode` column.
    fn recompute_episodes(&mut self) {
        let mut set: BTreeSet<EpisodeId> = self.tables.keys().cloned().collect();
        set.extend(self.basic_stats.keys().cloned());
        if let Some(stats) = &self.episode_stats {
            for row in &stats.rows {
                if let Some(label) = row.label("episode") {
                    if !label.is_empty() {
                        set.insert(EpisodeId::new(label));
                    }
                }
            }
        }
        self.episodes = set;
    }

    /// All known episodes in display order.
    pub fn episodes(&self) -> impl Iterator<Item = &EpisodeId> {
        self.episodes.iter()
    }

    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    pub fn has_episode(&self, id: &EpisodeId) -> bool {
        self.episodes.contains(id)
    }

    pub fn first_episode(&self) -> Option<&EpisodeId> {
        self.episodes.iter().next()
    }

    pub fn table(&self, episode: &EpisodeId, kind: TableKind) -> Option<&Table> {
        self.tables.get(episode)?.get(&kind)
    }

    /// Table kinds present for one episode, in kind order.
    pub fn kinds_for(&self, episode: &EpisodeId) -> Vec<TableKind> {
        self.tables
            .get(episode)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Parsed tables across all slots, basic-stats rows and the episode
    /// stats table included.
    pub fn table_count(&self) -> usize {
        self.tables.values().map(|m| m.len()).sum::<usize>()
            + self.basic_stats.len()
            + usize::from(self.episode_stats.is_some())
    }

    pub fn basic_stats(&self, episode: &EpisodeId) -> Option<&Row> {
        self.basic_stats.get(episode)
    }

    pub fn episode_stats(&self) -> Option<&Table> {
        self.episode_stats.as_ref()
    }

    /// The episode-stats row whose `episode` label equals this id exactly.
    pub fn episode_stats_row(&self, episode: &EpisodeId) -> Option<&Row> {
        let stats = self.episode_stats.as_ref()?;
        stats
            .rows
            .iter()
            .find(|row| row.label("episode").as_deref() == Some(episode.as_str()))
    }

    pub fn skipped(&self) -> &[SkipRecord] {
        &self.skipped
    }
}
