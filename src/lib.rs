//! Episcope - Per-episode danmaku and comment analytics
//!
//! Episcope ingests the cleaned statistics tables a comment-analysis
//! pipeline dumps per episode (CSV tables plus one JSON scalar object per
//! episode), folds them into an in-memory store, and renders the
//! comparisons people actually present: per-minute activity curves with
//! their busiest windows, emotion/function/polarity distribution
//! comparisons across episodes, top terms and burst moments, a markdown
//! narrative draft and a self-contained HTML dashboard.
//!
//! # Overview
//!
//! Dumps arrive as a directory, a zip archive, or a single file. Each
//! filename is classified into one of the known table families
//! ([`ingest::classify::TableKind`]), tagged with the episode id embedded
//! in the name, parsed leniently, and applied to the [`store::Store`] as
//! a replayable update. Unrecognized files are recorded as skips, not
//! errors, and nothing downstream of ingestion fails: a missing table
//! becomes a placeholder sentence or an empty chart, never an error.
//!
//! # Quick Start
//!
//! ```no_run
//! use episcope::ingest;
//! use episcope::report::{self, ParamSpec, ReportParams};
//! use episcope::store::Store;
//!
//! # fn main() -> std::io::Result<()> {
//! let files = ingest::collect_path("./stats_out".as_ref())?;
//! let mut store = Store::new();
//! ingest::ingest_batch(&mut store, &files, |_, _| {})
//!     .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
//!
//! let params = ReportParams::resolve(&store, &ParamSpec::default())
//!     .expect("no episodes in input");
//! let bundle = report::build_bundle(&store, params);
//! report::generate("report.html", &bundle)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`ingest`]: file collection, filename classification, lenient parsing
//! - [`store`]: the episode store and its update/replay model
//! - [`analytics`]: peaks, busiest windows, distribution comparisons
//! - [`color`]: deterministic category and episode colors
//! - [`report`]: markdown, HTML dashboard, JSON and zip bundle outputs
//! - [`serve`]: local web UI over an ingested dataset

pub mod analytics;
pub mod color;
pub mod ingest;
pub mod report;
pub mod serve;
pub mod store;

pub use ingest::classify::TableKind;
pub use ingest::{collect_path, ingest_batch, BatchSummary, IngestError, SourceFile};
pub use report::{build_bundle, generate, ParamSpec, ReportBundle, ReportParams};
pub use store::{EpisodeId, Store};

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PUBLIC API TESTS
    // ==========================================================================
    //
    // These tests verify the re-exported surface stays usable from the
    // crate root; behavior is covered in each module's own tests.
    // ==========================================================================

    #[test]
    fn empty_store_resolves_to_no_report() {
        let store = Store::new();
        assert_eq!(store.episode_count(), 0);
        assert!(ReportParams::resolve(&store, &ParamSpec::default()).is_none());
    }

    #[test]
    fn episode_ids_order_numerically_from_crate_root() {
        let mut ids = vec![EpisodeId::new("10"), EpisodeId::new("2")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "2");
    }

    #[test]
    fn classification_reaches_through_reexports() {
        assert_eq!(
            ingest::classify::classify("ep03_danmaku_emo_dist.csv"),
            Some(TableKind::DanmakuEmoDist)
        );
    }
}
