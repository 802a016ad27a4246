use chrono::Local;
use clap::{Parser, Subcommand};
use episcope::analytics;
use episcope::ingest;
use episcope::report::{self, ParamSpec, ReportParams};
use episcope::store::Store;
use episcope::TableKind;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "episcope")]
#[command(author, version, about = "Per-episode danmaku and comment statistics, charted and narrated")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory, zip archive or single table file to ingest (optional in GUI mode)
    path: Option<PathBuf>,

    /// Launch GUI folder picker (auto-enabled when double-clicked)
    #[arg(long)]
    gui: bool,

    /// Focus episode id (default: first episode found)
    #[arg(short, long)]
    episode: Option<String>,

    /// Comma-separated episode ids to compare (default: all)
    #[arg(long)]
    episodes: Option<String>,

    /// Minute curve to chart: emo | func
    #[arg(long, default_value = "emo")]
    curve: String,

    /// Curve series to annotate (a column name, e.g. total or joy)
    #[arg(long, default_value = "total")]
    series: String,

    /// Busiest-window width in minutes (1-20)
    #[arg(long, default_value = "5")]
    window: i64,

    /// How many busiest windows to pick (1-5)
    #[arg(long, default_value = "3")]
    intervals: usize,

    /// Distribution to compare, e.g. danmaku-emo, danmaku-func, root-model
    #[arg(long, default_value = "danmaku-emo")]
    dist: String,

    /// Named categories to keep in open-vocabulary comparisons (3-12)
    #[arg(long, default_value = "8")]
    top_n: usize,

    /// Output report file (.md, .html, .json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "episcope-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate an HTML report
    #[arg(long)]
    no_report: bool,

    /// Don't prompt to open the report
    #[arg(long)]
    no_open: bool,

    /// Also write a shareable zip (markdown + dashboard + json)
    #[arg(long)]
    bundle: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Show per-episode table details
    #[arg(short, long)]
    verbose: bool,

    /// Only show errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the interactive web UI over an ingested dataset
    Serve {
        /// Directory, zip archive or single table file to ingest
        path: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value = "3210")]
        port: u16,
    },
}

fn main() {
    let args = Args::parse();

    if let Some(Command::Serve { path, port }) = args.command {
        if let Err(e) = episcope::serve::start(port, path) {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // With the GUI feature a bare double-click (no path) opens a picker,
    // so the binary "just works" outside a terminal.
    #[cfg(feature = "gui")]
    let use_gui = args.gui || args.path.is_none();

    #[cfg(not(feature = "gui"))]
    let use_gui = false;

    #[cfg(feature = "gui")]
    let path = if use_gui {
        match pick_path_gui() {
            Some(p) => p,
            None => {
                eprintln!("No folder or file selected.");
                std::process::exit(0);
            }
        }
    } else {
        args.path.clone().unwrap()
    };

    #[cfg(not(feature = "gui"))]
    let path = if let Some(p) = args.path.clone() {
        p
    } else {
        eprintln!("Usage: episcope <PATH>");
        eprintln!("Run 'episcope --help' for more options.");
        eprintln!("Note: GUI mode not available in this build.");
        std::process::exit(1);
    };

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let files = match ingest::collect_path(&path) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Cannot read {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    if files.is_empty() {
        eprintln!("No .csv or .json tables found under {}", path.display());
        std::process::exit(1);
    }

    if !args.quiet {
        eprintln!("\x1b[1mEpiscope - Episode Comment Analytics\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} table file(s)\n", files.len());
    }

    let pb = if !args.quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut store = Store::new();
    let outcome = ingest::ingest_batch(&mut store, &files, |_, name| {
        if let Some(ref pb) = pb {
            pb.inc(1);
            pb.set_message(name.to_string());
        }
    });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("\x1b[31mIngest failed:\x1b[0m {}", e);
            std::process::exit(1);
        }
    };

    if !args.quiet {
        for skip in &summary.skips {
            eprintln!("\x1b[33m→ skipped {}: {}\x1b[0m", skip.filename, skip.reason);
        }
        if !summary.skips.is_empty() {
            eprintln!();
        }

        eprintln!(
            "Ingested {} table(s) across {} episode(s), {} file(s) skipped",
            summary.applied,
            store.episode_count(),
            summary.skipped
        );
        for episode in store.episodes() {
            let kinds = store.kinds_for(episode);
            let total = store
                .basic_stats(episode)
                .and_then(|row| row.num("danmaku_total"))
                .or_else(|| {
                    store
                        .episode_stats_row(episode)
                        .and_then(|row| row.num("danmaku_total"))
                })
                .map(|t| format!("{} danmaku", t))
                .unwrap_or_else(|| "total n/a".to_string());
            let peak = analytics::find_peak(
                analytics::curve_rows(&store, episode, TableKind::MinuteEmoCurve),
                "total",
            )
            .map(|p| format!("peak at min {}", p.minute))
            .unwrap_or_else(|| "no peak".to_string());

            eprintln!(
                "  ep {:<6} {} table(s), {}, {}",
                episode,
                kinds.len(),
                total,
                peak
            );
            if args.verbose {
                let labels: Vec<&str> = kinds.iter().map(|k| k.label()).collect();
                eprintln!("           {}", labels.join(", "));
            }
        }
    }

    let spec = ParamSpec {
        focus: args.episode.clone(),
        episodes: args.episodes.as_deref().map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect()
        }),
        curve: args.curve.clone(),
        series: args.series.clone(),
        window_minutes: args.window,
        intervals: args.intervals,
        dist: args.dist.clone(),
        top_n: args.top_n,
    };

    let params = match ReportParams::resolve(&store, &spec) {
        Some(params) => params,
        None => {
            eprintln!("No episodes recognized in the input; nothing to report on.");
            std::process::exit(1);
        }
    };

    let bundle = report::build_bundle(&store, params);

    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        std::fs::create_dir_all(&args.report_dir).ok();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("episcope_report_{}.html", timestamp);
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        if let Err(e) = report::generate(output_path, &bundle) {
            eprintln!("Failed to write report: {}", e);
            std::process::exit(1);
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }

        if args.bundle {
            let zip_path = output_path.with_extension("zip");
            if let Err(e) = report::write_zip_bundle(&zip_path, &bundle) {
                eprintln!("Failed to write bundle: {}", e);
                std::process::exit(1);
            }
            if !args.quiet {
                eprintln!("\x1b[32mBundle saved: {}\x1b[0m", zip_path.display());
            }
        }

        if !args.no_open {
            if use_gui {
                let _ = open::that(output_path);
            } else if !args.quiet {
                eprint!("\nOpen report in browser? [Y/n] ");
                io::stderr().flush().ok();

                let mut input = String::new();
                if io::stdin().read_line(&mut input).is_ok() {
                    let input = input.trim().to_lowercase();
                    if input.is_empty() || input == "y" || input == "yes" {
                        if let Err(e) = open::that(output_path) {
                            eprintln!("Failed to open report: {}", e);
                        }
                    }
                }
            }
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mDone.\x1b[0m");
    }
}

#[cfg(feature = "gui")]
fn pick_path_gui() -> Option<PathBuf> {
    // First try folder picker
    if let Some(folder) = rfd::FileDialog::new()
        .set_title("Select the stats folder to ingest (or Cancel for a single file)")
        .pick_folder()
    {
        return Some(folder);
    }

    // If cancelled, offer file picker
    rfd::FileDialog::new()
        .set_title("Select a table file or zip archive")
        .add_filter("Stats tables", &["csv", "json", "zip"])
        .pick_file()
}
