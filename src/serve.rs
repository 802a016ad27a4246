//! HTTP server for interactive exploration
//!
//! `episcope serve ./tables` → ingest once, start server, open browser

use crate::ingest;
use crate::report::{self, ParamSpec, ReportBundle, ReportParams};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tiny_http::{Header, Method, Request, Response, Server};

// Embed the UI directly in the binary
const UI_HTML: &str = include_str!("ui.html");

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }

    fn failure(error: &str) -> Self {
        Self { ok: false, data: None, error: Some(error.to_string()) }
    }
}

/// Report options as they arrive on the query string. Ids stay raw here;
/// [`ReportParams::resolve`] validates them against the store per request.
#[derive(Deserialize, Debug)]
pub struct ReportQuery {
    pub focus: Option<String>,
    /// Comma-separated episode ids.
    pub episodes: Option<String>,
    #[serde(default = "default_curve")]
    pub curve: String,
    #[serde(default = "default_series")]
    pub series: String,
    #[serde(default = "default_window")]
    pub window: i64,
    #[serde(default = "default_intervals")]
    pub intervals: usize,
    #[serde(default = "default_dist")]
    pub dist: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_curve() -> String { "emo".to_string() }
fn default_series() -> String { "total".to_string() }
fn default_window() -> i64 { 5 }
fn default_intervals() -> usize { 3 }
fn default_dist() -> String { "danmaku-emo".to_string() }
fn default_top_n() -> usize { 8 }

impl Default for ReportQuery {
    fn default() -> Self {
        ReportQuery {
            focus: None,
            episodes: None,
            curve: default_curve(),
            series: default_series(),
            window: default_window(),
            intervals: default_intervals(),
            dist: default_dist(),
            top_n: default_top_n(),
        }
    }
}

impl ReportQuery {
    fn into_spec(self) -> ParamSpec {
        let episodes = self.episodes.map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect::<Vec<String>>()
        });

        ParamSpec {
            focus: self.focus.filter(|id| !id.is_empty()),
            episodes: episodes.filter(|ids| !ids.is_empty()),
            curve: self.curve,
            series: self.series,
            window_minutes: self.window,
            intervals: self.intervals,
            dist: self.dist,
            top_n: self.top_n,
        }
    }
}

/// Ingest the path once, start the server, open the browser.
pub fn start(port: u16, path: PathBuf) -> io::Result<()> {
    let files = ingest::collect_path(&path)?;
    let mut store = Store::new();
    let summary = ingest::ingest_batch(&mut store, &files, |_, _| {})
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let url = format!("http://localhost:{}", port);
    let path_str = path.canonicalize().unwrap_or(path.clone()).display().to_string();

    eprintln!("\n\x1b[1;32m📺 Episcope\x1b[0m");
    eprintln!("   {}", url);
    eprintln!(
        "   Serving {} episodes from {} tables: {}\n",
        store.episode_count(),
        summary.applied,
        path_str
    );

    // Open browser
    let _ = open::that(&url);

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &store, &path_str) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

fn handle_request(request: Request, store: &Store, source: &str) -> io::Result<()> {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("/");
    let method = request.method().clone();

    match (&method, path) {
        // Serve embedded UI
        (&Method::Get, "/") => {
            let html = UI_HTML.replace("{{SOURCE}}", source);
            let response = Response::from_string(html)
                .with_header(Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).unwrap());
            request.respond(response)
        }

        // API: full report bundle
        (&Method::Get, "/api/report") => {
            eprintln!("→ {}", url);
            let spec = parse_query(&url).into_spec();
            let json = match ReportParams::resolve(store, &spec) {
                Some(params) => {
                    let bundle = report::build_bundle(store, params);
                    serde_json::to_string(&ApiResponse::success(bundle))?
                }
                None => serde_json::to_string(&ApiResponse::<ReportBundle>::failure(
                    "no episodes in the ingested data",
                ))?,
            };

            let response = Response::from_string(json)
                .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
            request.respond(response)
        }

        // API: narrative markdown alone, for copy or download
        (&Method::Get, "/api/markdown") => {
            match ReportParams::resolve(store, &parse_query(&url).into_spec()) {
                Some(params) => {
                    let bundle = report::build_bundle(store, params);
                    let response = Response::from_string(bundle.markdown).with_header(
                        Header::from_bytes(&b"Content-Type"[..], &b"text/markdown; charset=utf-8"[..])
                            .unwrap(),
                    );
                    request.respond(response)
                }
                None => {
                    let response =
                        Response::from_string("no episodes in the ingested data").with_status_code(404);
                    request.respond(response)
                }
            }
        }

        // 404
        _ => {
            let response = Response::from_string("Not found").with_status_code(404);
            request.respond(response)
        }
    }
}

fn parse_query(url: &str) -> ReportQuery {
    let query = url.split('?').nth(1).unwrap_or("");
    serde_urlencoded::from_str(query).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // QUERY PARSING TESTS
    // ==========================================================================

    #[test]
    fn full_query_string_parses() {
        let q = parse_query(
            "/api/report?focus=3&episodes=1,2,3&curve=func&series=greet&window=9&intervals=2&dist=danmaku-func&top_n=5",
        );
        assert_eq!(q.focus.as_deref(), Some("3"));
        assert_eq!(q.episodes.as_deref(), Some("1,2,3"));
        assert_eq!(q.curve, "func");
        assert_eq!(q.series, "greet");
        assert_eq!(q.window, 9);
        assert_eq!(q.intervals, 2);
        assert_eq!(q.dist, "danmaku-func");
        assert_eq!(q.top_n, 5);
    }

    #[test]
    fn missing_or_malformed_query_falls_back_to_defaults() {
        for url in ["/api/report", "/api/report?", "/api/report?window=lots"] {
            let q = parse_query(url);
            assert_eq!(q.focus, None);
            assert_eq!(q.curve, "emo");
            assert_eq!(q.window, 5);
            assert_eq!(q.top_n, 8);
        }
    }

    #[test]
    fn episode_list_splits_on_commas() {
        let q = parse_query("/x?episodes=1,%202,,3%20");
        let spec = q.into_spec();
        assert_eq!(
            spec.episodes,
            Some(vec!["1".to_string(), "2".to_string(), "3".to_string()])
        );
    }

    #[test]
    fn blank_ids_resolve_to_none() {
        let q = parse_query("/x?focus=&episodes=%20,%20");
        let spec = q.into_spec();
        assert_eq!(spec.focus, None);
        assert_eq!(spec.episodes, None);
    }
}
