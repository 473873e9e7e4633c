use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use warcsearch_core::persist::{load_index, IndexPaths};
use warcsearch_core::{DocId, InvertedIndex, DEFAULT_TOP_K};

const MAX_K: usize = 100;
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_LEN: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { DEFAULT_TOP_K }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub record_id: String,
    pub target_uri: String,
    pub date: String,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<InvertedIndex>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Load the index saved under `index_dir` and build the router around it.
pub fn build_app(index_dir: &str) -> Result<Router> {
    let paths = IndexPaths::new(index_dir);
    let index = load_index(&paths).with_context(|| format!("loading index from {index_dir}"))?;
    tracing::info!(num_docs = index.total_documents(), num_terms = index.num_terms(), "index loaded");
    Ok(router(Arc::new(index)))
}

pub fn router(index: Arc<InvertedIndex>) -> Router {
    // CORS: CORS_ALLOW_ORIGIN is a comma-separated origin list; unset or unparsable means any
    let any = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                any
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => any,
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(AppState { index })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let k = params.k.clamp(1, MAX_K);
    let top = state.index.search_str(&params.q, k).map_err(|e| {
        tracing::debug!(query = %params.q, error = %e, "rejected query");
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let highlighter = highlighter(&params.q);
    let results = top
        .hits
        .iter()
        .filter_map(|hit| {
            let fields = state.index.stored_fields(hit.doc_id)?;
            Some(SearchHit {
                doc_id: hit.doc_id,
                score: hit.score,
                record_id: fields.record_id.clone(),
                target_uri: fields.target_uri.clone(),
                date: fields.date.clone(),
                snippet: snippet(&fields.text, highlighter.as_ref()),
            })
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::info!(query = %params.q, hits = top.total_hits, took_s = elapsed.as_secs_f64(), "search");
    Ok(Json(SearchResponse { query: params.q, took_ms: elapsed.as_millis(), took_s: elapsed.as_secs_f64(), total_hits: top.total_hits, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<serde_json::Value>, ApiError> {
    let fields = state
        .index
        .stored_fields(doc_id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "not found"))?;
    Ok(Json(json!({
        "doc_id": doc_id,
        "record_id": fields.record_id,
        "target_uri": fields.target_uri,
        "date": fields.date,
        "warcinfo_id": fields.warcinfo_id,
        "trec_id": fields.trec_id,
        "text": fields.text,
    })))
}

/// Case-insensitive matcher for the positive words of a raw query.
fn highlighter(query: &str) -> Option<Regex> {
    let words: Vec<String> = query
        .split_whitespace()
        .filter(|w| !w.starts_with('-'))
        .map(|w| w.trim_matches(|c: char| c == '+' || c == '"'))
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }
    RegexBuilder::new(&words.join("|")).case_insensitive(true).build().ok()
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn snippet(text: &str, highlighter: Option<&Regex>) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let window = match highlighter.and_then(|re| re.find(text)) {
        Some(m) => {
            let start = floor_boundary(text, m.start().saturating_sub(SNIPPET_BEFORE));
            let end = floor_boundary(text, (m.start() + SNIPPET_LEN).min(text.len()));
            &text[start..end.max(m.end())]
        }
        None => &text[..floor_boundary(text, SNIPPET_LEN.min(text.len()))],
    };
    Some(match highlighter {
        Some(re) => re.replace_all(window, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned(),
        None => window.to_string(),
    })
}
