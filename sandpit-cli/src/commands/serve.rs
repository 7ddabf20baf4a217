//! Playground server: editor pages, JSON API and sandboxed frames.

use super::build::load_workspace;
use anyhow::{Context, Result};
use askama::Template;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use include_dir::{include_dir, Dir};
use sandpit_core::{
    is_known_file, ExecutionHost, FileStorage, FrameHost, FrameLookup, KeyChord,
    LaunchParams, Lifecycle, RunReceipt,
};
use sandpit_render::{json_for_script, EditorTab, NotFoundTemplate, PlaygroundTemplate};
use sandpit_runtime::SandboxPolicy;
use sandpit_types::{language_for, ExecutionMode, Generation, RunTrigger};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Editor UI assets
static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

const TITLE: &str = "Sandpit";

/// How often the persistence debounce is polled
const PERSIST_TICK: Duration = Duration::from_millis(100);

type SharedLifecycle = Arc<RwLock<Lifecycle<FrameHost, FileStorage>>>;

#[derive(Clone)]
pub(crate) struct AppState {
    lifecycle: SharedLifecycle,
}

/// Start the playground server
pub async fn serve(config_path: &Path, port: Option<u16>) -> Result<()> {
    let (mut config, workspace) = load_workspace(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let state_path = config.state_path();
    let mut lifecycle = Lifecycle::from_config(
        FrameHost::new(SandboxPolicy::playground()),
        FileStorage::new(&state_path),
        &config,
    );
    if !state_path.exists() {
        // First session: start from the files on disk
        let files = workspace
            .load_files()
            .with_context(|| format!("Failed to read sources from {:?}", workspace.root()))?;
        let stdin = workspace.load_stdin().context("Failed to read stdin.txt")?;
        lifecycle = lifecycle.with_sources(files, stdin);
    }

    let shared: SharedLifecycle = Arc::new(RwLock::new(lifecycle));
    let app = router(AppState {
        lifecycle: shared.clone(),
    });

    let ticker = tokio::spawn({
        let lifecycle = shared.clone();
        async move {
            let mut interval = tokio::time::interval(PERSIST_TICK);
            loop {
                interval.tick().await;
                lifecycle.write().await.poll_persistence(Instant::now());
            }
        }
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    let local = listener.local_addr()?;

    tracing::info!("Starting playground server on http://{}", local);
    println!("\nServing at http://{}", local);
    println!("   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    ticker.abort();
    if shared.write().await.flush_persistence() {
        tracing::info!("Saved editor state to {:?}", state_path);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page_current))
        .route("/html", get(page_markup))
        .route("/javascript", get(page_script))
        .route("/api/state", get(api_state))
        .route("/api/files/{name}", put(api_put_file))
        .route("/api/active", put(api_select_file))
        .route("/api/stdin", put(api_put_stdin).delete(api_reset_stdin))
        .route("/api/split", put(api_put_split))
        .route("/api/mode", put(api_put_mode))
        .route("/api/run", post(api_run))
        .route("/api/key", post(api_key))
        .route("/api/download", get(api_download))
        .route("/frame/{generation}", get(serve_frame))
        .route("/assets/{*path}", get(serve_asset))
        .fallback(serve_404)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---- Pages ----

async fn page_current(
    State(state): State<AppState>,
    Query(params): Query<LaunchParams>,
) -> Response {
    render_page(&state, None, params).await
}

async fn page_markup(
    State(state): State<AppState>,
    Query(params): Query<LaunchParams>,
) -> Response {
    render_page(&state, Some(ExecutionMode::Markup), params).await
}

async fn page_script(
    State(state): State<AppState>,
    Query(params): Query<LaunchParams>,
) -> Response {
    render_page(&state, Some(ExecutionMode::Script), params).await
}

async fn render_page(state: &AppState, mode: Option<ExecutionMode>, params: LaunchParams) -> Response {
    let now = Instant::now();
    let mut lc = state.lifecycle.write().await;
    if let Some(mode) = mode {
        lc.set_mode(mode);
    }

    lc.reload();
    // A page load shows an empty frame unless this load auto-ran
    let launched = match lc.mount(params, now) {
        Ok(receipt) => receipt.map(|r| r.generation),
        Err(e) => {
            tracing::warn!("Auto-run failed: {}", e);
            None
        }
    };

    let snapshot = lc.snapshot(now);
    let state_json = match json_for_script(&snapshot) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize state: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "State error").into_response();
        }
    };

    let mode = lc.mode();
    let active_file = lc.active_file().to_string();
    let template = PlaygroundTemplate {
        title: TITLE.to_string(),
        mode: mode.as_str().to_string(),
        html_route: ExecutionMode::Markup.route().to_string(),
        js_route: ExecutionMode::Script.route().to_string(),
        is_markup: mode == ExecutionMode::Markup,
        tabs: mode
            .files()
            .iter()
            .map(|name| EditorTab {
                name: name.to_string(),
                language: language_for(name).to_string(),
                active: *name == active_file,
            })
            .collect(),
        active_content: lc.files().text(&active_file).to_string(),
        active_file,
        stdin: lc.stdin().raw().to_string(),
        split_percent: format!("{:.1}", lc.split_ratio() * 100.0),
        sandbox: lc.host().policy().attribute_value(),
        frame_src: launched
            .map(frame_route)
            .unwrap_or_else(|| "about:blank".to_string()),
        state_json,
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render playground: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

fn frame_route(generation: Generation) -> String {
    format!("/frame/{}", generation)
}

// ---- API handlers ----

async fn api_state(State(state): State<AppState>) -> Response {
    let lc = state.lifecycle.read().await;
    Json(lc.snapshot(Instant::now())).into_response()
}

async fn api_put_file(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    body: String,
) -> Response {
    if !is_known_file(&name) {
        return (StatusCode::BAD_REQUEST, format!("Unknown file {:?}", name)).into_response();
    }
    state
        .lifecycle
        .write()
        .await
        .edit_file(&name, &body, Instant::now());
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct SelectRequest {
    name: String,
}

async fn api_select_file(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Response {
    let mut lc = state.lifecycle.write().await;
    if lc.select_file(&req.name) {
        Json(serde_json::json!({
            "active_file": lc.active_file(),
            "content": lc.files().text(&req.name),
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            format!("{:?} is not a file of the current mode", req.name),
        )
            .into_response()
    }
}

async fn api_put_stdin(State(state): State<AppState>, body: String) -> Response {
    state
        .lifecycle
        .write()
        .await
        .set_stdin(&body, Instant::now());
    StatusCode::NO_CONTENT.into_response()
}

async fn api_reset_stdin(State(state): State<AppState>) -> Response {
    state.lifecycle.write().await.reset_stdin(Instant::now());
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize, Serialize)]
struct SplitRequest {
    ratio: f64,
}

async fn api_put_split(State(state): State<AppState>, Json(req): Json<SplitRequest>) -> Response {
    match state
        .lifecycle
        .write()
        .await
        .set_split_ratio(req.ratio, Instant::now())
    {
        Some(ratio) => Json(SplitRequest { ratio }).into_response(),
        None => (StatusCode::BAD_REQUEST, "Split ratio must be a finite number").into_response(),
    }
}

#[derive(Deserialize)]
struct ModeRequest {
    mode: ExecutionMode,
}

async fn api_put_mode(State(state): State<AppState>, Json(req): Json<ModeRequest>) -> Response {
    let mut lc = state.lifecycle.write().await;
    let route = lc.set_mode(req.mode);
    Json(serde_json::json!({
        "mode": req.mode,
        "route": route,
        "active_file": lc.active_file(),
        "files": req.mode.files(),
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RunRequest {
    #[serde(default = "default_trigger")]
    trigger: RunTrigger,
}

fn default_trigger() -> RunTrigger {
    RunTrigger::Manual
}

#[derive(Serialize)]
struct RunResponse {
    #[serde(flatten)]
    receipt: RunReceipt,
    frame: String,
}

impl From<RunReceipt> for RunResponse {
    fn from(receipt: RunReceipt) -> Self {
        let frame = frame_route(receipt.generation);
        Self { receipt, frame }
    }
}

async fn api_run(State(state): State<AppState>, Json(req): Json<RunRequest>) -> Response {
    let result = state
        .lifecycle
        .write()
        .await
        .request_run(req.trigger, Instant::now());
    match result {
        Ok(receipt) => Json(RunResponse::from(receipt)).into_response(),
        Err(e) => (StatusCode::FORBIDDEN, e.to_string()).into_response(),
    }
}

async fn api_key(State(state): State<AppState>, Json(chord): Json<KeyChord>) -> Response {
    let result = state
        .lifecycle
        .write()
        .await
        .handle_key(&chord, Instant::now());
    match result {
        Ok(Some(receipt)) => Json(RunResponse::from(receipt)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::FORBIDDEN, e.to_string()).into_response(),
    }
}

async fn api_download(State(state): State<AppState>) -> Response {
    let download = state.lifecycle.read().await.download();
    (
        [
            (header::CONTENT_TYPE, format!("{}; charset=utf-8", download.content_type)),
            (header::CONTENT_DISPOSITION, download.content_disposition()),
        ],
        download.body,
    )
        .into_response()
}

// ---- Frames and assets ----

async fn serve_frame(
    State(state): State<AppState>,
    AxumPath(generation): AxumPath<u64>,
) -> Response {
    let lc = state.lifecycle.read().await;
    let host = lc.host();
    match host.frame(Generation::new(generation)) {
        FrameLookup::Current(document) => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                (header::CONTENT_SECURITY_POLICY, host.policy().csp_header()),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            document.text.clone(),
        )
            .into_response(),
        FrameLookup::Superseded { live } => not_found_page(
            StatusCode::GONE,
            "Run superseded",
            &format!("Run {} was replaced by run {}.", generation, live),
        ),
        FrameLookup::Empty => not_found_page(
            StatusCode::NOT_FOUND,
            "No such run",
            &format!("Run {} does not exist.", generation),
        ),
    }
}

async fn serve_asset(AxumPath(path): AxumPath<String>) -> Response {
    match ASSETS.get_file(&path) {
        Some(file) => (
            [(header::CONTENT_TYPE, content_type_for_path(&path))],
            file.contents(),
        )
            .into_response(),
        None => not_found_page(StatusCode::NOT_FOUND, "Not found", "No such asset."),
    }
}

async fn serve_404(uri: Uri) -> Response {
    not_found_page(
        StatusCode::NOT_FOUND,
        "Not found",
        &format!("Nothing lives at {}.", uri.path()),
    )
}

fn not_found_page(status: StatusCode, title: &str, message: &str) -> Response {
    let page = NotFoundTemplate {
        title: title.to_string(),
        message: message.to_string(),
    };
    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render error page: {}", e);
            (status, message.to_string()).into_response()
        }
    }
}

fn content_type_for_path(path: &str) -> &'static str {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
