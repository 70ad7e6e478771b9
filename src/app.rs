#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Request, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::chart::ChartKind;
use crate::config::ServerConfig;
use crate::downloader::{self, ExportFormat};
use crate::error::DashboardError;
use crate::filter::{FilterSelection, apply_filter};
use crate::graph::Rasterizer;
use crate::pipeline::{self, AxisSelection, ColumnInfo, ViewModel};
use crate::sample;
use crate::session::{SessionId, SessionStore, SourceDescriptor};
use crate::table::Table;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "dashboard_session";

pub struct AppState {
    pub sessions: SessionStore,
    pub rasterizer: Rasterizer,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        AppState {
            sessions: SessionStore::new(config.session_ttl),
            rasterizer: Rasterizer::new(config.graph.clone(), config.font.as_deref()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Which table a request works on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// The file uploaded in this session
    #[default]
    Upload,
    /// The built-in sales data
    Sample,
}

/// Widget state sent by the page on every interaction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewRequest {
    #[serde(default)]
    pub dataset: Dataset,
    #[serde(default)]
    pub filters: FilterSelection,
    #[serde(flatten)]
    pub axes: AxisSelection,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct SessionInfo {
    status: String,
    source: Option<SourceDescriptor>,
    rows: usize,
    columns: Vec<ColumnInfo>,
}

impl SessionInfo {
    fn new(table: Option<&Table>, source: Option<SourceDescriptor>) -> Self {
        SessionInfo {
            status: "ok".to_string(),
            source,
            rows: table.map(Table::height).unwrap_or(0),
            columns: table
                .map(|t| {
                    t.columns()
                        .iter()
                        .map(|c| ColumnInfo {
                            name: c.name.clone(),
                            column_type: c.column_type(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// A pipeline error on its way to the browser
pub struct ApiError(pub DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            DashboardError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Encoding(_) | DashboardError::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };
        log::warn!("request failed ({}): {}", status, self.0);

        (
            status,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(self.0.to_string()),
            }),
        )
            .into_response()
    }
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Setup app state
    let state = Arc::new(AppState::new(&config));

    // Sweep idle sessions in the background
    let sweeper = Arc::clone(&state);
    let every = config
        .session_ttl
        .clamp(Duration::from_secs(1), Duration::from_secs(600));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            sweeper.sessions.purge_expired();
        }
    });

    let app = router(state);

    // Start server
    let listener = TcpListener::bind(config.addr).await?;
    log::info!("Listening on http://{}", config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router for the dashboard page and its JSON API
pub fn router(state: Arc<AppState>) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/session", get(session_info))
        .route("/api/upload", post(upload))
        .route("/api/view", post(view))
        .route("/api/download/:kind", post(download))
        .route("/api/export/:format", post(export_data))
        .route("/api/reset", post(reset))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!("request", method = %request.method(), uri = %request.uri())
        }))
        .with_state(state)
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

// Finds the caller's session, starting a new one (and setting the cookie)
// when the cookie is missing, malformed or refers to an expired session.
fn resolve_session(state: &AppState, jar: CookieJar) -> (CookieJar, SessionId) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        if state.sessions.contains(&id) {
            return (jar, id);
        }
    }

    let id = state.sessions.create();
    let mut cookie = Cookie::new(SESSION_COOKIE, id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

fn dataset_table(
    state: &AppState,
    id: &SessionId,
    dataset: Dataset,
) -> Result<Table, DashboardError> {
    match dataset {
        Dataset::Sample => Ok(sample::sales_table()),
        Dataset::Upload => state.sessions.table(id).ok_or(DashboardError::NoTable),
    }
}

async fn session_info(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let info = state
        .sessions
        .with_session(&id, |s| SessionInfo::new(s.table(), s.source().cloned()))
        .unwrap_or_else(|| SessionInfo::new(None, None));
    (jar, Json(info))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let result = receive_upload(&state, &id, multipart).await;
    (jar, result)
}

async fn receive_upload(
    state: &AppState,
    id: &SessionId,
    mut multipart: Multipart,
) -> Result<Json<SessionInfo>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DashboardError::Parse(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DashboardError::Parse(e.to_string()))?;
        file = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) =
        file.ok_or_else(|| DashboardError::Parse("no file data received".to_string()))?;

    state.sessions.load(id, &bytes, &file_name)?;
    state
        .sessions
        .with_session(id, |s| SessionInfo::new(s.table(), s.source().cloned()))
        .map(Json)
        .ok_or(ApiError(DashboardError::NoTable))
}

fn build_view(
    state: &AppState,
    id: &SessionId,
    request: &ViewRequest,
) -> Result<ViewModel, DashboardError> {
    let table = dataset_table(state, id, request.dataset)?;
    match request.dataset {
        Dataset::Sample => pipeline::render_sales(&table, &request.filters),
        Dataset::Upload => pipeline::render(&table, &request.filters, &request.axes),
    }
}

async fn view(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<ViewRequest>,
) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    let result = build_view(&state, &id, &request)
        .map(Json)
        .map_err(ApiError);
    (jar, result)
}

async fn render_png(
    state: &AppState,
    id: &SessionId,
    kind: ChartKind,
    request: &ViewRequest,
) -> Result<Vec<u8>, DashboardError> {
    let table = dataset_table(state, id, request.dataset)?;
    let chart = match request.dataset {
        Dataset::Sample => pipeline::sales_chart(&table, &request.filters, kind)?,
        Dataset::Upload => pipeline::chart_for(&table, &request.filters, &request.axes, kind)?,
    };

    let rasterizer = state.rasterizer.clone();
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&chart))
        .await
        .map_err(|e| DashboardError::Encoding(e.to_string()))?
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    jar: CookieJar,
    Json(request): Json<ViewRequest>,
) -> Response {
    let (jar, id) = resolve_session(&state, jar);
    let kind = match kind.parse::<ChartKind>() {
        Ok(kind) => kind,
        Err(err) => return (jar, ApiError(err)).into_response(),
    };

    match render_png(&state, &id, kind, &request).await {
        Ok(png) => (
            jar,
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", kind.download_name()),
                ),
            ],
            png,
        )
            .into_response(),
        Err(err) => (jar, ApiError(err)).into_response(),
    }
}

async fn export_data(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
    jar: CookieJar,
    Json(request): Json<ViewRequest>,
) -> Response {
    let (jar, id) = resolve_session(&state, jar);
    let result = format.parse::<ExportFormat>().and_then(|format| {
        let table = dataset_table(&state, &id, request.dataset)?;
        let filtered = apply_filter(&table, &request.filters)?;
        downloader::export(&filtered, format).map(|bytes| (format, bytes))
    });

    match result {
        Ok((format, bytes)) => (
            jar,
            [
                (header::CONTENT_TYPE, format.content_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", format.file_name()),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => (jar, ApiError(err)).into_response(),
    }
}

async fn reset(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = resolve_session(&state, jar);
    state.sessions.reset(&id);
    log::info!("session {} reset", id);
    (
        jar,
        Json(StatusResponse {
            status: "ok".to_string(),
            message: None,
        }),
    )
}
