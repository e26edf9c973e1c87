//! Single binary web server: REST API over in-memory rotation sessions.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT.
//! ROTATION_CONFIG may point to a JSON engine config used for new sessions.

use actix_web::{
    delete, get, post,
    web::{Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use court_rotation::{
    fill_courts, finish_match, substitute, EngineConfig, FixedAnswer, LogListener, PlayerId,
    PoolSnapshot, RotationSession, SessionId, Tier,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Per-session entry: session data + last activity time (for auto-cleanup).
struct SessionEntry {
    session: RotationSession,
    last_activity: Instant,
}

/// In-memory state: many sessions by ID. Entries are removed after 12h inactivity.
type AppState = Data<RwLock<HashMap<SessionId, SessionEntry>>>;

/// Config used when a new session does not send its own.
type DefaultConfig = Data<EngineConfig>;

const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(12 * 3600);

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Serialize)]
struct SessionView<'a> {
    id: SessionId,
    config: &'a EngineConfig,
    pool: PoolSnapshot,
    matches_finished: usize,
}

impl<'a> SessionView<'a> {
    fn of(session: &'a RotationSession) -> Self {
        Self {
            id: session.id,
            config: &session.config,
            pool: session.snapshot(),
            matches_finished: session.history().len(),
        }
    }
}

#[derive(Deserialize)]
struct AddPlayerBody {
    name: String,
    #[serde(default)]
    level: f64,
    #[serde(default)]
    tier: Tier,
}

#[derive(Deserialize)]
struct BatchBody {
    text: String,
}

#[derive(Deserialize)]
struct RotateBody {
    /// Operator's answer if a court cannot be balanced.
    #[serde(default)]
    relax: bool,
}

#[derive(Deserialize)]
struct FinishBody {
    /// Run a rotation pass right after, so the freed court is re-filled.
    #[serde(default)]
    refill: bool,
    #[serde(default)]
    relax: bool,
}

#[derive(Deserialize)]
struct SubstituteBody {
    player: PlayerId,
}

#[derive(Deserialize)]
struct SeatBody {
    players: [PlayerId; 4],
}

/// Path segment: session id (e.g. /api/sessions/{id})
#[derive(Deserialize)]
struct SessionPath {
    id: SessionId,
}

#[derive(Deserialize)]
struct SessionPlayerPath {
    id: SessionId,
    player: PlayerId,
}

/// Path segments: session id and zero-based court index.
#[derive(Deserialize)]
struct SessionCourtPath {
    id: SessionId,
    court: usize,
}

fn bad_request(e: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
}

/// Look up a session, refresh its activity time and run `f` on it.
fn with_session<F>(state: &AppState, id: SessionId, f: F) -> HttpResponse
where
    F: FnOnce(&mut RotationSession) -> HttpResponse,
{
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return HttpResponse::InternalServerError().body("lock error"),
    };
    match g.get_mut(&id) {
        Some(entry) => {
            entry.last_activity = Instant::now();
            f(&mut entry.session)
        }
        None => HttpResponse::NotFound().json(serde_json::json!({ "error": "No session" })),
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "court-rotation",
    })
}

/// Create a session. The body may carry an engine config; otherwise the server default is used.
#[post("/api/sessions")]
async fn api_create_session(
    state: AppState,
    defaults: DefaultConfig,
    body: Option<Json<EngineConfig>>,
) -> HttpResponse {
    let config = match body {
        Some(Json(config)) => config,
        None => defaults.get_ref().clone(),
    };
    if let Err(e) = config.validate() {
        return bad_request(e);
    }
    let mut session = RotationSession::new(config);
    session.add_listener(Box::new(LogListener));
    let id = session.id;
    let response = HttpResponse::Ok().json(SessionView::of(&session));
    let mut g = match state.write() {
        Ok(guard) => guard,
        Err(_) => return HttpResponse::InternalServerError().body("lock error"),
    };
    g.insert(
        id,
        SessionEntry {
            session,
            last_activity: Instant::now(),
        },
    );
    log::info!("Created session {}", id);
    response
}

#[get("/api/sessions/{id}")]
async fn api_get_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    with_session(&state, path.id, |s| HttpResponse::Ok().json(SessionView::of(s)))
}

#[post("/api/sessions/{id}/players")]
async fn api_add_player(state: AppState, path: Path<SessionPath>, body: Json<AddPlayerBody>) -> HttpResponse {
    with_session(&state, path.id, |s| match s.add_player(&body.name, body.level, body.tier) {
        Ok(_) => HttpResponse::Ok().json(SessionView::of(s)),
        Err(e) => bad_request(e),
    })
}

/// Paste one `<name><level>` per line.
#[post("/api/sessions/{id}/players/batch")]
async fn api_add_players_batch(state: AppState, path: Path<SessionPath>, body: Json<BatchBody>) -> HttpResponse {
    with_session(&state, path.id, |s| {
        let report = s.add_players_from_text(&body.text);
        HttpResponse::Ok().json(report)
    })
}

/// Replace the unassigned list from a roster CSV (request body is the CSV text).
#[post("/api/sessions/{id}/roster")]
async fn api_import_roster(state: AppState, path: Path<SessionPath>, body: String) -> HttpResponse {
    with_session(&state, path.id, |s| match s.import_roster_csv(body.as_bytes()) {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => bad_request(e),
    })
}

#[post("/api/sessions/{id}/players/{player}/promote")]
async fn api_promote(state: AppState, path: Path<SessionPlayerPath>) -> HttpResponse {
    with_session(&state, path.id, |s| match s.promote(&path.player) {
        Ok(()) => HttpResponse::Ok().json(SessionView::of(s)),
        Err(e) => bad_request(e),
    })
}

#[post("/api/sessions/{id}/players/{player}/rest")]
async fn api_rest(state: AppState, path: Path<SessionPlayerPath>) -> HttpResponse {
    with_session(&state, path.id, |s| match s.rest(&path.player) {
        Ok(()) => HttpResponse::Ok().json(SessionView::of(s)),
        Err(e) => bad_request(e),
    })
}

#[delete("/api/sessions/{id}/players/{player}")]
async fn api_remove_player(state: AppState, path: Path<SessionPlayerPath>) -> HttpResponse {
    with_session(&state, path.id, |s| match s.remove(&path.player) {
        Ok(_) => HttpResponse::Ok().json(SessionView::of(s)),
        Err(e) => bad_request(e),
    })
}

/// Fill every empty court. `relax` answers the prompt if a court cannot be balanced.
#[post("/api/sessions/{id}/rotate")]
async fn api_rotate(state: AppState, path: Path<SessionPath>, body: Option<Json<RotateBody>>) -> HttpResponse {
    let relax = body.map(|b| b.relax).unwrap_or(false);
    with_session(&state, path.id, |s| {
        let report = fill_courts(s, &mut FixedAnswer(relax));
        HttpResponse::Ok().json(serde_json::json!({
            "report": report,
            "session": SessionView::of(s),
        }))
    })
}

/// End the match on a court. With `refill`, a rotation pass follows immediately.
#[post("/api/sessions/{id}/courts/{court}/finish")]
async fn api_finish_match(
    state: AppState,
    path: Path<SessionCourtPath>,
    body: Option<Json<FinishBody>>,
) -> HttpResponse {
    let (refill, relax) = body.map(|b| (b.refill, b.relax)).unwrap_or((false, false));
    with_session(&state, path.id, |s| {
        let record = match finish_match(s, path.court) {
            Ok(record) => record,
            Err(e) => return bad_request(e),
        };
        let report = refill.then(|| fill_courts(s, &mut FixedAnswer(relax)));
        HttpResponse::Ok().json(serde_json::json!({
            "record": record,
            "report": report,
            "session": SessionView::of(s),
        }))
    })
}

#[post("/api/sessions/{id}/courts/{court}/substitute")]
async fn api_substitute(
    state: AppState,
    path: Path<SessionCourtPath>,
    body: Json<SubstituteBody>,
) -> HttpResponse {
    with_session(&state, path.id, |s| match substitute(s, path.court, &body.player) {
        Ok(replacement) => HttpResponse::Ok().json(serde_json::json!({ "replacement": replacement })),
        Err(e) => bad_request(e),
    })
}

#[post("/api/sessions/{id}/courts/{court}/seat")]
async fn api_seat(state: AppState, path: Path<SessionCourtPath>, body: Json<SeatBody>) -> HttpResponse {
    let players = body.into_inner().players;
    with_session(&state, path.id, |s| match s.seat_manually(path.court, players) {
        Ok(event) => HttpResponse::Ok().json(event),
        Err(e) => bad_request(e),
    })
}

#[post("/api/sessions/{id}/courts/{court}/abandon")]
async fn api_abandon(state: AppState, path: Path<SessionCourtPath>) -> HttpResponse {
    with_session(&state, path.id, |s| match s.abandon_match(path.court) {
        Ok(()) => HttpResponse::Ok().json(SessionView::of(s)),
        Err(e) => bad_request(e),
    })
}

#[get("/api/sessions/{id}/history")]
async fn api_history(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    with_session(&state, path.id, |s| HttpResponse::Ok().json(s.export_match_history()))
}

/// Teammate pairs of the night, most frequent first.
#[get("/api/sessions/{id}/pairings")]
async fn api_pairings(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    with_session(&state, path.id, |s| HttpResponse::Ok().json(s.pairings().entries()))
}

#[get("/api/sessions/{id}/history.csv")]
async fn api_history_csv(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    with_session(&state, path.id, |s| {
        let mut buf = Vec::new();
        match s.write_history_csv(&mut buf) {
            Ok(()) => HttpResponse::Ok()
                .content_type("text/csv; charset=utf-8")
                .body(buf),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() })),
        }
    })
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Engine config from ROTATION_CONFIG, or defaults when unset or broken.
fn load_default_config() -> EngineConfig {
    let Ok(path) = std::env::var("ROTATION_CONFIG") else {
        return EngineConfig::default();
    };
    match EngineConfig::from_json_file(&path) {
        Ok(config) => {
            log::info!("Loaded engine config from {}", path);
            config
        }
        Err(e) => {
            log::warn!("{} ({}); using defaults", e, path);
            EngineConfig::default()
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_port);
    let bind = (host.as_str(), port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let state = Data::new(RwLock::new(HashMap::<SessionId, SessionEntry>::new()));
    let defaults = Data::new(load_default_config());

    // Every 30 minutes, drop sessions inactive for 12+ hours
    let state_cleanup = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30 * 60));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let mut g = match state_cleanup.write() {
                Ok(guard) => guard,
                Err(_) => continue,
            };
            let before = g.len();
            g.retain(|_, entry| entry.last_activity.elapsed() < INACTIVITY_TIMEOUT);
            let removed = before - g.len();
            if removed > 0 {
                log::info!("Cleaned up {} inactive session(s) (no activity for 12h)", removed);
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(defaults.clone())
            .service(api_health)
            .service(api_create_session)
            .service(api_get_session)
            .service(api_add_players_batch)
            .service(api_add_player)
            .service(api_import_roster)
            .service(api_promote)
            .service(api_rest)
            .service(api_remove_player)
            .service(api_rotate)
            .service(api_finish_match)
            .service(api_substitute)
            .service(api_seat)
            .service(api_abandon)
            .service(api_history_csv)
            .service(api_history)
            .service(api_pairings)
    })
    .bind(bind)?
    .run()
    .await
}
