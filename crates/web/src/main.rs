use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use chess_anywhere_core::{
    Clock, Database, GameSession, GameStore, RandomIds, Rules, StandardRules, SystemClock,
};

mod board;
mod config;
mod error;
mod routes;

use config::Config;

pub struct AppState {
    pub store: Arc<dyn GameStore>,
    pub rules: Arc<dyn Rules>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn GameStore>, config: Config) -> Self {
        Self {
            store,
            rules: Arc::new(StandardRules::new()),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// A fresh session per request; the token carries everything else.
    pub fn session(&self) -> GameSession {
        GameSession::new(
            self.store.clone(),
            self.rules.clone(),
            Box::new(RandomIds::new()),
            self.clock.clone(),
        )
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/", get(routes::index))
        .route("/new", post(routes::new_game))
        .route("/move", post(routes::submit_move))
        .route("/confirm", post(routes::confirm_move))
        .route("/games", get(routes::games::games_list))
        .route("/games/samples", post(routes::games::seed))
        .route("/games/:id", get(routes::games::game_tree))
        .route("/api/games/:id/tree", get(routes::games::game_tree_json))
        .route("/stats", get(routes::games::stats))
        .route("/health", get(routes::health))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chess_anywhere_web=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();

    tracing::info!("Opening database {}", config.database_path);
    let db = Database::open(&config.database_path).expect("Failed to open database");
    match db.count_games() {
        Ok(count) => tracing::info!("{} games stored", count),
        Err(e) => tracing::warn!("Could not count games: {}", e),
    }

    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(Arc::new(db), config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app).await.expect("Server error");
}
