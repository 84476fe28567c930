use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, Redirect},
    Json,
};
use chrono::DateTime;
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;
use std::sync::Arc;

use chess_anywhere_core::codec;
use chess_anywhere_core::samples::{famous_games, seed_samples};
use chess_anywhere_core::storage::PageCursor;
use chess_anywhere_core::{
    build_tree, GameDocument, GameId, GameStats, MoveTreeNode, RandomIds, SiteStats,
};

use super::render;
use crate::error::AppError;
use crate::AppState;

/// Games created by one press of the sample button.
const SAMPLES_PER_REQUEST: usize = 5;

pub struct GameRow {
    pub game_id: String,
    pub created: String,
    pub move_count: usize,
    pub stats: GameStats,
}

#[derive(Template)]
#[template(path = "games.html")]
pub struct GamesTemplate {
    pub title: String,
    pub games: Vec<GameRow>,
    pub next_cursor: Option<String>,
    pub samples_enabled: bool,
}

/// One line of the rendered move tree.
pub struct TreeLine {
    pub indent: usize,
    pub label: String,
    /// Play link reopening the game at this node.
    pub link: String,
    pub outcome: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "tree.html")]
pub struct TreeTemplate {
    pub title: String,
    pub game_id: String,
    pub created: String,
    pub stats: GameStats,
    pub lines: Vec<TreeLine>,
}

#[derive(Template)]
#[template(path = "stats.html")]
pub struct StatsTemplate {
    pub title: String,
    pub stats: SiteStats,
    pub average: String,
    pub buckets: Vec<(String, u32)>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub after: Option<String>,
}

fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_game_id(id: &str) -> Result<GameId, AppError> {
    GameId::parse(id).map_err(|_| AppError::BadRequest(format!("Invalid game id: {}", id)))
}

async fn load_game(state: &AppState, game_id: &GameId) -> Result<GameDocument, AppError> {
    state
        .store
        .get(game_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game {} not found", game_id)))
}

pub async fn games_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, AppError> {
    let cursor = query
        .after
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<PageCursor>())
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let page = state
        .store
        .list_games(state.config.games_page_size, cursor.as_ref())
        .await?;

    let games = page
        .games
        .into_iter()
        .map(|g| GameRow {
            game_id: g.game_id.to_string(),
            created: format_millis(g.created_at),
            move_count: g.move_count,
            stats: g.stats,
        })
        .collect();

    render(&GamesTemplate {
        title: "Games".to_string(),
        games,
        next_cursor: page.next_cursor,
        samples_enabled: state.config.enable_samples,
    })
}

pub async fn game_tree(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let game_id = parse_game_id(&id)?;
    let doc = load_game(&state, &game_id).await?;
    let tree = build_tree(&doc.moves)?;

    let lines = tree
        .flatten()
        .into_iter()
        .map(|row| {
            let record = &row.node.record;
            TreeLine {
                indent: row.depth,
                label: row.node.label(row.depth),
                link: format!(
                    "/?game={}",
                    codec::encode(&game_id, &record.id, &record.position)
                ),
                outcome: record
                    .outcome
                    .filter(|_| record.is_terminal)
                    .map(|o| o.display_name()),
            }
        })
        .collect();

    render(&TreeTemplate {
        title: format!("Game {}", game_id),
        game_id: game_id.to_string(),
        created: format_millis(doc.created_at),
        stats: GameStats::from_moves(&doc.moves),
        lines,
    })
}

pub async fn game_tree_json(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MoveTreeNode>, AppError> {
    let game_id = parse_game_id(&id)?;
    let doc = load_game(&state, &game_id).await?;
    Ok(Json(build_tree(&doc.moves)?))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let summaries = state.store.all_summaries().await?;
    let stats = SiteStats::from_games(&summaries);

    render(&StatsTemplate {
        title: "Statistics".to_string(),
        average: format!("{:.1}", stats.average_parallel_games),
        buckets: stats.move_buckets(),
        stats,
    })
}

pub async fn seed(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    if !state.config.enable_samples {
        return Err(AppError::NotFound("Sample games are disabled".to_string()));
    }

    let bases = famous_games()?;
    let mut rng = StdRng::from_os_rng();
    let mut ids = RandomIds::new();
    let created = seed_samples(
        state.store.as_ref(),
        SAMPLES_PER_REQUEST,
        &bases,
        &mut rng,
        &mut ids,
        state.clock.as_ref(),
    )
    .await?;
    tracing::info!("Seeded {} sample games", created.len());

    Ok(Redirect::to("/games"))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{body_text, post_form, test_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use chess_anywhere_core::{GameStore, Id, MemoryStore, MoveDescriptor, MoveRecord, Outcome};

    use crate::config::Config;

    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn id(s: &str) -> Id {
        Id::parse(s).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// Root with two replies to 1. e4, one of them terminal.
    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut doc = GameDocument::new(
            id("game01"),
            MoveRecord::root(id("root00"), START.to_string(), 1_000),
        );
        let e4 = MoveRecord::child(
            id("move01"),
            id("root00"),
            MoveDescriptor::parse("e2", "e4").unwrap(),
            "fen-e4".to_string(),
            2_000,
        );
        let e5 = MoveRecord::child(
            id("move02"),
            id("move01"),
            MoveDescriptor::parse("e7", "e5").unwrap(),
            "fen-e5".to_string(),
            3_000,
        );
        let mut c5 = MoveRecord::child(
            id("move03"),
            id("move01"),
            MoveDescriptor::parse("c7", "c5").unwrap(),
            "fen-c5".to_string(),
            4_000,
        );
        c5.contributor = "Bob".to_string();
        c5.mark_terminal(Outcome::Draw);
        for record in [e4, e5, c5] {
            doc.moves.insert(record.id.clone(), record);
        }
        store.create_game(&doc).await.unwrap();

        for n in 2..=4 {
            let game = GameDocument::new(
                id(&format!("game0{}", n)),
                MoveRecord::root(id(&format!("root0{}", n)), START.to_string(), n * 10_000),
            );
            store.create_game(&game).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_games_list_pages() {
        let config = Config {
            games_page_size: 3,
            ..Config::default()
        };
        let app = test_app(seeded_store().await, config);

        let response = app.clone().oneshot(get("/games")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("game04"));
        assert!(body.contains("game02"));
        assert!(!body.contains("game01"));
        assert!(body.contains("Older games"));

        let cursor = PageCursor {
            created_at: 20_000,
            game_id: id("game02"),
        };
        let response = app
            .oneshot(get(&format!("/games?after={}", cursor)))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("game01"));
        assert!(!body.contains("game04"));
        assert!(!body.contains("Older games"));
    }

    #[tokio::test]
    async fn test_games_list_rejects_bad_cursor() {
        let app = test_app(seeded_store().await, Config::default());
        let response = app.oneshot(get("/games?after=yesterday")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_game_tree_page() {
        let app = test_app(seeded_store().await, Config::default());
        let response = app.oneshot(get("/games/game01")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("Starting Position"));
        assert!(body.contains("1. e2-e4 (Anonymous)"));
        assert!(body.contains("1... c7-c5 (Bob)"));
        assert!(body.contains("Draw"));
    }

    #[tokio::test]
    async fn test_game_tree_errors() {
        let app = test_app(seeded_store().await, Config::default());

        let response = app.clone().oneshot(get("/games/zzzzzz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get("/games/bad-id")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_game_tree_json() {
        let app = test_app(seeded_store().await, Config::default());
        let response = app.oneshot(get("/api/games/game01/tree")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["record"]["id"], "root00");
        let replies = &json["children"][0]["children"];
        assert_eq!(replies.as_array().unwrap().len(), 2);
        assert_eq!(replies[0]["record"]["id"], "move02");
        assert_eq!(replies[1]["record"]["outcome"], "draw");
    }

    #[tokio::test]
    async fn test_stats_page() {
        let app = test_app(seeded_store().await, Config::default());
        let response = app.oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("Total games: 4"));
        assert!(body.contains("0-9"));
        // Two leaves in game01 plus one per empty game.
        assert!(body.contains("Parallel games: 5"));
    }

    #[tokio::test]
    async fn test_seed_disabled_by_default() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());
        let response = app
            .oneshot(post_form("/games/samples", String::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_seed_creates_games() {
        let store = Arc::new(MemoryStore::new());
        let config = Config {
            enable_samples: true,
            ..Config::default()
        };
        let app = test_app(store.clone(), config);
        let response = app
            .oneshot(post_form("/games/samples", String::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(store.len().await, SAMPLES_PER_REQUEST);

        for summary in store.all_summaries().await.unwrap() {
            let doc = store.get(&summary.game_id).await.unwrap().unwrap();
            let tree = build_tree(&doc.moves).unwrap();
            assert!(tree.size() > 1);
        }
    }
}
