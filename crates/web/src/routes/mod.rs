use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use shakmaty::Role;
use std::sync::Arc;

use chess_anywhere_core::codec::share_url;
use chess_anywhere_core::{Error as CoreError, GameSession, MoveDescriptor, Rules};

use crate::board::BoardView;
use crate::error::AppError;
use crate::AppState;

pub mod games;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub token: String,
    pub game_id: String,
    pub board: BoardView,
    pub status: String,
    pub game_over: bool,
    pub share_url: String,
    pub shared: bool,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "confirm.html")]
pub struct ConfirmTemplate {
    pub title: String,
    pub token: String,
    pub from: String,
    pub to: String,
    pub promotion: String,
    pub move_name: String,
    pub board: BoardView,
    pub status: String,
    pub game_over: bool,
}

#[derive(Deserialize)]
pub struct PlayQuery {
    pub game: Option<String>,
    pub shared: Option<String>,
}

#[derive(Deserialize)]
pub struct MoveForm {
    pub token: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub promotion: String,
}

#[derive(Deserialize)]
pub struct ConfirmForm {
    pub token: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub promotion: String,
    #[serde(default)]
    pub contributor: String,
    #[serde(default)]
    pub action: String,
}

/// Renders a page, turning template failures into a 500.
pub(crate) fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::Internal(format!("template error: {}", e)))
}

fn game_url(token: &str) -> String {
    format!("/?game={}", token)
}

fn parse_move(from: &str, to: &str, promotion: &str) -> Result<MoveDescriptor, AppError> {
    let mv = MoveDescriptor::parse(from, to).map_err(|e| AppError::InvalidMove(e.to_string()))?;
    match promotion.trim().chars().next() {
        None => Ok(mv),
        Some(c) => Role::from_char(c.to_ascii_lowercase())
            .map(|role| mv.with_promotion(role))
            .ok_or_else(|| AppError::InvalidMove(format!("unknown promotion piece {:?}", c))),
    }
}

/// Status line for the session's current position.
fn status_of(state: &AppState, session: &GameSession) -> Result<(String, bool), AppError> {
    let current = session
        .current()
        .ok_or_else(|| AppError::Internal("session not loaded".to_string()))?;
    let classification = session.classification()?;
    let side = state.rules.side_to_move(&current.position)?;
    Ok((classification.status_line(side), classification.is_terminal()))
}

fn render_play(
    state: &AppState,
    session: &GameSession,
    shared: bool,
    error: Option<String>,
) -> Result<IndexTemplate, AppError> {
    let current = session
        .current()
        .ok_or_else(|| AppError::Internal("session not loaded".to_string()))?;
    let token = current.encode();
    let (status, game_over) = status_of(state, session)?;

    Ok(IndexTemplate {
        title: "Chess Anywhere".to_string(),
        share_url: share_url(&state.config.public_url, &token),
        game_id: current.game_id.to_string(),
        board: BoardView::from_fen(&current.position)?,
        token,
        status,
        game_over,
        shared,
        error,
    })
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlayQuery>,
) -> Result<Response, AppError> {
    let mut session = state.session();
    let snapshot = session.open(query.game.as_deref()).await?;

    if snapshot.fresh {
        return Ok(Redirect::to(&game_url(&snapshot.token)).into_response());
    }

    let page = render_play(&state, &session, query.shared.is_some(), None)?;
    Ok(render(&page)?.into_response())
}

pub async fn new_game(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    let mut session = state.session();
    let snapshot = session.start_new_game().await?;
    Ok(Redirect::to(&game_url(&snapshot.token)))
}

pub async fn submit_move(
    State(state): State<Arc<AppState>>,
    Form(form): Form<MoveForm>,
) -> Result<Response, AppError> {
    let mut session = state.session();
    session.resume(&form.token).await?;
    let mv = parse_move(&form.from, &form.to, &form.promotion)?;

    let staged = session
        .submit_move(mv)
        .map(|staged| (staged.record.clone(), staged.classification));
    let (record, classification) = match staged {
        Ok(staged) => staged,
        Err(CoreError::IllegalMove(msg)) => {
            let page = render_play(&state, &session, false, Some(format!("Illegal move: {}", msg)))?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, render(&page)?).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let side = state.rules.side_to_move(&record.position)?;
    let page = ConfirmTemplate {
        title: "Confirm move".to_string(),
        token: form.token,
        from: form.from,
        to: form.to,
        promotion: form.promotion,
        move_name: mv.to_string(),
        board: BoardView::from_fen(&record.position)?,
        status: classification.status_line(side),
        game_over: classification.is_terminal(),
    };
    Ok(render(&page)?.into_response())
}

pub async fn confirm_move(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ConfirmForm>,
) -> Result<Redirect, AppError> {
    let mut session = state.session();
    session.resume(&form.token).await?;

    if form.action == "cancel" {
        return Ok(Redirect::to(&game_url(&form.token)));
    }

    // The staged move does not survive between requests, so it is validated again.
    let mv = parse_move(&form.from, &form.to, &form.promotion)?;
    session.submit_move(mv)?;

    let contributor = form.contributor.trim();
    let snapshot = session
        .confirm_move((!contributor.is_empty()).then_some(contributor))
        .await?;

    Ok(Redirect::to(&format!("{}&shared=1", game_url(&snapshot.token))))
}

pub async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::Router;
    use tower::ServiceExt;

    use chess_anywhere_core::codec;
    use chess_anywhere_core::{GameStore, MemoryStore, StandardRules};

    use crate::config::Config;

    pub(crate) fn test_app(store: Arc<MemoryStore>, config: Config) -> Router {
        crate::router(Arc::new(AppState::new(store, config)))
    }

    pub(crate) async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub(crate) fn post_form(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn new_token(app: &Router) -> String {
        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        location(&response).trim_start_matches("/?game=").to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Arc::new(MemoryStore::new()), Config::default());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_fresh_visit_redirects_to_new_game() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());

        let token = new_token(&app).await;
        let state = codec::decode(&token, &StandardRules::new()).unwrap();
        assert!(store.get(&state.game_id).await.unwrap().is_some());

        let response = app.oneshot(get(&game_url(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Current turn: White"));
        assert!(body.contains(&token));
    }

    #[tokio::test]
    async fn test_broken_token_starts_new_game() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());

        let response = app.oneshot(get("/?game=garbage")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_move_confirm_flow() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());
        let token = new_token(&app).await;

        let response = app
            .clone()
            .oneshot(post_form("/move", format!("token={}&from=e2&to=e4", token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("e2-e4"));

        // Staging alone persists nothing.
        let root = codec::split(&token).unwrap();
        assert_eq!(store.get(&root.game_id).await.unwrap().unwrap().moves.len(), 1);

        let response = app
            .clone()
            .oneshot(post_form(
                "/confirm",
                format!("token={}&from=e2&to=e4&contributor=Alice", token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let next = location(&response);
        assert!(next.ends_with("&shared=1"));

        let next_token = next
            .trim_start_matches("/?game=")
            .trim_end_matches("&shared=1");
        let moved = codec::decode(next_token, &StandardRules::new()).unwrap();
        assert_eq!(moved.game_id, root.game_id);

        let doc = store.get(&root.game_id).await.unwrap().unwrap();
        let record = &doc.moves[&moved.move_id];
        assert_eq!(record.parent_move_id.as_ref(), Some(&root.move_id));
        assert_eq!(record.contributor, "Alice");

        let response = app.oneshot(get(&next)).await.unwrap();
        let body = body_text(response).await;
        assert!(body.contains("Current turn: Black"));
    }

    #[tokio::test]
    async fn test_cancel_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());
        let token = new_token(&app).await;

        let response = app
            .oneshot(post_form(
                "/confirm",
                format!("token={}&from=e2&to=e4&action=cancel", token),
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), game_url(&token));

        let root = codec::split(&token).unwrap();
        assert_eq!(store.get(&root.game_id).await.unwrap().unwrap().moves.len(), 1);
    }

    #[tokio::test]
    async fn test_illegal_move_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());
        let token = new_token(&app).await;

        let response = app
            .clone()
            .oneshot(post_form("/move", format!("token={}&from=e2&to=e5", token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("Illegal move"));

        let response = app
            .oneshot(post_form(
                "/confirm",
                format!("token={}&from=e2&to=e5", token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_move_with_bad_token_is_rejected() {
        let app = test_app(Arc::new(MemoryStore::new()), Config::default());
        let response = app
            .oneshot(post_form("/move", "token=short&from=e2&to=e4".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_move_under_unknown_parent_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());
        let token = new_token(&app).await;
        let root = codec::split(&token).unwrap();

        let forged = codec::encode(
            &root.game_id,
            &chess_anywhere_core::Id::parse("ZZZZZZ").unwrap(),
            &root.position,
        );
        let response = app
            .clone()
            .oneshot(post_form(
                "/confirm",
                format!("token={}&from=e2&to=e4", forged),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.clone().oneshot(get(&game_url(&forged))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let doc = store.get(&root.game_id).await.unwrap().unwrap();
        assert_eq!(doc.moves.len(), 1);
        let response = app
            .oneshot(get(&format!("/games/{}", root.game_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_new_game_button() {
        let store = Arc::new(MemoryStore::new());
        let app = test_app(store.clone(), Config::default());
        let response = app
            .oneshot(post_form("/new", String::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(location(&response).starts_with("/?game="));
        assert_eq!(store.len().await, 1);
    }
}
