//! Prints a shareable link to a finished game (Fool's Mate)

use std::sync::Arc;

use chess_anywhere_core::codec::share_url;
use chess_anywhere_core::{
    GameSession, MemoryStore, MoveDescriptor, RandomIds, Rules, StandardRules, SystemClock,
};

const FOOLS_MATE: [(&str, &str); 4] = [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")];

#[tokio::main]
async fn main() {
    let base_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PUBLIC_URL").ok())
        .unwrap_or_else(|| "http://localhost:3000/".to_string());

    let rules = Arc::new(StandardRules::new());
    let mut session = GameSession::new(
        Arc::new(MemoryStore::new()),
        rules.clone(),
        Box::new(RandomIds::new()),
        Arc::new(SystemClock),
    );

    if let Err(e) = session.start_new_game().await {
        eprintln!("Failed to start game: {}", e);
        std::process::exit(1);
    }

    let mut last = None;
    for (from, to) in FOOLS_MATE {
        let submitted = MoveDescriptor::parse(from, to)
            .and_then(|mv| session.submit_move(mv).map(|staged| staged.classification));
        if let Err(e) = submitted {
            eprintln!("Move {}-{} rejected: {}", from, to, e);
            std::process::exit(1);
        }

        match session.confirm_move(Some("Winning Link")).await {
            Ok(snapshot) => last = Some(snapshot),
            Err(e) => {
                eprintln!("Failed to record move: {}", e);
                std::process::exit(1);
            }
        }
    }

    let Some(snapshot) = last else { return };
    if let (Ok(status), Ok(side)) = (
        session.classification(),
        rules.side_to_move(&snapshot.state.position),
    ) {
        println!("{}", status.status_line(side));
    }
    println!("{}", share_url(&base_url, &snapshot.token));
}
