//! Fills the game database with sample games
//!
//! Usage: seed-samples [count] [extra.pgn]

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use chess_anywhere_core::parser::parse_pgn_file;
use chess_anywhere_core::samples::{famous_games, seed_samples};
use chess_anywhere_core::{Database, RandomIds, SystemClock};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let count: usize = match args.next() {
        Some(arg) => arg.parse().unwrap_or_else(|_| {
            eprintln!("Usage: seed-samples [count] [extra.pgn]");
            std::process::exit(1);
        }),
        None => 10,
    };

    let mut bases = match famous_games() {
        Ok(games) => games,
        Err(e) => {
            eprintln!("Built-in games failed to parse: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(path) = args.next() {
        match parse_pgn_file(&path) {
            Ok(games) => {
                println!("Loaded {} extra games from {}", games.len(), path);
                bases.extend(games);
            }
            Err(e) => {
                eprintln!("Failed to read {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    let db_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "chess_anywhere.db".to_string());
    let db = match Database::open(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", db_path, e);
            std::process::exit(1);
        }
    };

    let mut rng = StdRng::from_os_rng();
    let mut ids = RandomIds::new();
    match seed_samples(&db, count, &bases, &mut rng, &mut ids, &SystemClock).await {
        Ok(created) => {
            println!("Created {} of {} sample games in {}", created.len(), count, db_path);
            for game_id in created {
                println!("  {}", game_id);
            }
        }
        Err(e) => {
            eprintln!("Seeding failed: {}", e);
            std::process::exit(1);
        }
    }
}
