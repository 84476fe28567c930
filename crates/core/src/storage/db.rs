//! SQLite game store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use shakmaty::Role;

use super::models::*;
use super::GameStore;
use crate::error::{Error, Result};
use crate::id::{GameId, Id, MoveId};
use crate::rules::MoveDescriptor;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("database lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY NOT NULL,
                starting_fen TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS moves (
                game_id TEXT NOT NULL,
                id TEXT NOT NULL,
                fen TEXT NOT NULL,
                move_from TEXT,
                move_to TEXT,
                promotion TEXT,
                created_at INTEGER NOT NULL,
                parent_id TEXT,
                contributor TEXT NOT NULL DEFAULT '',
                is_terminal INTEGER NOT NULL DEFAULT 0,
                outcome TEXT,
                PRIMARY KEY (game_id, id),
                FOREIGN KEY (game_id) REFERENCES games(id)
            );

            CREATE INDEX IF NOT EXISTS idx_games_created_at ON games(created_at DESC, id DESC);
            "#,
        )?;
        Ok(())
    }

    pub fn count_games(&self) -> Result<u32> {
        let count: u32 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn game_exists(conn: &Connection, game_id: &GameId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM games WHERE id = ?1",
            params![game_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn move_exists(conn: &Connection, game_id: &GameId, move_id: &MoveId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM moves WHERE game_id = ?1 AND id = ?2",
            params![game_id.as_str(), move_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_move(conn: &Connection, game_id: &GameId, record: &MoveRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO moves
        (game_id, id, fen, move_from, move_to, promotion, created_at, parent_id,
         contributor, is_terminal, outcome)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            game_id.as_str(),
            record.id.as_str(),
            record.position,
            record.mv.map(|mv| mv.from.to_string()),
            record.mv.map(|mv| mv.to.to_string()),
            record.mv.and_then(|mv| mv.promotion).map(|r| r.char().to_string()),
            record.created_at,
            record.parent_move_id.as_ref().map(|p| p.as_str()),
            record.contributor,
            record.is_terminal,
            record.outcome.map(|o| o.as_str()),
        ],
    )?;
    Ok(())
}

/// A `moves` row before its text columns are checked.
struct MoveRow {
    id: String,
    fen: String,
    move_from: Option<String>,
    move_to: Option<String>,
    promotion: Option<String>,
    created_at: i64,
    parent_id: Option<String>,
    contributor: String,
    is_terminal: bool,
    outcome: Option<String>,
}

impl MoveRow {
    fn into_record(self) -> Result<MoveRecord> {
        let corrupt = |what: &str| Error::Storage(format!("move {}: bad {}", self.id, what));

        let mv = match (&self.move_from, &self.move_to) {
            (Some(from), Some(to)) => {
                let mut mv = MoveDescriptor::parse(from, to).map_err(|_| corrupt("squares"))?;
                if let Some(p) = self.promotion.as_deref().and_then(|p| p.chars().next()) {
                    mv = mv.with_promotion(Role::from_char(p).ok_or_else(|| corrupt("promotion"))?);
                }
                Some(mv)
            }
            _ => None,
        };

        let outcome = match self.outcome.as_deref() {
            Some(s) => Some(Outcome::parse(s).ok_or_else(|| corrupt("outcome"))?),
            None => None,
        };

        Ok(MoveRecord {
            id: Id::parse(&self.id).map_err(|_| corrupt("id"))?,
            parent_move_id: self
                .parent_id
                .as_deref()
                .map(Id::parse)
                .transpose()
                .map_err(|_| corrupt("parent id"))?,
            position: self.fen,
            mv,
            created_at: self.created_at,
            contributor: self.contributor,
            is_terminal: self.is_terminal,
            outcome,
        })
    }
}

fn load_moves(conn: &Connection, game_id: &str) -> Result<Moves> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, fen, move_from, move_to, promotion, created_at, parent_id,
               contributor, is_terminal, outcome
        FROM moves WHERE game_id = ?1
        "#,
    )?;

    let rows = stmt
        .query_map(params![game_id], |row| {
            Ok(MoveRow {
                id: row.get(0)?,
                fen: row.get(1)?,
                move_from: row.get(2)?,
                move_to: row.get(3)?,
                promotion: row.get(4)?,
                created_at: row.get(5)?,
                parent_id: row.get(6)?,
                contributor: row.get(7)?,
                is_terminal: row.get(8)?,
                outcome: row.get(9)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut moves = Moves::new();
    for row in rows {
        let record = row.into_record()?;
        moves.insert(record.id.clone(), record);
    }
    Ok(moves)
}

fn load_game(conn: &Connection, id: String, starting_fen: String, created_at: i64) -> Result<GameDocument> {
    let moves = load_moves(conn, &id)?;
    Ok(GameDocument {
        game_id: Id::parse(&id).map_err(|_| Error::Storage(format!("bad game id {:?}", id)))?,
        starting_position: starting_fen,
        created_at,
        moves,
    })
}

#[async_trait]
impl GameStore for Database {
    async fn get(&self, game_id: &GameId) -> Result<Option<GameDocument>> {
        let conn = self.lock()?;
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT id, starting_fen, created_at FROM games WHERE id = ?1",
                params![game_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((id, fen, created_at)) => Ok(Some(load_game(&conn, id, fen, created_at)?)),
            None => Ok(None),
        }
    }

    async fn create_game(&self, game: &GameDocument) -> Result<()> {
        let mut conn = self.lock()?;
        if game_exists(&conn, &game.game_id)? {
            return Err(Error::Storage(format!("game {} already exists", game.game_id)));
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO games (id, starting_fen, created_at) VALUES (?1, ?2, ?3)",
            params![game.game_id.as_str(), game.starting_position, game.created_at],
        )?;
        for record in game.moves.values() {
            insert_move(&tx, &game.game_id, record)?;
        }
        tx.commit()?;

        tracing::debug!(game_id = %game.game_id, "created game");
        Ok(())
    }

    async fn append_move(&self, game_id: &GameId, record: &MoveRecord) -> Result<()> {
        let conn = self.lock()?;
        if !game_exists(&conn, game_id)? {
            return Err(Error::GameNotFound(game_id.to_string()));
        }

        if move_exists(&conn, game_id, &record.id)? {
            return Err(Error::DuplicateMove {
                game_id: game_id.to_string(),
                move_id: record.id.to_string(),
            });
        }

        let parent = record.parent_move_id.as_ref().ok_or_else(|| {
            Error::Storage(format!("game {} already has a root record", game_id))
        })?;
        if !move_exists(&conn, game_id, parent)? {
            return Err(Error::MoveNotFound {
                game_id: game_id.to_string(),
                move_id: parent.to_string(),
            });
        }

        insert_move(&conn, game_id, record)?;
        tracing::debug!(game_id = %game_id, move_id = %record.id, "appended move");
        Ok(())
    }

    async fn mark_terminal(
        &self,
        game_id: &GameId,
        move_id: &MoveId,
        outcome: Outcome,
    ) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE moves SET is_terminal = 1, outcome = ?3 WHERE game_id = ?1 AND id = ?2",
            params![game_id.as_str(), move_id.as_str(), outcome.as_str()],
        )?;

        if changed == 0 {
            if !game_exists(&conn, game_id)? {
                return Err(Error::GameNotFound(game_id.to_string()));
            }
            return Err(Error::MoveNotFound {
                game_id: game_id.to_string(),
                move_id: move_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_games(&self, page_size: usize, after: Option<&PageCursor>) -> Result<Page> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, starting_fen, created_at FROM games
            WHERE ?1 IS NULL OR created_at < ?1 OR (created_at = ?1 AND id < ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![
                    after.map(|c| c.created_at),
                    after.map(|c| c.game_id.as_str()),
                    (page_size + 1) as i64,
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut games = Vec::with_capacity(rows.len());
        for (id, fen, created_at) in rows {
            games.push(load_game(&conn, id, fen, created_at)?.summary());
        }
        Ok(Page::from_overfetch(games, page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    fn id(s: &str) -> Id {
        Id::parse(s).unwrap()
    }

    fn game(game_id: &str, created_at: i64) -> GameDocument {
        GameDocument::new(
            id(game_id),
            MoveRecord::root(id("root00"), START.to_string(), created_at),
        )
    }

    fn e4(move_id: &str, at: i64) -> MoveRecord {
        let mut record = MoveRecord::child(
            id(move_id),
            id("root00"),
            MoveDescriptor::parse("e2", "e4").unwrap(),
            AFTER_E4.to_string(),
            at,
        );
        record.contributor = "Alice".to_string();
        record
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let doc = game("game01", 1_000);
        db.create_game(&doc).await.unwrap();

        assert_eq!(db.get(&id("game01")).await.unwrap(), Some(doc));
        assert_eq!(db.get(&id("nope00")).await.unwrap(), None);
        assert_eq!(db.count_games().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let db = Database::open_in_memory().unwrap();
        db.create_game(&game("game01", 1)).await.unwrap();
        let err = db.create_game(&game("game01", 2)).await.unwrap_err();
        assert!(err.is_persistence());
    }

    #[tokio::test]
    async fn test_append_move_round_trips_all_fields() {
        let db = Database::open_in_memory().unwrap();
        db.create_game(&game("game01", 1)).await.unwrap();

        let mut promo = MoveRecord::child(
            id("promo1"),
            id("mvone1"),
            MoveDescriptor::parse("a7", "a8").unwrap().with_promotion(Role::Knight),
            "fen".to_string(),
            3,
        );
        promo.mark_terminal(Outcome::WhiteWins);

        db.append_move(&id("game01"), &e4("mvone1", 2)).await.unwrap();
        db.append_move(&id("game01"), &promo).await.unwrap();

        let doc = db.get(&id("game01")).await.unwrap().unwrap();
        assert_eq!(doc.moves.len(), 3);
        assert_eq!(doc.moves[&id("mvone1")], e4("mvone1", 2));
        assert_eq!(doc.moves[&id("promo1")], promo);
    }

    #[tokio::test]
    async fn test_append_errors() {
        let db = Database::open_in_memory().unwrap();
        db.create_game(&game("game01", 1)).await.unwrap();
        db.append_move(&id("game01"), &e4("mvone1", 2)).await.unwrap();

        assert!(matches!(
            db.append_move(&id("game01"), &e4("mvone1", 3)).await,
            Err(Error::DuplicateMove { .. })
        ));
        assert!(matches!(
            db.append_move(&id("ghost0"), &e4("mvtwo1", 3)).await,
            Err(Error::GameNotFound(_))
        ));

        // The original record is untouched by the rejected duplicate.
        let doc = db.get(&id("game01")).await.unwrap().unwrap();
        assert_eq!(doc.moves[&id("mvone1")].created_at, 2);
    }

    #[tokio::test]
    async fn test_append_needs_existing_parent() {
        let db = Database::open_in_memory().unwrap();
        db.create_game(&game("game01", 1)).await.unwrap();

        let mut orphan = e4("orphan", 2);
        orphan.parent_move_id = Some(id("ZZZZZZ"));
        assert!(matches!(
            db.append_move(&id("game01"), &orphan).await,
            Err(Error::MoveNotFound { move_id, .. }) if move_id == "ZZZZZZ"
        ));

        let second_root = MoveRecord::root(id("root01"), START.to_string(), 3);
        assert!(db.append_move(&id("game01"), &second_root).await.is_err());

        let doc = db.get(&id("game01")).await.unwrap().unwrap();
        assert_eq!(doc.moves.len(), 1);
        assert!(crate::tree::build_tree(&doc.moves).is_ok());
    }

    #[tokio::test]
    async fn test_mark_terminal() {
        let db = Database::open_in_memory().unwrap();
        db.create_game(&game("game01", 1)).await.unwrap();
        db.append_move(&id("game01"), &e4("mvone1", 2)).await.unwrap();

        db.mark_terminal(&id("game01"), &id("mvone1"), Outcome::Draw)
            .await
            .unwrap();
        let doc = db.get(&id("game01")).await.unwrap().unwrap();
        assert!(doc.moves[&id("mvone1")].is_terminal);
        assert_eq!(doc.moves[&id("mvone1")].outcome, Some(Outcome::Draw));

        assert!(matches!(
            db.mark_terminal(&id("game01"), &id("nope00"), Outcome::Draw).await,
            Err(Error::MoveNotFound { .. })
        ));
        assert!(matches!(
            db.mark_terminal(&id("ghost0"), &id("mvone1"), Outcome::Draw).await,
            Err(Error::GameNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_games_pages_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..7 {
            db.create_game(&game(&format!("game{:02}", i), i as i64 / 2))
                .await
                .unwrap();
        }

        let first = db.list_games(3, None).await.unwrap();
        let ids: Vec<&str> = first.games.iter().map(|g| g.game_id.as_str()).collect();
        assert_eq!(ids, vec!["game06", "game05", "game04"]);

        let cursor: PageCursor = first.next_cursor.unwrap().parse().unwrap();
        let second = db.list_games(3, Some(&cursor)).await.unwrap();
        let ids: Vec<&str> = second.games.iter().map(|g| g.game_id.as_str()).collect();
        assert_eq!(ids, vec!["game03", "game02", "game01"]);

        let cursor: PageCursor = second.next_cursor.unwrap().parse().unwrap();
        let last = db.list_games(3, Some(&cursor)).await.unwrap();
        assert_eq!(last.games.len(), 1);
        assert_eq!(last.next_cursor, None);

        assert_eq!(db.all_summaries().await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_summary_stats() {
        let db = Database::open_in_memory().unwrap();
        db.create_game(&game("game01", 1)).await.unwrap();
        db.append_move(&id("game01"), &e4("mvone1", 2)).await.unwrap();
        db.append_move(&id("game01"), &e4("mvtwo1", 3)).await.unwrap();
        db.mark_terminal(&id("game01"), &id("mvtwo1"), Outcome::BlackWins)
            .await
            .unwrap();

        let page = db.list_games(10, None).await.unwrap();
        let summary = &page.games[0];
        assert_eq!(summary.move_count, 3);
        assert_eq!(summary.stats.total_parallel, 2);
        assert_eq!(summary.stats.ongoing, 1);
        assert_eq!(summary.stats.black_wins, 1);
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_games() {
        let path = std::env::temp_dir().join(format!("chess-anywhere-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let db = Database::open(&path).unwrap();
            db.create_game(&game("game01", 1)).await.unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.get(&id("game01")).await.unwrap().is_some());
        let _ = std::fs::remove_file(&path);
    }
}
