use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base of shareable links; tokens are appended as `?game=<token>`.
    pub public_url: String,
    pub games_page_size: usize,
    /// Exposes `POST /games/samples`.
    pub enable_samples: bool,
    pub static_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_path: "chess_anywhere.db".to_string(),
            public_url: "http://localhost:3000/".to_string(),
            games_page_size: 10,
            enable_samples: false,
            static_dir: "crates/web/static".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            public_url: env::var("PUBLIC_URL").unwrap_or(defaults.public_url),
            games_page_size: env::var("GAMES_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.games_page_size),
            enable_samples: env::var("ENABLE_SAMPLES")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.enable_samples),
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
