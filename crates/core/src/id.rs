//! Short opaque identifiers for games and moves

use std::fmt;
use std::str::FromStr;

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 6-character alphanumeric identifier.
///
/// Tokens slice identifiers by position, so the width is fixed and the
/// alphabet never contains characters used by base64url padding or
/// separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

pub type GameId = Id;
pub type MoveId = Id;

impl Id {
    pub const LEN: usize = 6;

    pub fn parse(s: &str) -> Result<Self> {
        if s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Id {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

/// Draws a fresh identifier from `rng`.
///
/// Collisions are possible (62^6 space) and are not checked here.
pub fn generate_id<R: Rng>(rng: &mut R) -> Id {
    let s: String = (0..Id::LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    Id(s)
}

/// Source of fresh identifiers, injected wherever new games or moves are created.
pub trait IdSource: Send {
    fn next_id(&mut self) -> Id;
}

/// Identifier source backed by a `rand` generator.
pub struct RandomIds<R = StdRng> {
    rng: R,
}

impl RandomIds<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sequence, for tests and reproducible sample data.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomIds<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> RandomIds<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> IdSource for RandomIds<R> {
    fn next_id(&mut self) -> Id {
        generate_id(&mut self.rng)
    }
}
