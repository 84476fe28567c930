//! Game-state tokens
//!
//! A token is `<gameId><moveId><base64url(FEN)>`: two fixed-width
//! identifiers followed by the URL-safe, unpadded base64 of the position.
//! There are no delimiters, the identifier widths are what make slicing
//! unambiguous.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{GameId, Id, MoveId};
use crate::rules::Rules;

/// Shortest possible token: both identifiers and an empty position.
pub const MIN_TOKEN_LEN: usize = 2 * Id::LEN;

/// URL-safe alphabet, never pads, accepts padded input from hand-edited links.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The three fields carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub game_id: GameId,
    pub move_id: MoveId,
    pub position: String,
}

impl GameState {
    pub fn new(game_id: GameId, move_id: MoveId, position: impl Into<String>) -> Self {
        Self {
            game_id,
            move_id,
            position: position.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.game_id, &self.move_id, &self.position)
    }
}

pub fn encode(game_id: &GameId, move_id: &MoveId, position: &str) -> String {
    let encoded = URL_SAFE_LENIENT.encode(position.as_bytes());
    let mut token = String::with_capacity(MIN_TOKEN_LEN + encoded.len());
    token.push_str(game_id.as_str());
    token.push_str(move_id.as_str());
    token.push_str(&encoded);
    token
}

/// Structural decode without consulting the rules oracle.
pub fn split(token: &str) -> Result<GameState> {
    let token = token.trim();
    if token.len() < MIN_TOKEN_LEN {
        return Err(Error::MalformedToken(format!(
            "expected at least {} characters, got {}",
            MIN_TOKEN_LEN,
            token.len()
        )));
    }

    if !token.as_bytes()[..MIN_TOKEN_LEN]
        .iter()
        .all(|b| b.is_ascii_alphanumeric())
    {
        return Err(Error::MalformedToken(
            "identifier segment is not alphanumeric".to_string(),
        ));
    }

    let (ids, encoded) = token.split_at(MIN_TOKEN_LEN);
    let (game_id, move_id) = ids.split_at(Id::LEN);

    let bytes = URL_SAFE_LENIENT
        .decode(encoded)
        .map_err(|e| Error::MalformedToken(format!("position segment: {}", e)))?;
    let position = String::from_utf8(bytes)
        .map_err(|_| Error::InvalidPosition("position is not UTF-8 text".to_string()))?;

    Ok(GameState {
        game_id: Id::parse(game_id)?,
        move_id: Id::parse(move_id)?,
        position,
    })
}

/// Decodes a token and checks that its position is a legal board description.
pub fn decode(token: &str, rules: &dyn Rules) -> Result<GameState> {
    let state = split(token)?;
    rules.validate(&state.position)?;
    Ok(state)
}

/// Shareable link for `token` under `base_url`.
pub fn share_url(base_url: &str, token: &str) -> String {
    format!("{}?game={}", base_url, token)
}
