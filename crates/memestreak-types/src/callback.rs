//! Inline-button payloads.
//!
//! Payloads are colon-separated tokens (`pickfriend:<uid>`,
//! `react:<symbol>:<sender uid>`). Colons and backslashes inside a token are
//! backslash-escaped so any token round trips.

use std::fmt;
use std::str::FromStr;

/// Telegram rejects `callback_data` longer than this many bytes.
pub const MAX_CALLBACK_BYTES: usize = 64;

const PICK_FRIEND: &str = "pickfriend";
const REACT: &str = "react";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    /// Chosen recipient for the next meme.
    PickFriend { friend_uid: String },
    /// Reaction to a relayed meme, addressed back to its sender.
    React { symbol: String, sender_uid: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("callback payload is {0} bytes, limit is {MAX_CALLBACK_BYTES}")]
    TooLong(usize),

    #[error("unknown callback tag: {0}")]
    UnknownTag(String),

    #[error("callback {tag} expects {expected} fields, got {got}")]
    Arity {
        tag: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("empty field in callback payload")]
    EmptyField,

    #[error("dangling escape at end of callback payload")]
    DanglingEscape,
}

impl CallbackData {
    pub fn pick_friend(friend_uid: impl Into<String>) -> Self {
        Self::PickFriend {
            friend_uid: friend_uid.into(),
        }
    }

    pub fn react(symbol: impl Into<String>, sender_uid: impl Into<String>) -> Self {
        Self::React {
            symbol: symbol.into(),
            sender_uid: sender_uid.into(),
        }
    }

    /// Encodes to the wire form, failing if it would exceed the platform limit.
    pub fn encode(&self) -> Result<String, CallbackError> {
        let encoded = self.to_string();
        if encoded.len() > MAX_CALLBACK_BYTES {
            return Err(CallbackError::TooLong(encoded.len()));
        }
        Ok(encoded)
    }

    pub fn decode(raw: &str) -> Result<Self, CallbackError> {
        let tokens = split_escaped(raw)?;
        let (tag, fields) = tokens.split_first().ok_or(CallbackError::EmptyField)?;

        let data = match tag.as_str() {
            PICK_FRIEND => {
                let [friend_uid] = expect_fields::<1>(PICK_FRIEND, fields)?;
                Self::PickFriend { friend_uid }
            }
            REACT => {
                let [symbol, sender_uid] = expect_fields::<2>(REACT, fields)?;
                Self::React { symbol, sender_uid }
            }
            other => return Err(CallbackError::UnknownTag(other.to_string())),
        };
        Ok(data)
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PickFriend { friend_uid } => {
                write!(f, "{PICK_FRIEND}:{}", escape(friend_uid))
            }
            Self::React { symbol, sender_uid } => {
                write!(f, "{REACT}:{}:{}", escape(symbol), escape(sender_uid))
            }
        }
    }
}

impl FromStr for CallbackData {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

fn expect_fields<const N: usize>(
    tag: &'static str,
    fields: &[String],
) -> Result<[String; N], CallbackError> {
    if fields.iter().any(String::is_empty) {
        return Err(CallbackError::EmptyField);
    }
    <[String; N]>::try_from(fields.to_vec()).map_err(|v| CallbackError::Arity {
        tag,
        expected: N,
        got: v.len(),
    })
}

fn escape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if c == ':' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn split_escaped(raw: &str) -> Result<Vec<String>, CallbackError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => return Err(CallbackError::DanglingEscape),
            },
            ':' => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tokens.push(current);
    Ok(tokens)
}
