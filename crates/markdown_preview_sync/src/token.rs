//! Block token stream consumed by the sync engine.

use serde::{Deserialize, Serialize};

/// Whether a token opens, closes or stands alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Nesting {
    Open,
    Close,
    SelfClosing,
}

impl From<Nesting> for i8 {
    fn from(nesting: Nesting) -> Self {
        match nesting {
            Nesting::Open => 1,
            Nesting::Close => -1,
            Nesting::SelfClosing => 0,
        }
    }
}

impl TryFrom<i8> for Nesting {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Open),
            -1 => Ok(Self::Close),
            0 => Ok(Self::SelfClosing),
            other => Err(format!("invalid nesting {other}, expected 1, 0 or -1")),
        }
    }
}

/// A single block-level token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Element type, `""` for content without an element of its own.
    pub tag: String,
    pub nesting: Nesting,
    /// Nesting depth at which the token appears.
    pub level: usize,
    /// Half-open `[start, end)` range of 0-based source lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<[usize; 2]>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl Token {
    pub fn new(tag: impl Into<String>, nesting: Nesting, level: usize) -> Self {
        Self {
            tag: tag.into(),
            nesting,
            level,
            map: None,
            hidden: false,
        }
    }

    pub fn with_map(mut self, start: usize, end: usize) -> Self {
        self.map = Some([start, end]);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.map
            .map(|[start, end]| start <= line && line < end)
            .unwrap_or(false)
    }

    pub fn start_line(&self) -> Option<usize> {
        self.map.map(|[start, _]| start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_json_shape() {
        let token = Token::new("p", Nesting::Open, 0).with_map(2, 3);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, r#"{"tag":"p","nesting":1,"level":0,"map":[2,3]}"#);

        let parsed: Token =
            serde_json::from_str(r#"{"tag":"","nesting":0,"level":1,"hidden":true}"#).unwrap();
        assert_eq!(parsed.nesting, Nesting::SelfClosing);
        assert!(parsed.hidden);
        assert!(parsed.map.is_none());

        assert!(serde_json::from_str::<Token>(r#"{"tag":"p","nesting":2,"level":0}"#).is_err());
    }

    #[test]
    fn test_contains_line_is_half_open() {
        let token = Token::new("p", Nesting::Open, 0).with_map(2, 4);
        assert!(!token.contains_line(1));
        assert!(token.contains_line(2));
        assert!(token.contains_line(3));
        assert!(!token.contains_line(4));
        assert!(!Token::new("", Nesting::SelfClosing, 1).contains_line(0));
    }
}
