//! JSON path descriptors.
//!
//! A path is a static description of key/index navigation inside a JSON
//! column. It is built with a closure or parsed from text, and compiled into
//! `->`/`->>` chains. It is never evaluated against data.
//!
//! ```text
//! skills[0]            -> skills, 0
//! address.city         -> address, city
//! orders[2]."line no"  -> orders, 2, line no
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, map_res, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded},
};
use serde::{Deserialize, Serialize};

use crate::error::{CritError, CritResult};

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JsonPath {
    pub segments: Vec<PathSegment>,
}

impl JsonPath {
    /// The document itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Step into an object key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Step into an array element. Negative indexes count from the end.
    pub fn index(mut self, index: i64) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Build a path from a navigation closure.
    pub fn navigate<F>(f: F) -> Self
    where
        F: FnOnce(JsonPath) -> JsonPath,
    {
        f(Self::root())
    }

    /// Parse a textual path such as `skills[0].name`.
    pub fn parse(input: &str) -> CritResult<Self> {
        let trimmed = input.trim();
        match parse_segments(trimmed) {
            Ok(("", segments)) => Ok(Self { segments }),
            Ok((remaining, _)) => Err(CritError::json_path(
                trimmed.len() - remaining.len(),
                format!("unexpected trailing content: '{}'", remaining),
            )),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(CritError::json_path(
                trimmed.len() - e.input.len(),
                format!("expected a key or [index] in '{}'", trimmed),
            )),
            Err(nom::Err::Incomplete(_)) => {
                Err(CritError::json_path(trimmed.len(), "incomplete path"))
            }
        }
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && matches!(segment, PathSegment::Key(_)) {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for JsonPath {
    type Err = CritError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPath::parse(s)
    }
}

fn parse_segments(input: &str) -> IResult<&str, Vec<PathSegment>> {
    let (input, first) = alt((parse_index, parse_key))(input)?;
    let (input, rest) = many0(alt((parse_index, preceded(char('.'), parse_key))))(input)?;

    let mut segments = Vec::with_capacity(rest.len() + 1);
    segments.push(first);
    segments.extend(rest);
    Ok((input, segments))
}

/// Bare or double-quoted key. A bare all-digit key is an array index.
fn parse_key(input: &str) -> IResult<&str, PathSegment> {
    alt((
        map(
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
            |s: &str| PathSegment::Key(s.to_string()),
        ),
        map(
            take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '$'),
            |s: &str| match s.parse::<i64>() {
                Ok(i) => PathSegment::Index(i),
                Err(_) => PathSegment::Key(s.to_string()),
            },
        ),
    ))(input)
}

fn parse_index(input: &str) -> IResult<&str, PathSegment> {
    map_res(
        delimited(char('['), recognize(pair(opt(char('-')), digit1)), char(']')),
        |s: &str| s.parse::<i64>().map(PathSegment::Index),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_index_after_key() {
        let path = JsonPath::parse("skills[0]").unwrap();
        assert_eq!(
            path.segments,
            vec![PathSegment::Key("skills".into()), PathSegment::Index(0)]
        );
    }

    #[test]
    fn test_parse_dotted_and_quoted() {
        let path = JsonPath::parse("orders[2].\"line no\".qty").unwrap();
        assert_eq!(
            path,
            JsonPath::root().key("orders").index(2).key("line no").key("qty")
        );
    }

    #[test]
    fn test_parse_numeric_dot_segment_is_index() {
        let path = JsonPath::parse("vessel.0.port").unwrap();
        assert_eq!(path, JsonPath::root().key("vessel").index(0).key("port"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = JsonPath::parse("skills[x]").unwrap_err();
        assert!(matches!(err, CritError::JsonPath { position: 6, .. }), "{err}");
        assert!(JsonPath::parse("").is_err());
    }

    #[test]
    fn test_navigate_closure_matches_parse() {
        let built = JsonPath::navigate(|p| p.key("skills").index(0));
        assert_eq!(built, "skills[0]".parse().unwrap());
        assert_eq!(built.to_string(), "skills[0]");
    }
}
