//! Window clause fragments: frames, boundaries and exclusion.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::expr::Expr;
use super::operators::SortOrder;
use crate::error::{CritError, CritResult};

/// One edge of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

impl Boundary {
    /// Parse a `(kind, offset?)` tuple.
    ///
    /// `preceding` and `following` require an offset; the other kinds reject one.
    pub fn from_tuple(kind: &str, offset: Option<i64>) -> CritResult<Self> {
        let normalized = kind.trim().to_ascii_lowercase();
        match (normalized.as_str(), offset) {
            ("preceding", Some(n)) => Ok(Boundary::Preceding(non_negative(n)?)),
            ("following", Some(n)) => Ok(Boundary::Following(non_negative(n)?)),
            ("preceding" | "following", None) => {
                Err(CritError::MissingBoundaryOffset(normalized))
            }
            ("unbounded preceding" | "unbounded following" | "current row", Some(n)) => {
                Err(CritError::UnexpectedBoundaryOffset {
                    kind: normalized,
                    offset: n,
                })
            }
            ("unbounded preceding", None) => Ok(Boundary::UnboundedPreceding),
            ("unbounded following", None) => Ok(Boundary::UnboundedFollowing),
            ("current row", None) => Ok(Boundary::CurrentRow),
            _ => Err(CritError::InvalidBoundaryType(kind.to_string())),
        }
    }

    /// Position class used by the frame ordering rules. Offsets don't matter.
    fn rank(&self) -> u8 {
        match self {
            Boundary::UnboundedPreceding => 0,
            Boundary::Preceding(_) => 1,
            Boundary::CurrentRow => 2,
            Boundary::Following(_) => 3,
            Boundary::UnboundedFollowing => 4,
        }
    }
}

fn non_negative(n: i64) -> CritResult<u64> {
    u64::try_from(n)
        .map_err(|_| CritError::InvalidFrame(format!("boundary offset must not be negative (got {})", n)))
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Boundary::UnboundedPreceding => write!(f, "UNBOUNDED PRECEDING"),
            Boundary::Preceding(n) => write!(f, "{} PRECEDING", n),
            Boundary::CurrentRow => write!(f, "CURRENT ROW"),
            Boundary::Following(n) => write!(f, "{} FOLLOWING", n),
            Boundary::UnboundedFollowing => write!(f, "UNBOUNDED FOLLOWING"),
        }
    }
}

/// A `BETWEEN start AND end` frame extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub between: Boundary,
    pub and: Boundary,
}

impl FrameSpec {
    /// Validate and build a frame.
    pub fn new(between: Boundary, and: Boundary) -> CritResult<Self> {
        if between == Boundary::UnboundedFollowing {
            return Err(CritError::InvalidFrame(
                "frame start cannot be UNBOUNDED FOLLOWING".to_string(),
            ));
        }
        if and == Boundary::UnboundedPreceding {
            return Err(CritError::InvalidFrame(
                "frame end cannot be UNBOUNDED PRECEDING".to_string(),
            ));
        }
        if between.rank() > and.rank() {
            return Err(CritError::InvalidFrame(format!(
                "frame starting at {} cannot end at {}",
                between, and
            )));
        }
        Ok(Self { between, and })
    }

    /// Build a frame from two `(kind, offset?)` tuples.
    pub fn from_tuples(between: (&str, Option<i64>), and: (&str, Option<i64>)) -> CritResult<Self> {
        Self::new(
            Boundary::from_tuple(between.0, between.1)?,
            Boundary::from_tuple(and.0, and.1)?,
        )
    }

    /// `BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING`
    pub fn whole() -> Self {
        Self {
            between: Boundary::UnboundedPreceding,
            and: Boundary::UnboundedFollowing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameUnit {
    Rows,
    Range,
    Groups,
}

impl std::fmt::Display for FrameUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameUnit::Rows => write!(f, "ROWS"),
            FrameUnit::Range => write!(f, "RANGE"),
            FrameUnit::Groups => write!(f, "GROUPS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExcludeOption {
    CurrentRow,
    Group,
    Ties,
}

impl FromStr for ExcludeOption {
    type Err = CritError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current row" => Ok(ExcludeOption::CurrentRow),
            "group" => Ok(ExcludeOption::Group),
            "ties" => Ok(ExcludeOption::Ties),
            _ => Err(CritError::InvalidExcludeOption(s.to_string())),
        }
    }
}

impl std::fmt::Display for ExcludeOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExcludeOption::CurrentRow => write!(f, "CURRENT ROW"),
            ExcludeOption::Group => write!(f, "GROUP"),
            ExcludeOption::Ties => write!(f, "TIES"),
        }
    }
}

/// A fragment inside `OVER (...)`, kept in the order it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowClause {
    PartitionBy(Vec<Expr>),
    OrderBy(Vec<(Expr, SortOrder)>),
    Frame { unit: FrameUnit, spec: FrameSpec },
    Exclude(ExcludeOption),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_requires_offset() {
        let err = FrameSpec::from_tuples(("preceding", None), ("current row", None)).unwrap_err();
        assert!(matches!(err, CritError::MissingBoundaryOffset(ref k) if k == "preceding"));
    }

    #[test]
    fn test_boundary_with_offset() {
        let frame = FrameSpec::from_tuples(("preceding", Some(1)), ("current row", None)).unwrap();
        assert_eq!(frame.between, Boundary::Preceding(1));
        assert_eq!(frame.and, Boundary::CurrentRow);
    }

    #[test]
    fn test_boundary_invalid_kind() {
        let err = Boundary::from_tuple("sideways", None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid boundary type: 'sideways'");
    }

    #[test]
    fn test_boundary_rejects_stray_offset() {
        let err = Boundary::from_tuple("current row", Some(3)).unwrap_err();
        assert!(matches!(err, CritError::UnexpectedBoundaryOffset { offset: 3, .. }));
    }

    #[test]
    fn test_boundary_rejects_negative_offset() {
        assert!(matches!(
            Boundary::from_tuple("following", Some(-2)),
            Err(CritError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_frame_ordering_rules() {
        assert!(FrameSpec::new(Boundary::UnboundedFollowing, Boundary::UnboundedFollowing).is_err());
        assert!(FrameSpec::new(Boundary::CurrentRow, Boundary::UnboundedPreceding).is_err());
        assert!(FrameSpec::new(Boundary::CurrentRow, Boundary::Preceding(1)).is_err());
        assert!(FrameSpec::new(Boundary::Following(1), Boundary::CurrentRow).is_err());
        assert!(FrameSpec::new(Boundary::Preceding(3), Boundary::Following(3)).is_ok());
        assert!(FrameSpec::new(Boundary::Preceding(1), Boundary::Preceding(5)).is_ok());
    }

    #[test]
    fn test_exclude_option_parse() {
        assert_eq!("Current Row".parse::<ExcludeOption>().unwrap(), ExcludeOption::CurrentRow);
        assert_eq!("ties".parse::<ExcludeOption>().unwrap(), ExcludeOption::Ties);
        assert!(matches!(
            "others".parse::<ExcludeOption>(),
            Err(CritError::InvalidExcludeOption(_))
        ));
    }
}
