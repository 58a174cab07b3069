// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Customer scores.
//!
//! A thin wrapper over [`Decimal`] so scores compare, hash and print exactly
//! and can sit directly inside an order-key without any float weirdness.

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ParseScoreError;

/// A signed, exact decimal score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(Decimal);

impl Score {
    pub const ZERO: Score = Score(Decimal::ZERO);

    /// A whole-number score.
    pub fn from_int(points: i64) -> Score {
        return Score(Decimal::from(points));
    }

    pub const fn value(self) -> Decimal {
        return self.0;
    }

    /// Scores strictly above zero take part in the ranking.
    pub fn is_positive(self) -> bool {
        return self.0 > Decimal::ZERO;
    }

    pub fn checked_add(self, other: Score) -> Option<Score> {
        return self.0.checked_add(other.0).map(Score);
    }

    pub fn abs(self) -> Score {
        return Score(self.0.abs());
    }
}

impl Neg for Score {
    type Output = Score;

    fn neg(self) -> Score {
        return Score(-self.0);
    }
}

impl From<Decimal> for Score {
    fn from(value: Decimal) -> Score {
        return Score(value);
    }
}

impl From<i32> for Score {
    fn from(points: i32) -> Score {
        return Score::from_int(points as i64);
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1.50 and 1.5 are the same score; print the shortest form.
        return fmt::Display::fmt(&self.0.normalize(), f);
    }
}

impl FromStr for Score {
    type Err = ParseScoreError;

    fn from_str(input: &str) -> Result<Score, ParseScoreError> {
        let value = Decimal::from_str(input.trim()).map_err(|err| ParseScoreError {
            input: input.to_string(),
            reason: err.to_string(),
        })?;
        return Ok(Score(value));
    }
}
