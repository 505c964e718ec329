//! Fractional sibling ranks
//!
//! A rank is a base-36 fraction written without the leading `0.` and without
//! trailing zeros, so plain string comparison orders ranks by value. New keys
//! can always be generated after or between existing keys without renumbering
//! siblings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BASE: u32 = 36;

/// Number of leading digits `gen_next` increments
const NEXT_WIDTH: usize = 6;
/// Increment applied by `gen_next`, leaving room for insertions between
const NEXT_STEP: u64 = 8 * 36 * 36;

/// An ordering key among siblings in a content group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rank(String);

impl Rank {
    /// The smallest rank, used as the seed for the first sibling
    pub fn min() -> Self {
        Self("0".to_string())
    }

    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRank {
            rank: value.to_string(),
            reason: reason.to_string(),
        };

        if value.is_empty() {
            return Err(invalid("empty"));
        }
        if let Some(c) = value.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='z')) {
            return Err(invalid(&format!("unexpected character '{c}'")));
        }
        if value != "0" && value.ends_with('0') {
            return Err(invalid("trailing zero"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a rank strictly after this one.
    ///
    /// Adds a fixed step to the leading digits; when those are exhausted,
    /// falls back to the midpoint between this rank and one.
    pub fn gen_next(&self) -> Self {
        let digits = self.digits();
        let prefix = digits
            .iter()
            .copied()
            .chain(std::iter::repeat(0))
            .take(NEXT_WIDTH)
            .fold(0u64, |acc, d| acc * u64::from(BASE) + u64::from(d));

        let limit = u64::from(BASE).pow(NEXT_WIDTH as u32);
        if prefix + NEXT_STEP < limit {
            let mut next = vec![0u32; NEXT_WIDTH];
            let mut n = prefix + NEXT_STEP;
            for slot in next.iter_mut().rev() {
                *slot = (n % u64::from(BASE)) as u32;
                n /= u64::from(BASE);
            }
            Self::from_digits(next)
        } else {
            Self::from_digits(midpoint(&digits, None))
        }
    }

    /// Generate a rank strictly between two distinct ranks, given in either order
    pub fn between(a: &Rank, b: &Rank) -> Result<Self> {
        let (low, high) = match a.cmp(b) {
            std::cmp::Ordering::Less => (a, b),
            std::cmp::Ordering::Greater => (b, a),
            std::cmp::Ordering::Equal => {
                return Err(Error::InvalidRank {
                    rank: a.0.clone(),
                    reason: "no rank exists between equal ranks".to_string(),
                });
            }
        };
        Ok(Self::from_digits(midpoint(
            &low.digits(),
            Some(&high.digits()),
        )))
    }

    fn digits(&self) -> Vec<u32> {
        self.0
            .bytes()
            .map(|b| match b {
                b'0'..=b'9' => u32::from(b - b'0'),
                _ => u32::from(b - b'a') + 10,
            })
            .collect()
    }

    fn from_digits(mut digits: Vec<u32>) -> Self {
        while digits.len() > 1 && digits.last() == Some(&0) {
            digits.pop();
        }
        let text = digits
            .iter()
            .map(|&d| char::from(DIGITS[d as usize]))
            .collect();
        Self(text)
    }
}

/// Exact midpoint of two fractions, `high` of `None` meaning one.
///
/// Digits are summed with an integer digit in front, then halved by long
/// division. An odd final remainder adds one more digit.
fn midpoint(low: &[u32], high: Option<&[u32]>) -> Vec<u32> {
    let width = low.len().max(high.map_or(0, <[u32]>::len)) + 1;
    let padded = |digits: &[u32]| -> Vec<u32> {
        let mut out = Vec::with_capacity(width + 1);
        out.push(0);
        out.extend(digits.iter().copied());
        out.resize(width + 1, 0);
        out
    };

    let low = padded(low);
    let high = match high {
        Some(digits) => padded(digits),
        None => {
            let mut one = vec![0; width + 1];
            one[0] = 1;
            one
        }
    };

    let mut sum = vec![0u32; width + 1];
    let mut carry = 0;
    for i in (0..=width).rev() {
        let total = low[i] + high[i] + carry;
        sum[i] = total % BASE;
        carry = total / BASE;
    }

    let mut half = Vec::with_capacity(width + 2);
    let mut remainder = carry;
    for digit in sum {
        let value = remainder * BASE + digit;
        half.push(value / 2);
        remainder = value % 2;
    }
    if remainder != 0 {
        half.push(BASE / 2);
    }

    // Drop the integer digit; the midpoint of two fractions below one is below one
    half.remove(0);
    half
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Rank {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.0
    }
}

/// Hands out successive ranks after a starting point
#[derive(Debug, Clone)]
pub struct RankCursor {
    last: Rank,
}

impl RankCursor {
    /// Start after `last`, or after [`Rank::min`] for an empty sibling list
    pub fn after(last: Option<Rank>) -> Self {
        Self {
            last: last.unwrap_or_else(Rank::min),
        }
    }

    pub fn next_rank(&mut self) -> Rank {
        self.last = self.last.gen_next();
        self.last.clone()
    }
}
