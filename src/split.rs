//! Randomized train/val/test partitioning

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::str::FromStr;

use crate::error::Error;
use crate::models::{PerSplit, Split};

/// Integer split percentages summing to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitRatios {
    train: u32,
    val: u32,
    test: u32,
}

impl SplitRatios {
    pub fn new(train: u32, val: u32, test: u32) -> Result<Self, Error> {
        let total = train.checked_add(val).and_then(|sum| sum.checked_add(test));
        if total != Some(100) {
            return Err(Error::Config(format!(
                "split percentages must sum to 100, got {}+{}+{}",
                train, val, test
            )));
        }
        Ok(Self { train, val, test })
    }

    pub fn percent(&self, split: Split) -> u32 {
        match split {
            Split::Train => self.train,
            Split::Val => self.val,
            Split::Test => self.test,
        }
    }

    /// Number of items each split receives out of `n`.
    ///
    /// Train and val are floored; test takes the remainder.
    pub fn counts(&self, n: usize) -> PerSplit<usize> {
        let train = n * self.train as usize / 100;
        let val = n * self.val as usize / 100;
        PerSplit::new(train, val, n - train - val)
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 85,
            val: 5,
            test: 10,
        }
    }
}

impl FromStr for SplitRatios {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("invalid split '{}': {}", s, e)))?;

        match parts.as_slice() {
            [train, val, test] => Self::new(*train, *val, *test),
            _ => Err(Error::Config(format!(
                "split must be TRAIN,VAL,TEST percentages, got '{}'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for SplitRatios {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.train, self.val, self.test)
    }
}

/// Shuffle `items` and cut them into train, val and test in that order.
pub fn partition<T, R: Rng + ?Sized>(
    mut items: Vec<T>,
    ratios: &SplitRatios,
    rng: &mut R,
) -> PerSplit<Vec<T>> {
    items.shuffle(rng);

    let counts = ratios.counts(items.len());
    let test = items.split_off(counts.train + counts.val);
    let val = items.split_off(counts.train);
    PerSplit::new(items, val, test)
}
