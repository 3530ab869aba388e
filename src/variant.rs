//! A/B test variant tags.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A/B bucket attached to a flow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    /// Assign a variant with even odds
    pub fn random() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }

    /// Assign a variant using the given generator
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Variant::A
        } else {
            Variant::B
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Variant::A),
            "B" | "b" => Ok(Variant::B),
            other => Err(format!("unknown variant: {other:?}")),
        }
    }
}
