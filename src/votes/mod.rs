//! Vote reconciliation.
//!
//! A voter holds at most one choice per coupon. Given the choice the client
//! last recorded and the button just pressed, compute how the stored tally moves.

use serde::{Deserialize, Serialize};

/// Direction of a vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(VoteType::Up),
            "down" => Some(VoteType::Down),
            _ => None,
        }
    }
}

/// Signed change to apply to a coupon's `{up, down}` counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyDelta {
    pub up: i64,
    pub down: i64,
}

impl TallyDelta {
    pub const fn new(up: i64, down: i64) -> Self {
        Self { up, down }
    }
}

/// Compute the tally change for a vote.
///
/// Pressing the same direction twice retracts the vote; pressing the other
/// direction switches it.
pub fn reconcile(previous: Option<VoteType>, new: VoteType) -> TallyDelta {
    match (previous, new) {
        (None, VoteType::Up) => TallyDelta::new(1, 0),
        (None, VoteType::Down) => TallyDelta::new(0, 1),
        (Some(VoteType::Up), VoteType::Up) => TallyDelta::new(-1, 0),
        (Some(VoteType::Down), VoteType::Down) => TallyDelta::new(0, -1),
        (Some(VoteType::Up), VoteType::Down) => TallyDelta::new(-1, 1),
        (Some(VoteType::Down), VoteType::Up) => TallyDelta::new(1, -1),
    }
}

/// The voter's choice once `new` has been applied on top of `previous`.
pub fn resulting_choice(previous: Option<VoteType>, new: VoteType) -> Option<VoteType> {
    if previous == Some(new) {
        None
    } else {
        Some(new)
    }
}
