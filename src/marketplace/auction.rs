// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Auctions

use serde::{Deserialize, Serialize};

use crate::adapter::{from_decimal, MINIMAL_BID};

/// Who placed a bid: a tracked campaign (by slot in the serving system) or
/// one of the anonymous competitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bidder {
    Tracked(usize),
    Untracked(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bid {
    pub bidder: Bidder,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuctionWinner {
    pub bid: Bid,
    pub payment: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionType {
    /// Highest bid wins and pays its own bid.
    #[default]
    FirstPrice,
}

impl AuctionType {
    /// Clear one auction. No winner when there are no bids or the best bid is
    /// below the minimal bid. Ties go to the earliest bid.
    pub fn run(&self, bids: &[Bid]) -> Option<AuctionWinner> {
        match self {
            Self::FirstPrice => {
                let best = bids
                    .iter()
                    .fold(None::<&Bid>, |best, bid| match best {
                        Some(b) if b.amount >= bid.amount => Some(b),
                        _ => Some(bid),
                    })?;
                if best.amount < from_decimal(MINIMAL_BID) {
                    return None;
                }
                Some(AuctionWinner { bid: *best, payment: best.amount })
            }
        }
    }
}
