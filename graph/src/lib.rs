//! Price-series model and color derivation for the dashboard chart.
//!
//! This crate is UI-framework agnostic so rendering code can consume it
//! directly: the charting widget takes the ordered points of one ticker plus
//! one color per line segment, keyed by the segment's starting point.

use messages::{GraphPoint, GraphUpdate, TradeState};
use serde::{Deserialize, Serialize};

/// Chart segment color for a trade state.
#[must_use]
pub fn state_color(state: TradeState) -> &'static str {
    match state {
        TradeState::Analyzing => "rgb(0,0,255)",
        TradeState::Bought => "rgb(0,255,0)",
        TradeState::Shorting => "rgb(255,0,0)",
        TradeState::Noop => "rgba(0,0,0,0.2)",
    }
}

/// Ordered price points for one ticker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<GraphPoint>,
}

impl PriceSeries {
    #[must_use]
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            points: Vec::new(),
        }
    }

    /// Install a full `graph_sync` snapshot, replacing any prior points.
    pub fn replace(&mut self, points: Vec<GraphPoint>) {
        self.points = points;
    }

    /// Append a live update if it belongs to this ticker.
    ///
    /// Returns `true` when the point was appended.
    pub fn apply_update(&mut self, update: &GraphUpdate) -> bool {
        if update.ticker != self.ticker {
            return false;
        }
        self.points.push(update.point());
        true
    }

    /// One color per line segment, keyed by the segment's starting point.
    ///
    /// A series of N points yields N-1 segment colors; fewer than two points
    /// draw no segments at all.
    #[must_use]
    pub fn segment_colors(&self) -> Vec<&'static str> {
        if self.points.len() < 2 {
            return Vec::new();
        }
        self.points[..self.points.len() - 1]
            .iter()
            .map(|point| state_color(point.state))
            .collect()
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
