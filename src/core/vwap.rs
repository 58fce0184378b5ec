//! Depth-weighted average price over the top levels of one book side
//!
//! The monitor and the executor both price a coin from the first K levels
//! of a snapshot instead of the single best quote, so one thin level does
//! not swing the premium.

use serde::{Deserialize, Serialize};

use crate::adapters::types::{BookSide, Orderbook};

/// Default number of levels averaged per side
pub const DEFAULT_DEPTH: usize = 5;

/// Result of averaging one side of a book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct DepthAverage {
    /// Σ(price·qty) / Σ(qty) over the levels used
    pub average_price: f64,
    /// Σ(qty) over the levels used
    pub total_quantity: f64,
    pub levels_used: usize,
}

/// Average the best `depth` levels of `side`
///
/// Levels are ordered best-first (asks ascending, bids descending) before
/// truncation, so unsorted snapshots are fine. Levels with a non-positive
/// quantity or a non-finite price are skipped but still count toward
/// `depth`.
///
/// # Returns
/// * `None` if the side holds no usable quantity; callers treat this as a
///   failed sample, never as a zero price
#[must_use]
pub fn calculate_depth_average(
    orderbook: &Orderbook,
    side: BookSide,
    depth: usize,
) -> Option<DepthAverage> {
    let mut weighted_sum = 0.0;
    let mut total_quantity = 0.0;
    let mut levels_used = 0;

    for level in orderbook
        .sorted_levels(side)
        .into_iter()
        .take(depth)
        .filter(|l| l.price.is_finite() && l.quantity.is_finite() && l.quantity > 0.0)
    {
        weighted_sum += level.price * level.quantity;
        total_quantity += level.quantity;
        levels_used += 1;
    }

    if total_quantity <= 0.0 {
        return None;
    }

    Some(DepthAverage {
        average_price: weighted_sum / total_quantity,
        total_quantity,
        levels_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::types::OrderbookLevel;

    fn make_orderbook(asks: Vec<(f64, f64)>, bids: Vec<(f64, f64)>) -> Orderbook {
        let mut ob = Orderbook::new();
        ob.asks = asks
            .into_iter()
            .map(|(p, q)| OrderbookLevel::new(p, q))
            .collect();
        ob.bids = bids
            .into_iter()
            .map(|(p, q)| OrderbookLevel::new(p, q))
            .collect();
        ob
    }

    #[test]
    fn test_weighted_average_of_asks() {
        let ob = make_orderbook(vec![(100.0, 1.0), (101.0, 3.0)], vec![]);
        let avg = calculate_depth_average(&ob, BookSide::Ask, 5).unwrap();
        assert!((avg.average_price - 100.75).abs() < 1e-9);
        assert_eq!(avg.total_quantity, 4.0);
        assert_eq!(avg.levels_used, 2);
    }

    #[test]
    fn test_unsorted_asks_use_cheapest_levels() {
        let ob = make_orderbook(vec![(105.0, 1.0), (100.0, 1.0), (101.0, 1.0)], vec![]);
        let avg = calculate_depth_average(&ob, BookSide::Ask, 2).unwrap();
        assert!((avg.average_price - 100.5).abs() < 1e-9);
        assert_eq!(avg.levels_used, 2);
    }

    #[test]
    fn test_unsorted_bids_use_highest_levels() {
        let ob = make_orderbook(vec![], vec![(95.0, 1.0), (99.0, 2.0), (97.0, 5.0)]);
        let avg = calculate_depth_average(&ob, BookSide::Bid, 1).unwrap();
        assert_eq!(avg.average_price, 99.0);
        assert_eq!(avg.total_quantity, 2.0);
    }

    #[test]
    fn test_empty_side_returns_none() {
        let ob = make_orderbook(vec![(100.0, 1.0)], vec![]);
        assert!(calculate_depth_average(&ob, BookSide::Bid, 5).is_none());
    }

    #[test]
    fn test_zero_quantity_levels_return_none() {
        let ob = make_orderbook(vec![(100.0, 0.0), (101.0, 0.0)], vec![]);
        assert!(calculate_depth_average(&ob, BookSide::Ask, 5).is_none());
    }

    #[test]
    fn test_empty_level_inside_depth_does_not_pull_deeper_level() {
        let ob = make_orderbook(vec![(100.0, 1.0), (101.0, 0.0), (150.0, 10.0)], vec![]);
        let avg = calculate_depth_average(&ob, BookSide::Ask, 2).unwrap();
        assert_eq!(avg.average_price, 100.0);
        assert_eq!(avg.total_quantity, 1.0);
        assert_eq!(avg.levels_used, 1);
    }

    #[test]
    fn test_zero_depth_returns_none() {
        let ob = make_orderbook(vec![(100.0, 1.0)], vec![]);
        assert!(calculate_depth_average(&ob, BookSide::Ask, 0).is_none());
    }

    #[test]
    fn test_average_within_used_price_range() {
        let books = [
            vec![(10.0, 0.1), (11.0, 50.0), (12.5, 3.0), (13.0, 0.7)],
            vec![(99_000_000.0, 0.002), (99_100_000.0, 1.5)],
            vec![(0.51, 12_000.0), (0.5, 1.0), (0.52, 7.0), (0.53, 9.0), (0.6, 4.0), (0.7, 1.0)],
        ];
        for asks in books {
            let ob = make_orderbook(asks.clone(), vec![]);
            let avg = calculate_depth_average(&ob, BookSide::Ask, DEFAULT_DEPTH).unwrap();
            let used: Vec<f64> = ob
                .sorted_levels(BookSide::Ask)
                .iter()
                .take(DEFAULT_DEPTH)
                .map(|l| l.price)
                .collect();
            let min = used.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = used.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(avg.average_price >= min && avg.average_price <= max);
            assert!(avg.average_price.is_finite());
        }
    }
}
