// src/forecast.rs
//! Fixed expected-return projection from the last observed portfolio value.
use crate::allocation::{ticker_info, TICKER_OPTIONS};
use crate::models::{Category, PerformanceEntry, PortfolioItem};

/// Assumed annual return for a known ticker, 0 otherwise.
pub fn expected_return(ticker: &str) -> f64 {
    Category::ALL
        .iter()
        .flat_map(|c| TICKER_OPTIONS.get(*c).iter())
        .find(|t| **t == ticker)
        .map(|t| ticker_info(*t).expected_return)
        .unwrap_or(0.0)
}

pub fn portfolio_expected_return(portfolio: &[PortfolioItem]) -> f64 {
    portfolio
        .iter()
        .map(|p| p.weight * expected_return(&p.ticker))
        .sum()
}

/// `years + 1` yearly points labelled "0".."years". Empty without history.
pub fn forecast(
    portfolio: &[PortfolioItem],
    performance: &[PerformanceEntry],
    years: u32,
) -> Vec<PerformanceEntry> {
    let start = match performance.last() {
        Some(last) => last.value,
        None => return Vec::new(),
    };
    let rate = portfolio_expected_return(portfolio);
    (0..=years)
        .map(|i| PerformanceEntry {
            date: i.to_string(),
            value: start * (1.0 + rate).powi(i as i32),
        })
        .collect()
}

pub fn forecast_gain(forecast: &[PerformanceEntry]) -> f64 {
    match (forecast.first(), forecast.last()) {
        (Some(first), Some(last)) if first.value != 0.0 => (last.value / first.value - 1.0) * 100.0,
        _ => 0.0,
    }
}
