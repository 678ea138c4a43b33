// src/performance.rs
//! Weighted portfolio value series built from per-ticker closing prices.
use crate::error::AppError;
use crate::models::{PerformanceEntry, PortfolioItem, PriceSeries};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How an item's contribution to the portfolio value is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    /// `weight` is a fraction of the portfolio; the result is a relative index.
    Weights,
    /// `shares` is a share count; the result is an absolute value.
    Shares,
}

impl Basis {
    fn multiplier(&self, item: &PortfolioItem) -> f64 {
        match self {
            Basis::Weights => item.weight,
            Basis::Shares => item.shares.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub performance: Vec<PerformanceEntry>,
    /// Raw percentage; NaN for fewer than two points, infinite for a zero start.
    pub gain: f64,
}

impl PerformanceReport {
    pub fn is_degenerate(&self) -> bool {
        self.performance.len() < 2 || self.performance[0].value == 0.0 || !self.gain.is_finite()
    }

    /// Gain suitable for display; 0.0 when it carries no meaning.
    pub fn display_gain(&self) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            self.gain
        }
    }
}

/// Closing prices keyed by UTC day. A later point on the same day wins.
fn by_day(series: &PriceSeries) -> BTreeMap<NaiveDate, f64> {
    series.iter().map(|p| (p.day(), p.close)).collect()
}

pub fn has_data(series_by_ticker: &HashMap<String, PriceSeries>) -> bool {
    series_by_ticker.values().any(|s| !s.is_empty())
}

fn distinct_tickers(items: &[PortfolioItem]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .map(|p| p.ticker.as_str())
        .filter(|t| seen.insert(*t))
        .collect()
}

/// Days present in every ticker's series, ascending. Falls back to the days of
/// the first ticker that has any when the intersection is empty.
pub fn aligned_days(
    tickers: &[&str],
    prices: &HashMap<&str, BTreeMap<NaiveDate, f64>>,
) -> Vec<NaiveDate> {
    let days_of = |t: &&str| prices.get(*t).filter(|m| !m.is_empty());
    let fallback: Vec<NaiveDate> = match tickers.iter().find_map(days_of) {
        Some(days) => days.keys().copied().collect(),
        None => return Vec::new(),
    };

    let mut common = fallback.clone();
    for ticker in tickers {
        common.retain(|d| prices.get(ticker).map_or(false, |m| m.contains_key(d)));
    }
    if common.is_empty() {
        common = fallback;
    }
    common
}

pub fn gain(performance: &[PerformanceEntry]) -> f64 {
    match performance {
        [first, .., last] => (last.value / first.value - 1.0) * 100.0,
        _ => f64::NAN,
    }
}

pub fn compute_performance(
    items: &[PortfolioItem],
    series_by_ticker: &HashMap<String, PriceSeries>,
    basis: Basis,
) -> Result<PerformanceReport, AppError> {
    if !has_data(series_by_ticker) {
        return Err(AppError::NoData);
    }

    let tickers = distinct_tickers(items);
    let prices: HashMap<&str, BTreeMap<NaiveDate, f64>> = tickers
        .iter()
        .filter_map(|t| series_by_ticker.get(*t).map(|s| (*t, by_day(s))))
        .collect();

    let days = aligned_days(&tickers, &prices);
    if days.is_empty() {
        return Err(AppError::NoData);
    }

    let performance: Vec<PerformanceEntry> = days
        .iter()
        .map(|day| {
            let value: f64 = items
                .iter()
                .map(|item| {
                    let close = prices
                        .get(item.ticker.as_str())
                        .and_then(|m| m.get(day))
                        .copied()
                        .unwrap_or(0.0);
                    close * basis.multiplier(item)
                })
                .sum();
            PerformanceEntry {
                date: day.format("%Y-%m-%d").to_string(),
                value,
            }
        })
        .collect();

    let gain = gain(&performance);
    Ok(PerformanceReport { performance, gain })
}

/// Latest close per ticker, by date.
fn latest_close(series: Option<&PriceSeries>) -> Option<f64> {
    series?.iter().max_by_key(|p| p.date).map(|p| p.close)
}

/// Display weights for a shares-based portfolio: each item's share of the
/// current value at the latest known price. Independent of the time series.
pub fn snapshot_weights(
    items: &[PortfolioItem],
    series_by_ticker: &HashMap<String, PriceSeries>,
) -> Vec<PortfolioItem> {
    let mut priced: Vec<PortfolioItem> = items
        .iter()
        .map(|item| {
            let mut item = item.clone();
            item.price = latest_close(series_by_ticker.get(&item.ticker)).or(item.price);
            item
        })
        .collect();

    let current = |p: &PortfolioItem| p.price.unwrap_or(0.0) * p.shares.unwrap_or(0.0);
    let total: f64 = priced.iter().map(current).sum();
    for item in priced.iter_mut() {
        item.weight = if total > 0.0 { current(&*item) / total } else { 0.0 };
    }
    priced
}
