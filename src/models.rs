// src/models.rs
use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Mid,
    High,
}

impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "mid" => Ok(RiskLevel::Mid),
            "high" => Ok(RiskLevel::High),
            other => Err(AppError::InvalidInput(format!(
                "unknown risk level: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Short,
    Mid,
    Long,
}

impl FromStr for Horizon {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Horizon::Short),
            "mid" => Ok(Horizon::Mid),
            "long" => Ok(Horizon::Long),
            other => Err(AppError::InvalidInput(format!("unknown horizon: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bonds,
    Etfs,
    Stocks,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Bonds, Category::Etfs, Category::Stocks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bonds => "bonds",
            Category::Etfs => "etfs",
            Category::Stocks => "stocks",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub category: Category,
    pub ticker: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl PortfolioItem {
    pub fn weighted(category: Category, ticker: impl Into<String>, weight: f64) -> Self {
        PortfolioItem {
            category,
            ticker: ticker.into(),
            weight,
            shares: None,
            price: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub date: String,
    pub value: f64,
}

/// One closing price as delivered by a market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: DateTime<Utc>, close: f64) -> Self {
        PricePoint { date, close }
    }

    /// Calendar day in UTC; the key every series is aligned on.
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

pub type PriceSeries = Vec<PricePoint>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPortfolio {
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub portfolio: Vec<PortfolioItem>,
    pub performance: Vec<PerformanceEntry>,
    pub gain: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub portfolio: Vec<PortfolioItem>,
    pub performance: Vec<PerformanceEntry>,
    pub gain: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<PerformanceEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_gain: Option<f64>,
}

impl From<SavedPortfolio> for PortfolioResponse {
    fn from(saved: SavedPortfolio) -> Self {
        PortfolioResponse {
            portfolio: saved.portfolio,
            performance: saved.performance,
            gain: saved.gain,
            forecast: None,
            forecast_gain: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerInfo {
    pub ticker: &'static str,
    pub description: &'static str,
    pub expected_return: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_enums_case_insensitively() {
        assert_eq!("LOW".parse::<RiskLevel>().unwrap(), RiskLevel::Low);
        assert_eq!(" long ".parse::<Horizon>().unwrap(), Horizon::Long);
        assert!(matches!(
            "extreme".parse::<RiskLevel>(),
            Err(AppError::InvalidInput(_))
        ));
        assert!("forever".parse::<Horizon>().is_err());
    }

    #[test]
    fn item_serializes_without_empty_options() {
        let item = PortfolioItem::weighted(Category::Bonds, "BND", 0.4);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "category": "bonds", "ticker": "BND", "weight": 0.4 })
        );
    }

    #[test]
    fn price_point_day_is_utc() {
        let p = PricePoint::new(Utc.with_ymd_and_hms(2020, 1, 2, 23, 59, 0).unwrap(), 1.0);
        assert_eq!(p.day().to_string(), "2020-01-02");
    }
}
