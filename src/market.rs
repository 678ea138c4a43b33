// src/market.rs
use crate::error::AppError;
use crate::models::{PricePoint, PriceSeries};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::try_join_all;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Weekly,
}

impl Interval {
    /// Long look-backs are fetched weekly.
    pub fn for_years(years: u32) -> Self {
        if years >= 5 {
            Interval::Weekly
        } else {
            Interval::Daily
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn years_back(end: DateTime<Utc>, years: u32) -> Self {
        DateRange {
            start: end - Duration::days(365 * i64::from(years)),
            end,
        }
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.start.date_naive() && day <= self.end.date_naive()
    }
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Closing prices for `symbol` inside `range`, ascending. An unknown symbol
    /// yields an empty series.
    async fn history(
        &self,
        symbol: &str,
        range: DateRange,
        interval: Interval,
    ) -> Result<PriceSeries, AppError>;
}

/// One request per distinct ticker, issued concurrently and awaited jointly.
pub async fn fetch_all(
    provider: &dyn MarketData,
    tickers: &[&str],
    range: DateRange,
    interval: Interval,
) -> Result<HashMap<String, PriceSeries>, AppError> {
    let mut seen = BTreeSet::new();
    let distinct: Vec<&str> = tickers.iter().copied().filter(|t| seen.insert(*t)).collect();

    let fetches = distinct.iter().map(|symbol| async move {
        let series = provider.history(symbol, range, interval).await?;
        debug!("Fetched {} points for {}", series.len(), symbol);
        Ok::<_, AppError>((symbol.to_string(), series))
    });
    let series = try_join_all(fetches).await?;
    Ok(series.into_iter().collect())
}

#[derive(Deserialize)]
struct TimeSeriesData {
    #[serde(rename = "4. close")]
    close: String,
}

#[derive(Deserialize)]
struct AlphaVantageResponse {
    #[serde(
        default,
        rename = "Time Series (Daily)",
        alias = "Weekly Time Series"
    )]
    time_series: HashMap<String, TimeSeriesData>,
    #[serde(default, rename = "Error Message")]
    error_message: Option<String>,
    #[serde(default, rename = "Note")]
    note: Option<String>,
    /// Premium-only notices, e.g. a full daily history on a free key.
    #[serde(default, rename = "Information")]
    information: Option<String>,
}

pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        AlphaVantageClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn function(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "TIME_SERIES_DAILY",
            Interval::Weekly => "TIME_SERIES_WEEKLY",
        }
    }

    /// Daily `compact` covers the latest 100 trading days; weekly series are
    /// always complete and take no size.
    fn output_size(range: DateRange, interval: Interval) -> Option<&'static str> {
        match interval {
            Interval::Weekly => None,
            Interval::Daily if range.end - range.start <= Duration::days(COMPACT_DAYS) => {
                Some("compact")
            }
            Interval::Daily => Some("full"),
        }
    }
}

/// Calendar days safely inside a 100 trading day window.
const COMPACT_DAYS: i64 = 140;

fn parse_points(
    time_series: HashMap<String, TimeSeriesData>,
    range: DateRange,
    symbol: &str,
) -> PriceSeries {
    let mut points: PriceSeries = time_series
        .into_iter()
        .filter_map(|(date_str, data)| {
            let day = match NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                Ok(day) => day,
                Err(_) => {
                    warn!("Skipping {} point with bad date {:?}", symbol, date_str);
                    return None;
                }
            };
            if !range.contains_day(day) {
                return None;
            }
            let close = match data.close.parse::<f64>() {
                Ok(close) => close,
                Err(_) => {
                    warn!("Skipping {} point with bad close {:?}", symbol, data.close);
                    return None;
                }
            };
            let date = day.and_hms_opt(0, 0, 0)?.and_utc();
            Some(PricePoint::new(date, close))
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

#[async_trait]
impl MarketData for AlphaVantageClient {
    async fn history(
        &self,
        symbol: &str,
        range: DateRange,
        interval: Interval,
    ) -> Result<PriceSeries, AppError> {
        let url = format!("{}/query", self.base_url);
        let mut params = vec![
            ("function", Self::function(interval)),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];
        if let Some(size) = Self::output_size(range, interval) {
            params.push(("outputsize", size));
        }
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(AppError::upstream)?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Failed to fetch data for {}: HTTP {}",
                symbol,
                response.status()
            )));
        }

        let body: AlphaVantageResponse = response.json().await.map_err(AppError::upstream)?;
        if let Some(note) = body.note {
            return Err(AppError::Upstream(format!("Market data throttled: {}", note)));
        }
        if let Some(message) = body.error_message {
            info!("No market data for {}: {}", symbol, message);
        }
        if let Some(notice) = body.information {
            warn!("No market data for {}: {}", symbol, notice);
            return Ok(Vec::new());
        }

        Ok(parse_points(body.time_series, range, symbol))
    }
}
