// src/api.rs
use crate::allocation::{
    compute_allocation, default_ticker, ticker_info, CategoryTickers, TICKER_OPTIONS,
};
use crate::auth::with_owner;
use crate::db::PortfolioStore;
use crate::error::{handle_rejection, AppError};
use crate::extraction::{into_portfolio, parse_extraction, ExtractionInput, Extractor};
use crate::forecast::{forecast, forecast_gain};
use crate::market::{fetch_all, DateRange, Interval, MarketData};
use crate::models::{
    Category, Horizon, PortfolioItem, PortfolioResponse, PriceSeries, RiskLevel, SavedPortfolio,
};
use crate::performance::{compute_performance, snapshot_weights, Basis, PerformanceReport};
use chrono::Utc;
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_YEARS: u32 = 50;
const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub struct AppState {
    pub store: Arc<dyn PortfolioStore>,
    pub market: Arc<dyn MarketData>,
    pub extractor: Arc<dyn Extractor>,
    pub jwt_secret: Arc<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PortfolioQuery {
    risk: Option<String>,
    horizon: Option<String>,
    years: Option<String>,
    tickers: Option<String>,
    bonds: Option<String>,
    etfs: Option<String>,
    stocks: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    text: Option<String>,
    file_data: Option<String>,
    file_type: Option<String>,
    years: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    feedback: Option<String>,
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let secret = state.jwt_secret.clone();

    let portfolio = warp::path!("portfolio")
        .and(warp::get())
        .and(warp::query::<PortfolioQuery>())
        .and(with_state(state.clone()))
        .and_then(portfolio_handler);

    let analyze = warp::path!("portfolio" / "analyze")
        .and(warp::post())
        .and(with_owner(secret.clone()))
        .and(warp::body::content_length_limit(MAX_UPLOAD_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(analyze_handler);

    let saved = warp::path!("portfolio" / "saved")
        .and(warp::get())
        .and(with_owner(secret))
        .and(with_state(state.clone()))
        .and_then(saved_handler);

    let feedback = warp::path!("feedback")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(feedback_handler);

    let options = warp::path!("options")
        .and(warp::get())
        .map(options_handler);

    portfolio
        .or(analyze)
        .or(saved)
        .or(feedback)
        .or(options)
        .recover(handle_rejection)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `Number(years) || 1`, clamped to at least one year.
fn parse_years(raw: Option<&Value>) -> u32 {
    let years = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match years {
        Some(y) if y.is_finite() && y >= 1.0 => (y.trunc() as u32).min(MAX_YEARS),
        _ => 1,
    }
}

fn split_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl PortfolioQuery {
    fn overrides(&self) -> CategoryTickers {
        let mut overrides = match &self.tickers {
            Some(raw) => CategoryTickers::from_positional(&raw.split(',').collect::<Vec<_>>()),
            None => CategoryTickers::default(),
        };
        for (category, raw) in [
            (Category::Bonds, &self.bonds),
            (Category::Etfs, &self.etfs),
            (Category::Stocks, &self.stocks),
        ] {
            if let Some(raw) = raw {
                let list = split_tickers(raw);
                if !list.is_empty() {
                    overrides.set(category, list);
                }
            }
        }
        overrides
    }
}

async fn price_history(
    state: &AppState,
    items: &[PortfolioItem],
    years: u32,
) -> Result<HashMap<String, PriceSeries>, AppError> {
    let tickers: Vec<&str> = items.iter().map(|p| p.ticker.as_str()).collect();
    let range = DateRange::years_back(Utc::now(), years);
    fetch_all(
        state.market.as_ref(),
        &tickers,
        range,
        Interval::for_years(years),
    )
    .await
}

fn respond(portfolio: Vec<PortfolioItem>, report: PerformanceReport, years: u32) -> PortfolioResponse {
    if report.is_degenerate() {
        info!(
            "Gain not meaningful over {} point(s); reporting 0",
            report.performance.len()
        );
    }
    let projected = forecast(&portfolio, &report.performance, years);
    let projected_gain = forecast_gain(&projected);
    PortfolioResponse {
        gain: report.display_gain(),
        portfolio,
        performance: report.performance,
        forecast: Some(projected),
        forecast_gain: Some(projected_gain),
    }
}

async fn portfolio_handler(
    query: PortfolioQuery,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let risk = query.risk.as_deref().unwrap_or("mid").parse::<RiskLevel>()?;
    let horizon = query.horizon.as_deref().unwrap_or("mid").parse::<Horizon>()?;
    let years = parse_years(query.years.clone().map(Value::String).as_ref());

    let portfolio = compute_allocation(risk, horizon, Some(&query.overrides()));
    let series = price_history(&state, &portfolio, years).await?;
    let report = compute_performance(&portfolio, &series, Basis::Weights)?;
    info!(
        "Computed {:?}/{:?} portfolio over {} year(s): {} points",
        risk,
        horizon,
        years,
        report.performance.len()
    );
    Ok(warp::reply::json(&respond(portfolio, report, years)))
}

async fn analyze_handler(
    owner: Option<String>,
    body: AnalyzeRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let years = parse_years(body.years.as_ref());
    let input = ExtractionInput::from_request(body.text, body.file_data, body.file_type)?;

    let content = state.extractor.extract(&input).await?;
    let (items, basis) = into_portfolio(parse_extraction(&content)?)?;
    info!("Extracted {} holdings ({:?})", items.len(), basis);

    let series = price_history(&state, &items, years).await?;
    let report = compute_performance(&items, &series, basis)?;
    let portfolio = match basis {
        Basis::Shares => snapshot_weights(&items, &series),
        Basis::Weights => items,
    };
    let response = respond(portfolio, report, years);

    match owner {
        Some(owner_id) => {
            let record = SavedPortfolio {
                owner_id,
                created_at: Utc::now(),
                portfolio: response.portfolio.clone(),
                performance: response.performance.clone(),
                gain: response.gain,
            };
            if let Err(e) = state.store.save_portfolio(&record).await {
                error!("Failed to save portfolio for {}: {}", record.owner_id, e);
                return Err(AppError::upstream(e).into());
            }
            info!("Portfolio saved for {}.", record.owner_id);
        }
        None => info!("Anonymous analysis; portfolio not saved."),
    }

    Ok(warp::reply::json(&response))
}

async fn saved_handler(owner: Option<String>, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let owner_id = owner.ok_or(AppError::Unauthorized)?;
    match state.store.latest_portfolio(&owner_id).await {
        Ok(Some(saved)) => {
            info!("Portfolio retrieved for {}.", owner_id);
            Ok(warp::reply::json(&PortfolioResponse::from(saved)))
        }
        Ok(None) => Err(AppError::NotFound("No saved portfolio".to_string()).into()),
        Err(e) => {
            error!("Failed to retrieve portfolio: {}", e);
            Err(AppError::upstream(e).into())
        }
    }
}

async fn feedback_handler(
    body: FeedbackRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let feedback = body
        .feedback
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Feedback is required".to_string()))?;

    match state.store.add_feedback(&feedback).await {
        Ok(id) => {
            info!("Feedback {} stored.", id);
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "message": "Feedback submitted", "id": id })),
                StatusCode::CREATED,
            ))
        }
        Err(e) => {
            error!("Failed to store feedback: {}", e);
            Err(AppError::upstream(e).into())
        }
    }
}

fn options_handler() -> impl Reply {
    let categories: Vec<Value> = Category::ALL
        .iter()
        .map(|category| {
            let options: Vec<_> = TICKER_OPTIONS
                .get(*category)
                .iter()
                .map(|t| ticker_info(*t))
                .collect();
            json!({
                "category": category,
                "default": default_ticker(*category),
                "options": options,
            })
        })
        .collect();
    warp::reply::json(&categories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_follow_number_or_one() {
        assert_eq!(parse_years(None), 1);
        assert_eq!(parse_years(Some(&json!("3"))), 3);
        assert_eq!(parse_years(Some(&json!(5))), 5);
        assert_eq!(parse_years(Some(&json!("abc"))), 1);
        assert_eq!(parse_years(Some(&json!(0))), 1);
        assert_eq!(parse_years(Some(&json!(2.7))), 2);
        assert_eq!(parse_years(Some(&json!(10_000))), MAX_YEARS);
    }

    #[test]
    fn query_overrides_combine_positional_and_named() {
        let query = PortfolioQuery {
            tickers: Some("AGG,SPY,MSFT".into()),
            stocks: Some("AAPL, GOOGL".into()),
            ..Default::default()
        };
        let overrides = query.overrides();
        assert_eq!(overrides.bonds, Some(vec!["AGG".to_string()]));
        assert_eq!(overrides.etfs, Some(vec!["SPY".to_string()]));
        assert_eq!(
            overrides.stocks,
            Some(vec!["AAPL".to_string(), "GOOGL".to_string()])
        );
    }
}
