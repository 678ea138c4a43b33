// src/db.rs
use crate::models::{PerformanceEntry, PortfolioItem, SavedPortfolio};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use scylla::{frame::response::result::Row, query::Query, Session, SessionBuilder};

pub type DbResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Replaces the owner's snapshot.
    async fn save_portfolio(&self, record: &SavedPortfolio) -> DbResult<()>;

    /// Most recent snapshot for the owner, if any.
    async fn latest_portfolio(&self, owner_id: &str) -> DbResult<Option<SavedPortfolio>>;

    /// Stores a feedback message and returns its id.
    async fn add_feedback(&self, feedback: &str) -> DbResult<String>;
}

pub async fn init(node: &str) -> Result<Session, Box<dyn std::error::Error + Send + Sync>> {
    let session = SessionBuilder::new().known_node(node).build().await?;

    session.query("CREATE KEYSPACE IF NOT EXISTS portfolio_advisor WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}", &[]).await?;
    session.query("CREATE TABLE IF NOT EXISTS portfolio_advisor.portfolios (owner_id TEXT PRIMARY KEY, created_at BIGINT, portfolio TEXT, performance TEXT, gain DOUBLE)", &[]).await?;
    session.query("CREATE TABLE IF NOT EXISTS portfolio_advisor.feedback (id TEXT PRIMARY KEY, feedback TEXT, created_at BIGINT)", &[]).await?;

    info!("Successfully connected to ScyllaDB at {}.", node);
    Ok(session)
}

pub struct ScyllaStore {
    session: Session,
}

impl ScyllaStore {
    pub fn new(session: Session) -> Self {
        ScyllaStore { session }
    }
}

fn text_column(row: &Row, idx: usize) -> Option<&str> {
    row.columns.get(idx)?.as_ref()?.as_text().map(String::as_str)
}

fn decode_portfolio(owner_id: &str, row: &Row) -> DbResult<SavedPortfolio> {
    let created_millis = row
        .columns
        .get(0)
        .and_then(|c| c.as_ref())
        .and_then(|c| c.as_bigint())
        .ok_or("missing created_at")?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_millis)
        .ok_or("created_at out of range")?;
    let portfolio: Vec<PortfolioItem> =
        serde_json::from_str(text_column(row, 1).ok_or("missing portfolio")?)?;
    let performance: Vec<PerformanceEntry> =
        serde_json::from_str(text_column(row, 2).ok_or("missing performance")?)?;
    let gain = row
        .columns
        .get(3)
        .and_then(|c| c.as_ref())
        .and_then(|c| c.as_double())
        .unwrap_or(0.0);

    Ok(SavedPortfolio {
        owner_id: owner_id.to_string(),
        created_at,
        portfolio,
        performance,
        gain,
    })
}

#[async_trait]
impl PortfolioStore for ScyllaStore {
    async fn save_portfolio(&self, record: &SavedPortfolio) -> DbResult<()> {
        let portfolio_json = serde_json::to_string(&record.portfolio)?;
        let performance_json = serde_json::to_string(&record.performance)?;
        let query = Query::new("INSERT INTO portfolio_advisor.portfolios (owner_id, created_at, portfolio, performance, gain) VALUES (?, ?, ?, ?, ?)");
        self.session
            .query(
                query,
                (
                    record.owner_id.as_str(),
                    record.created_at.timestamp_millis(),
                    portfolio_json,
                    performance_json,
                    record.gain,
                ),
            )
            .await?;
        Ok(())
    }

    async fn latest_portfolio(&self, owner_id: &str) -> DbResult<Option<SavedPortfolio>> {
        let query = Query::new("SELECT created_at, portfolio, performance, gain FROM portfolio_advisor.portfolios WHERE owner_id = ?");
        let rows = self.session.query(query, (owner_id,)).await?.rows;

        let mut latest: Option<SavedPortfolio> = None;
        for row in rows.unwrap_or_default() {
            match decode_portfolio(owner_id, &row) {
                Ok(saved) => {
                    if latest.as_ref().map_or(true, |l| saved.created_at > l.created_at) {
                        latest = Some(saved);
                    }
                }
                Err(e) => error!("Skipping unreadable portfolio row for {}: {}", owner_id, e),
            }
        }
        Ok(latest)
    }

    async fn add_feedback(&self, feedback: &str) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let query =
            Query::new("INSERT INTO portfolio_advisor.feedback (id, feedback, created_at) VALUES (?, ?, ?)");
        self.session
            .query(query, (id.as_str(), feedback, Utc::now().timestamp_millis()))
            .await?;
        Ok(id)
    }
}
