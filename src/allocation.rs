// src/allocation.rs
//! Target weights from a risk level and an investment horizon.
use crate::models::{Category, Horizon, PortfolioItem, RiskLevel, TickerInfo};

/// Per-category value, one field per category so lookups stay exhaustive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerCategory<T> {
    pub bonds: T,
    pub etfs: T,
    pub stocks: T,
}

impl<T> PerCategory<T> {
    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::Bonds => &self.bonds,
            Category::Etfs => &self.etfs,
            Category::Stocks => &self.stocks,
        }
    }
}

pub fn base_allocation(risk: RiskLevel) -> PerCategory<f64> {
    match risk {
        RiskLevel::Low => PerCategory { bonds: 0.6, etfs: 0.3, stocks: 0.1 },
        RiskLevel::Mid => PerCategory { bonds: 0.4, etfs: 0.4, stocks: 0.2 },
        RiskLevel::High => PerCategory { bonds: 0.2, etfs: 0.4, stocks: 0.4 },
    }
}

/// Bonds and stocks deltas; etfs never move.
pub fn horizon_adjustment(horizon: Horizon) -> PerCategory<f64> {
    match horizon {
        Horizon::Short => PerCategory { bonds: 0.1, etfs: 0.0, stocks: -0.1 },
        Horizon::Mid => PerCategory { bonds: 0.0, etfs: 0.0, stocks: 0.0 },
        Horizon::Long => PerCategory { bonds: -0.1, etfs: 0.0, stocks: 0.1 },
    }
}

pub static TICKER_OPTIONS: PerCategory<[&str; 3]> = PerCategory {
    bonds: ["BND", "AGG", "TLT"],
    etfs: ["VOO", "SPY", "IVV"],
    stocks: ["AAPL", "MSFT", "GOOGL"],
};

pub fn default_ticker(category: Category) -> &'static str {
    TICKER_OPTIONS.get(category)[0]
}

/// Category whose option list contains `ticker`; anything unknown is a stock.
pub fn category_of(ticker: &str) -> Category {
    Category::ALL
        .into_iter()
        .find(|c| TICKER_OPTIONS.get(*c).contains(&ticker))
        .unwrap_or(Category::Stocks)
}

pub fn ticker_info(ticker: &'static str) -> TickerInfo {
    let (description, expected_return) = match ticker {
        "BND" => ("Vanguard Total Bond Market ETF, broad-based bond exposure", 0.03),
        "AGG" => ("iShares Core U.S. Aggregate Bond ETF, broad U.S. bond exposure", 0.025),
        "TLT" => ("iShares 20+ Year Treasury Bond ETF, long-term U.S. Treasuries", 0.04),
        "VOO" => ("Vanguard S&P 500 ETF, broad U.S. equity exposure", 0.07),
        "SPY" => ("SPDR S&P 500 ETF Trust, broad U.S. equity exposure", 0.068),
        "IVV" => ("iShares Core S&P 500 ETF, broad U.S. equity exposure", 0.069),
        "AAPL" => ("Apple Inc., a large-cap technology stock", 0.10),
        "MSFT" => ("Microsoft Corporation, a large-cap technology stock", 0.095),
        "GOOGL" => ("Alphabet Inc., a large-cap technology stock", 0.11),
        _ => ("", 0.0),
    };
    TickerInfo {
        ticker,
        description,
        expected_return,
    }
}

/// Ticker overrides per category. An absent or empty list keeps the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTickers {
    pub bonds: Option<Vec<String>>,
    pub etfs: Option<Vec<String>>,
    pub stocks: Option<Vec<String>>,
}

impl CategoryTickers {
    /// One ticker per category in category order, as in `tickers=BND,VOO,AAPL`.
    /// Extra entries are ignored.
    pub fn from_positional<S: AsRef<str>>(tickers: &[S]) -> Self {
        let mut overrides = CategoryTickers::default();
        for (category, ticker) in Category::ALL.iter().zip(tickers) {
            let ticker = ticker.as_ref().trim();
            if !ticker.is_empty() {
                overrides.set(*category, vec![ticker.to_string()]);
            }
        }
        overrides
    }

    pub fn set(&mut self, category: Category, tickers: Vec<String>) {
        let slot = match category {
            Category::Bonds => &mut self.bonds,
            Category::Etfs => &mut self.etfs,
            Category::Stocks => &mut self.stocks,
        };
        *slot = Some(tickers);
    }

    pub fn get(&self, category: Category) -> Option<&[String]> {
        let slot = match category {
            Category::Bonds => &self.bonds,
            Category::Etfs => &self.etfs,
            Category::Stocks => &self.stocks,
        };
        slot.as_deref().filter(|list| !list.is_empty())
    }
}

/// Adjusted fractions are `base + adjustment` and are not re-normalised.
pub fn compute_allocation(
    risk: RiskLevel,
    horizon: Horizon,
    overrides: Option<&CategoryTickers>,
) -> Vec<PortfolioItem> {
    let base = base_allocation(risk);
    let adjust = horizon_adjustment(horizon);

    let mut portfolio = Vec::new();
    for category in Category::ALL {
        let fraction = base.get(category) + adjust.get(category);
        let tickers: Vec<&str> = match overrides.and_then(|o| o.get(category)) {
            Some(list) => list.iter().map(String::as_str).collect(),
            None => vec![default_ticker(category)],
        };
        let count = tickers.len() as f64;
        for ticker in tickers {
            portfolio.push(PortfolioItem::weighted(category, ticker, fraction / count));
        }
    }
    portfolio
}

#[cfg(test)]
mod tests {
    use super::*;

    const RISKS: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Mid, RiskLevel::High];
    const HORIZONS: [Horizon; 3] = [Horizon::Short, Horizon::Mid, Horizon::Long];

    fn weights(items: &[PortfolioItem]) -> Vec<(Category, &str, f64)> {
        items
            .iter()
            .map(|p| (p.category, p.ticker.as_str(), p.weight))
            .collect()
    }

    #[test]
    fn mid_mid_uses_defaults() {
        let result = compute_allocation(RiskLevel::Mid, Horizon::Mid, None);
        assert_eq!(
            weights(&result),
            vec![
                (Category::Bonds, "BND", 0.4),
                (Category::Etfs, "VOO", 0.4),
                (Category::Stocks, "AAPL", 0.2),
            ]
        );
        assert!(result.iter().all(|p| p.shares.is_none() && p.price.is_none()));
    }

    #[test]
    fn low_short_tilts_to_bonds() {
        let result = compute_allocation(RiskLevel::Low, Horizon::Short, None);
        assert!((result[0].weight - 0.7).abs() < 1e-12);
        assert!((result[1].weight - 0.3).abs() < 1e-12);
        assert!(result[2].weight.abs() < 1e-12);
    }

    #[test]
    fn weights_sum_to_adjusted_total() {
        for risk in RISKS {
            for horizon in HORIZONS {
                let base = base_allocation(risk);
                let adj = horizon_adjustment(horizon);
                let expected =
                    (base.bonds + adj.bonds) + base.etfs + (base.stocks + adj.stocks);
                let total: f64 = compute_allocation(risk, horizon, None)
                    .iter()
                    .map(|p| p.weight)
                    .sum();
                assert!((total - expected).abs() < 1e-9, "{:?}/{:?}", risk, horizon);
                assert!((total - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn overrides_split_category_equally() {
        let overrides = CategoryTickers {
            bonds: Some(vec!["X".into(), "Y".into()]),
            stocks: Some(vec!["Z".into()]),
            ..Default::default()
        };
        let result = compute_allocation(RiskLevel::Mid, Horizon::Mid, Some(&overrides));
        assert_eq!(
            weights(&result),
            vec![
                (Category::Bonds, "X", 0.2),
                (Category::Bonds, "Y", 0.2),
                (Category::Etfs, "VOO", 0.4),
                (Category::Stocks, "Z", 0.2),
            ]
        );
    }

    #[test]
    fn empty_override_keeps_default() {
        let overrides = CategoryTickers {
            etfs: Some(vec![]),
            ..Default::default()
        };
        let result = compute_allocation(RiskLevel::High, Horizon::Long, Some(&overrides));
        assert_eq!(result[1].ticker, "VOO");
        assert!((result[2].weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn positional_overrides() {
        let overrides = CategoryTickers::from_positional(&["AAA", " ", "CCC", "DDD"]);
        assert_eq!(overrides.get(Category::Bonds), Some(&["AAA".to_string()][..]));
        assert_eq!(overrides.get(Category::Etfs), None);
        assert_eq!(overrides.get(Category::Stocks), Some(&["CCC".to_string()][..]));
    }

    #[test]
    fn categorises_known_tickers() {
        assert_eq!(category_of("TLT"), Category::Bonds);
        assert_eq!(category_of("SPY"), Category::Etfs);
        assert_eq!(category_of("NVDA"), Category::Stocks);
    }
}
