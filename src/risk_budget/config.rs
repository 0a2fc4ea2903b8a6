//! Budget configuration, including capital-tier lookup (spec §4.3).
//!
//! All limits are percentages of equity so the same evaluation logic works
//! unchanged across account sizes; tiers only pick which percentages apply.

#[derive(Debug, Clone)]
pub struct CapitalTier {
    /// Tier applies when equity >= this floor (USD, or base currency unit).
    pub equity_floor: f64,
    pub per_trade_limit_pct: f64,
    pub daily_limit_pct: f64,
    pub open_limit_pct: f64,
    pub max_positions: u32,
}

#[derive(Debug, Clone)]
pub struct RiskBudgetConfig {
    /// Sorted ascending by `equity_floor`; the highest floor <= equity wins.
    pub tiers: Vec<CapitalTier>,
    pub max_drawdown_pct: f64,
    pub reduce_when_drawdown_pct: f64,
    pub drawdown_reduction_factor: f64,
    pub hard_stop_after_losses: u32,
    pub allow_pyramiding: bool,
    pub max_staleness_seconds: i64,
    pub min_equity_floor: f64,
    pub min_risk_pct: f64,
    pub daily_warning_threshold_pct: f64,
    pub drawdown_warning_threshold_pct: f64,
    pub daily_reset_hour_utc: u32,
}

impl Default for RiskBudgetConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                CapitalTier {
                    equity_floor: 0.0,
                    per_trade_limit_pct: 0.5,
                    daily_limit_pct: 1.5,
                    open_limit_pct: 1.0,
                    max_positions: 3,
                },
                CapitalTier {
                    equity_floor: 10_000.0,
                    per_trade_limit_pct: 0.75,
                    daily_limit_pct: 2.0,
                    open_limit_pct: 1.5,
                    max_positions: 5,
                },
                CapitalTier {
                    equity_floor: 100_000.0,
                    per_trade_limit_pct: 1.0,
                    daily_limit_pct: 2.5,
                    open_limit_pct: 2.0,
                    max_positions: 8,
                },
            ],
            max_drawdown_pct: 12.0,
            reduce_when_drawdown_pct: 6.0,
            drawdown_reduction_factor: 0.5,
            hard_stop_after_losses: 4,
            allow_pyramiding: false,
            max_staleness_seconds: 120,
            min_equity_floor: 100.0,
            min_risk_pct: 0.05,
            daily_warning_threshold_pct: 80.0,
            drawdown_warning_threshold_pct: 75.0,
            daily_reset_hour_utc: 0,
        }
    }
}

impl RiskBudgetConfig {
    pub fn tier_for(&self, equity: f64) -> &CapitalTier {
        self.tiers
            .iter()
            .rev()
            .find(|t| equity >= t.equity_floor)
            .unwrap_or(&self.tiers[0])
    }
}
