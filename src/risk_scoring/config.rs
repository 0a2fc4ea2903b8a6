//! Threshold configuration for the four risk dimensions (spec §4.2).
//!
//! Two thresholds per metric: below WARNING is SAFE, at/above DANGEROUS is
//! DANGEROUS, between is WARNING. Grounded on
//! `original_source/risk_scoring/config.py`'s threshold philosophy.

#[derive(Debug, Clone)]
pub struct MarketRiskConfig {
    pub trend_reversal_warning: u32,
    pub trend_reversal_dangerous: u32,
    pub correlation_breakdown_warning_pct: f64,
    pub correlation_breakdown_dangerous_pct: f64,
}

impl Default for MarketRiskConfig {
    fn default() -> Self {
        Self {
            trend_reversal_warning: 3,
            trend_reversal_dangerous: 6,
            correlation_breakdown_warning_pct: 30.0,
            correlation_breakdown_dangerous_pct: 60.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiquidityRiskConfig {
    pub spread_warning_bps: f64,
    pub spread_dangerous_bps: f64,
    pub volume_ratio_warning: f64,
    pub volume_ratio_dangerous: f64,
    pub depth_ratio_warning: f64,
    pub depth_ratio_dangerous: f64,
}

impl Default for LiquidityRiskConfig {
    fn default() -> Self {
        Self {
            spread_warning_bps: 10.0,
            spread_dangerous_bps: 25.0,
            volume_ratio_warning: 0.5,
            volume_ratio_dangerous: 0.2,
            depth_ratio_warning: 0.5,
            depth_ratio_dangerous: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolatilityRiskConfig {
    pub atr_ratio_warning: f64,
    pub atr_ratio_dangerous: f64,
    pub price_range_warning_pct: f64,
    pub price_range_dangerous_pct: f64,
}

impl Default for VolatilityRiskConfig {
    fn default() -> Self {
        Self {
            atr_ratio_warning: 1.5,
            atr_ratio_dangerous: 2.5,
            price_range_warning_pct: 3.0,
            price_range_dangerous_pct: 6.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemIntegrityRiskConfig {
    pub pipeline_error_rate_warning_pct: f64,
    pub pipeline_error_rate_dangerous_pct: f64,
    pub clock_skew_warning_ms: f64,
    pub clock_skew_dangerous_ms: f64,
}

impl Default for SystemIntegrityRiskConfig {
    fn default() -> Self {
        Self {
            pipeline_error_rate_warning_pct: 2.0,
            pipeline_error_rate_dangerous_pct: 10.0,
            clock_skew_warning_ms: 500.0,
            clock_skew_dangerous_ms: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskScoringConfig {
    pub market: MarketRiskConfig,
    pub liquidity: LiquidityRiskConfig,
    pub volatility: VolatilityRiskConfig,
    pub system_integrity: SystemIntegrityRiskConfig,
}
