//! Pure dimension assessors (spec §4.2).
//!
//! Each assessor maps every metric to `{SAFE, WARNING, DANGEROUS}`, takes
//! the dimension state as the maximum across metrics, and reports the
//! highest-severity metric as the reason. Grounded on
//! `original_source/risk_scoring/assessors.py`'s threshold-rule pattern.

use super::config::{LiquidityRiskConfig, MarketRiskConfig, SystemIntegrityRiskConfig, VolatilityRiskConfig};
use super::types::{
    ContributingFactor, DataFreshnessStatus, DimensionAssessment, LiquidityDataInput, MarketDataInput, RiskDimension,
    RiskState, SystemIntegrityDataInput, VolatilityDataInput,
};

fn classify(value: f64, warning: f64, dangerous: f64) -> RiskState {
    if value >= dangerous {
        RiskState::Dangerous
    } else if value >= warning {
        RiskState::Warning
    } else {
        RiskState::Safe
    }
}

/// Some metrics are "bad when low" (volume drying up, depth thinning); the
/// thresholds are still expressed as warning/dangerous floors, just
/// compared with the inequality flipped.
fn classify_inverse(value: f64, warning_floor: f64, dangerous_floor: f64) -> RiskState {
    if value <= dangerous_floor {
        RiskState::Dangerous
    } else if value <= warning_floor {
        RiskState::Warning
    } else {
        RiskState::Safe
    }
}

fn finalize(dimension: RiskDimension, factors: Vec<ContributingFactor>) -> DimensionAssessment {
    let worst = factors
        .iter()
        .max_by_key(|f| f.state.value())
        .expect("assessors always produce at least one factor");
    DimensionAssessment {
        dimension,
        state: worst.state,
        reason: format!("{}={:.2} ({:?})", worst.metric, worst.value, worst.state),
        contributing_factors: factors,
    }
}

pub struct MarketAssessor {
    pub config: MarketRiskConfig,
}

impl MarketAssessor {
    pub fn assess(&self, input: &MarketDataInput) -> DimensionAssessment {
        let factors = vec![
            ContributingFactor {
                metric: "trend_reversal_count_1h".into(),
                value: input.trend_reversal_count_1h as f64,
                state: classify(
                    input.trend_reversal_count_1h as f64,
                    self.config.trend_reversal_warning as f64,
                    self.config.trend_reversal_dangerous as f64,
                ),
                threshold_used: self.config.trend_reversal_dangerous as f64,
            },
            ContributingFactor {
                metric: "correlation_breakdown_pct".into(),
                value: input.correlation_breakdown_pct,
                state: classify(
                    input.correlation_breakdown_pct,
                    self.config.correlation_breakdown_warning_pct,
                    self.config.correlation_breakdown_dangerous_pct,
                ),
                threshold_used: self.config.correlation_breakdown_dangerous_pct,
            },
        ];
        finalize(RiskDimension::Market, factors)
    }
}

pub struct LiquidityAssessor {
    pub config: LiquidityRiskConfig,
}

impl LiquidityAssessor {
    pub fn assess(&self, input: &LiquidityDataInput) -> DimensionAssessment {
        let factors = vec![
            ContributingFactor {
                metric: "spread_bps".into(),
                value: input.spread_bps,
                state: classify(input.spread_bps, self.config.spread_warning_bps, self.config.spread_dangerous_bps),
                threshold_used: self.config.spread_dangerous_bps,
            },
            ContributingFactor {
                metric: "volume_ratio_vs_avg".into(),
                value: input.volume_ratio_vs_avg,
                state: classify_inverse(
                    input.volume_ratio_vs_avg,
                    self.config.volume_ratio_warning,
                    self.config.volume_ratio_dangerous,
                ),
                threshold_used: self.config.volume_ratio_dangerous,
            },
            ContributingFactor {
                metric: "order_book_depth_ratio".into(),
                value: input.order_book_depth_ratio,
                state: classify_inverse(
                    input.order_book_depth_ratio,
                    self.config.depth_ratio_warning,
                    self.config.depth_ratio_dangerous,
                ),
                threshold_used: self.config.depth_ratio_dangerous,
            },
        ];
        finalize(RiskDimension::Liquidity, factors)
    }
}

pub struct VolatilityAssessor {
    pub config: VolatilityRiskConfig,
}

impl VolatilityAssessor {
    pub fn assess(&self, input: &VolatilityDataInput) -> DimensionAssessment {
        let factors = vec![
            ContributingFactor {
                metric: "atr_ratio_vs_baseline".into(),
                value: input.atr_ratio_vs_baseline,
                state: classify(
                    input.atr_ratio_vs_baseline,
                    self.config.atr_ratio_warning,
                    self.config.atr_ratio_dangerous,
                ),
                threshold_used: self.config.atr_ratio_dangerous,
            },
            ContributingFactor {
                metric: "price_range_pct_1h".into(),
                value: input.price_range_pct_1h,
                state: classify(
                    input.price_range_pct_1h,
                    self.config.price_range_warning_pct,
                    self.config.price_range_dangerous_pct,
                ),
                threshold_used: self.config.price_range_dangerous_pct,
            },
        ];
        finalize(RiskDimension::Volatility, factors)
    }
}

pub struct SystemIntegrityAssessor {
    pub config: SystemIntegrityRiskConfig,
}

impl SystemIntegrityAssessor {
    pub fn assess(&self, input: &SystemIntegrityDataInput) -> DimensionAssessment {
        let freshness_state = match input.freshness {
            DataFreshnessStatus::Fresh => RiskState::Safe,
            DataFreshnessStatus::Stale => RiskState::Warning,
            DataFreshnessStatus::Missing => RiskState::Dangerous,
        };
        let factors = vec![
            ContributingFactor {
                metric: "freshness".into(),
                value: freshness_state.value() as f64,
                state: freshness_state,
                threshold_used: RiskState::Dangerous.value() as f64,
            },
            ContributingFactor {
                metric: "pipeline_error_rate_pct".into(),
                value: input.pipeline_error_rate_pct,
                state: classify(
                    input.pipeline_error_rate_pct,
                    self.config.pipeline_error_rate_warning_pct,
                    self.config.pipeline_error_rate_dangerous_pct,
                ),
                threshold_used: self.config.pipeline_error_rate_dangerous_pct,
            },
            ContributingFactor {
                metric: "clock_skew_ms".into(),
                value: input.clock_skew_ms,
                state: classify(
                    input.clock_skew_ms,
                    self.config.clock_skew_warning_ms,
                    self.config.clock_skew_dangerous_ms,
                ),
                threshold_used: self.config.clock_skew_dangerous_ms,
            },
        ];
        finalize(RiskDimension::SystemIntegrity, factors)
    }
}
