//! Risk Scoring Engine: combines four dimension assessments into a total
//! score and detects escalations for alerting (spec §4.2).
//!
//! No learning, no probabilities — a deterministic function of the current
//! tick's inputs and the previous tick's state, held behind a single lock.

use super::assessors::{LiquidityAssessor, MarketAssessor, SystemIntegrityAssessor, VolatilityAssessor};
use super::config::RiskScoringConfig;
use super::types::{
    DimensionAssessment, InsufficientDataError, LiquidityDataInput, MarketDataInput, RiskDimension, RiskLevel,
    RiskScoreResult, RiskState, RiskStateChange, SystemIntegrityDataInput, VolatilityDataInput, ALL_DIMENSIONS,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Every input the engine needs for one evaluation cycle. A `None` field
/// means that dimension's feed did not deliver data this cycle.
#[derive(Debug, Clone, Default)]
pub struct RiskScoringInputs {
    pub market: Option<MarketDataInput>,
    pub liquidity: Option<LiquidityDataInput>,
    pub volatility: Option<VolatilityDataInput>,
    pub system_integrity: Option<SystemIntegrityDataInput>,
}

struct PreviousResult {
    dimension_states: HashMap<RiskDimension, RiskState>,
    level: RiskLevel,
}

pub struct RiskScoringEngine {
    config: RiskScoringConfig,
    previous: Mutex<Option<PreviousResult>>,
}

impl RiskScoringEngine {
    pub fn new(config: RiskScoringConfig) -> Self {
        Self {
            config,
            previous: Mutex::new(None),
        }
    }

    /// Evaluate one cycle. Missing dimension inputs yield
    /// `InsufficientDataError`, but a result is still returned (tagged
    /// `insufficient_data = true`) rather than withheld — callers always
    /// get something to reason about, per spec §4.2.
    pub fn evaluate(
        &self,
        inputs: &RiskScoringInputs,
        now: DateTime<Utc>,
    ) -> (RiskScoreResult, Option<InsufficientDataError>) {
        let mut dimensions: HashMap<RiskDimension, DimensionAssessment> = HashMap::new();
        let mut missing: Vec<&str> = Vec::new();

        match &inputs.market {
            Some(input) => {
                let assessor = MarketAssessor {
                    config: self.config.market.clone(),
                };
                dimensions.insert(RiskDimension::Market, assessor.assess(input));
            }
            None => missing.push("market"),
        }
        match &inputs.liquidity {
            Some(input) => {
                let assessor = LiquidityAssessor {
                    config: self.config.liquidity.clone(),
                };
                dimensions.insert(RiskDimension::Liquidity, assessor.assess(input));
            }
            None => missing.push("liquidity"),
        }
        match &inputs.volatility {
            Some(input) => {
                let assessor = VolatilityAssessor {
                    config: self.config.volatility.clone(),
                };
                dimensions.insert(RiskDimension::Volatility, assessor.assess(input));
            }
            None => missing.push("volatility"),
        }
        match &inputs.system_integrity {
            Some(input) => {
                let assessor = SystemIntegrityAssessor {
                    config: self.config.system_integrity.clone(),
                };
                dimensions.insert(RiskDimension::SystemIntegrity, assessor.assess(input));
            }
            None => missing.push("system_integrity"),
        }

        let insufficient_data = !missing.is_empty();
        let error = if insufficient_data {
            Some(InsufficientDataError(format!(
                "missing dimension inputs: {}",
                missing.join(", ")
            )))
        } else {
            None
        };

        let total: u8 = ALL_DIMENSIONS
            .iter()
            .filter_map(|d| dimensions.get(d))
            .map(|a| a.state.value())
            .sum();
        let level = RiskLevel::from_total(total);

        let result = RiskScoreResult {
            total,
            level,
            dimensions,
            insufficient_data,
            evaluated_at: now,
        };

        (result, error)
    }

    /// Compare `result` against the last-seen state and report any
    /// escalation as a candidate for alerting. Non-escalating changes
    /// (improvement, or no change) produce no candidates — the engine
    /// itself never alerts (spec §4.2).
    pub fn detect_escalations(&self, result: &RiskScoreResult, now: DateTime<Utc>) -> Vec<RiskStateChange> {
        let mut changes = Vec::new();
        let mut previous = self.previous.lock();

        if let Some(prev) = previous.as_ref() {
            for dim in ALL_DIMENSIONS {
                let prev_state = prev.dimension_states.get(&dim).copied();
                let cur_state = result.dimensions.get(&dim).map(|a| a.state);
                if let (Some(p), Some(c)) = (prev_state, cur_state) {
                    if c > p {
                        changes.push(RiskStateChange {
                            dimension: Some(dim),
                            from_state: p,
                            to_state: c,
                            at: now,
                        });
                    }
                }
            }
            if result.level > prev.level {
                changes.push(RiskStateChange {
                    dimension: None,
                    from_state: RiskState::Safe,
                    to_state: RiskState::Dangerous,
                    at: now,
                });
            }
        }

        *previous = Some(PreviousResult {
            dimension_states: result.dimensions.iter().map(|(d, a)| (*d, a.state)).collect(),
            level: result.level,
        });

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn safe_inputs() -> RiskScoringInputs {
        RiskScoringInputs {
            market: Some(MarketDataInput {
                trend_reversal_count_1h: 0,
                correlation_breakdown_pct: 0.0,
            }),
            liquidity: Some(LiquidityDataInput {
                spread_bps: 1.0,
                volume_ratio_vs_avg: 1.0,
                order_book_depth_ratio: 1.0,
            }),
            volatility: Some(VolatilityDataInput {
                atr_ratio_vs_baseline: 1.0,
                price_range_pct_1h: 1.0,
            }),
            system_integrity: Some(SystemIntegrityDataInput {
                freshness: super::super::types::DataFreshnessStatus::Fresh,
                pipeline_error_rate_pct: 0.0,
                clock_skew_ms: 0.0,
            }),
        }
    }

    #[test]
    fn all_safe_inputs_yield_low_level_and_zero_total() {
        let engine = RiskScoringEngine::new(RiskScoringConfig::default());
        let (result, err) = engine.evaluate(&safe_inputs(), Utc::now());
        assert!(err.is_none());
        assert_eq!(result.total, 0);
        assert_eq!(result.level, RiskLevel::Low);
    }

    #[test]
    fn missing_dimension_reports_insufficient_data_but_still_returns_result() {
        let engine = RiskScoringEngine::new(RiskScoringConfig::default());
        let mut inputs = safe_inputs();
        inputs.liquidity = None;
        let (result, err) = engine.evaluate(&inputs, Utc::now());
        assert!(result.insufficient_data);
        assert!(err.is_some());
        assert!(!result.dimensions.contains_key(&RiskDimension::Liquidity));
    }

    #[test]
    fn escalation_is_detected_across_consecutive_evaluations() {
        let engine = RiskScoringEngine::new(RiskScoringConfig::default());
        let now = Utc::now();
        let (first, _) = engine.evaluate(&safe_inputs(), now);
        assert!(engine.detect_escalations(&first, now).is_empty());

        let mut danger_inputs = safe_inputs();
        danger_inputs.volatility = Some(VolatilityDataInput {
            atr_ratio_vs_baseline: 5.0,
            price_range_pct_1h: 10.0,
        });
        let (second, _) = engine.evaluate(&danger_inputs, now);
        let changes = engine.detect_escalations(&second, now);
        assert!(changes.iter().any(|c| c.dimension == Some(RiskDimension::Volatility)));
    }

    #[test]
    fn improvement_produces_no_escalation_candidate() {
        let engine = RiskScoringEngine::new(RiskScoringConfig::default());
        let now = Utc::now();
        let mut danger_inputs = safe_inputs();
        danger_inputs.volatility = Some(VolatilityDataInput {
            atr_ratio_vs_baseline: 5.0,
            price_range_pct_1h: 10.0,
        });
        let (first, _) = engine.evaluate(&danger_inputs, now);
        engine.detect_escalations(&first, now);

        let (second, _) = engine.evaluate(&safe_inputs(), now);
        let changes = engine.detect_escalations(&second, now);
        assert!(changes.is_empty());
    }
}
