//! Risk Committee: an advisory review board, not an authority.
//!
//! Grounded on `original_source/risk_committee/engine.py`'s
//! `RiskCommitteeEngine._make_committee_decision` (one of the few
//! reference modules whose body survived the distillation) and
//! `reviewers.py`'s four-reviewer composition. Per SPEC_FULL.md §B.7 and
//! spec.md Open Question #1, this module produces a `CommitteeVerdict`
//! consumed only as additional input to the Control monitor — it cannot
//! transition `SystemState` on its own.

use chrono::{DateTime, Utc};

pub trait Severity {
    fn is_critical(&self) -> bool;
    fn is_warning(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataIntegrityStatus {
    Pass,
    Warn,
    Fail,
}

impl Severity for DataIntegrityStatus {
    fn is_critical(&self) -> bool {
        matches!(self, DataIntegrityStatus::Fail)
    }
    fn is_warning(&self) -> bool {
        matches!(self, DataIntegrityStatus::Warn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketRiskLevel {
    Low,
    Medium,
    High,
}

impl Severity for MarketRiskLevel {
    fn is_critical(&self) -> bool {
        matches!(self, MarketRiskLevel::High)
    }
    fn is_warning(&self) -> bool {
        matches!(self, MarketRiskLevel::Medium)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionQuality {
    Good,
    Degraded,
    Unacceptable,
}

impl Severity for ExecutionQuality {
    fn is_critical(&self) -> bool {
        matches!(self, ExecutionQuality::Unacceptable)
    }
    fn is_warning(&self) -> bool {
        matches!(self, ExecutionQuality::Degraded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapitalSafetyStatus {
    Safe,
    AtRisk,
    Breach,
}

impl Severity for CapitalSafetyStatus {
    fn is_critical(&self) -> bool {
        matches!(self, CapitalSafetyStatus::Breach)
    }
    fn is_warning(&self) -> bool {
        matches!(self, CapitalSafetyStatus::AtRisk)
    }
}

#[derive(Debug, Clone)]
pub struct ReviewerVerdict<S> {
    pub status: S,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitteeDecision {
    Approve,
    Hold,
    Block,
}

#[derive(Debug, Clone)]
pub struct CommitteeReport {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub data_integrity: ReviewerVerdict<DataIntegrityStatus>,
    pub market_risk: ReviewerVerdict<MarketRiskLevel>,
    pub execution_quality: ReviewerVerdict<ExecutionQuality>,
    pub capital_safety: ReviewerVerdict<CapitalSafetyStatus>,
    pub decision: CommitteeDecision,
    pub decision_reason: String,
    pub critical_count: u32,
    pub warning_count: u32,
    pub ok_count: u32,
}

/// Everything the committee is consulted about in a single convening. No
/// ingestion or DB access lives here (spec.md §1 non-goal); the caller
/// supplies the already-fetched figures.
#[derive(Debug, Clone)]
pub struct CommitteeInputs {
    pub sources: Vec<(String, Option<DateTime<Utc>>)>,
    pub volatility_score: f64,
    pub recent_slippage_bps: f64,
    pub current_drawdown_pct: f64,
}

#[derive(Debug, Clone)]
pub struct RiskCommitteeConfig {
    pub max_data_age_secs: i64,
    pub expected_sources: Vec<String>,
    pub high_volatility_threshold: f64,
    pub max_slippage_bps: f64,
    pub max_drawdown_pct: f64,
}

impl Default for RiskCommitteeConfig {
    fn default() -> Self {
        Self {
            max_data_age_secs: 7_200,
            expected_sources: vec!["coingecko".to_string(), "binance".to_string()],
            high_volatility_threshold: 80.0,
            max_slippage_bps: 50.0,
            max_drawdown_pct: 10.0,
        }
    }
}

/// Pure four-reviewer panel plus the explicit aggregation rule from the
/// original engine: any critical verdict blocks outright, two or more
/// warnings holds, a single warning still approves (with caution), and a
/// clean sweep approves plainly.
pub struct RiskCommittee {
    config: RiskCommitteeConfig,
}

impl RiskCommittee {
    pub fn new(config: RiskCommitteeConfig) -> Self {
        Self { config }
    }

    fn review_data_integrity(&self, inputs: &CommitteeInputs, now: DateTime<Utc>) -> ReviewerVerdict<DataIntegrityStatus> {
        for expected in &self.config.expected_sources {
            match inputs.sources.iter().find(|(name, _)| name == expected) {
                None => {
                    return ReviewerVerdict {
                        status: DataIntegrityStatus::Fail,
                        reason: format!("expected source {expected} absent"),
                    }
                }
                Some((_, None)) => {
                    return ReviewerVerdict {
                        status: DataIntegrityStatus::Fail,
                        reason: format!("{expected} has never reported"),
                    }
                }
                Some((_, Some(ts))) => {
                    let age = (now - *ts).num_seconds();
                    if age > self.config.max_data_age_secs {
                        return ReviewerVerdict {
                            status: DataIntegrityStatus::Warn,
                            reason: format!("{expected} age {age}s exceeds {}s", self.config.max_data_age_secs),
                        };
                    }
                }
            }
        }
        ReviewerVerdict {
            status: DataIntegrityStatus::Pass,
            reason: "all expected sources fresh".to_string(),
        }
    }

    fn review_market_risk(&self, inputs: &CommitteeInputs) -> ReviewerVerdict<MarketRiskLevel> {
        let status = if inputs.volatility_score >= self.config.high_volatility_threshold {
            MarketRiskLevel::High
        } else if inputs.volatility_score >= self.config.high_volatility_threshold * 0.5 {
            MarketRiskLevel::Medium
        } else {
            MarketRiskLevel::Low
        };
        ReviewerVerdict {
            reason: format!("volatility score {:.1}", inputs.volatility_score),
            status,
        }
    }

    fn review_execution_quality(&self, inputs: &CommitteeInputs) -> ReviewerVerdict<ExecutionQuality> {
        let status = if inputs.recent_slippage_bps > self.config.max_slippage_bps {
            ExecutionQuality::Unacceptable
        } else if inputs.recent_slippage_bps > self.config.max_slippage_bps * 0.5 {
            ExecutionQuality::Degraded
        } else {
            ExecutionQuality::Good
        };
        ReviewerVerdict {
            reason: format!("recent slippage {:.1}bps", inputs.recent_slippage_bps),
            status,
        }
    }

    fn review_capital_safety(&self, inputs: &CommitteeInputs) -> ReviewerVerdict<CapitalSafetyStatus> {
        let status = if inputs.current_drawdown_pct >= self.config.max_drawdown_pct {
            CapitalSafetyStatus::Breach
        } else if inputs.current_drawdown_pct >= self.config.max_drawdown_pct * 0.75 {
            CapitalSafetyStatus::AtRisk
        } else {
            CapitalSafetyStatus::Safe
        };
        ReviewerVerdict {
            reason: format!("drawdown {:.2}%", inputs.current_drawdown_pct),
            status,
        }
    }

    pub fn convene(&self, correlation_id: impl Into<String>, inputs: &CommitteeInputs, now: DateTime<Utc>) -> CommitteeReport {
        let data_integrity = self.review_data_integrity(inputs, now);
        let market_risk = self.review_market_risk(inputs);
        let execution_quality = self.review_execution_quality(inputs);
        let capital_safety = self.review_capital_safety(inputs);

        let severities: [&dyn Severity; 4] = [&data_integrity.status, &market_risk.status, &execution_quality.status, &capital_safety.status];
        let critical_count = severities.iter().filter(|s| s.is_critical()).count() as u32;
        let warning_count = severities.iter().filter(|s| s.is_warning()).count() as u32;
        let ok_count = 4 - critical_count - warning_count;

        let (decision, decision_reason) = if critical_count > 0 {
            (CommitteeDecision::Block, format!("{critical_count} reviewer(s) reported critical issues"))
        } else if warning_count >= 2 {
            (CommitteeDecision::Hold, format!("{warning_count} reviewer(s) reported warnings"))
        } else if warning_count == 1 {
            (CommitteeDecision::Approve, "approved with caution: 1 warning noted".to_string())
        } else {
            (CommitteeDecision::Approve, "all reviewers report acceptable conditions".to_string())
        };

        CommitteeReport {
            correlation_id: correlation_id.into(),
            timestamp: now,
            data_integrity,
            market_risk,
            execution_quality,
            capital_safety,
            decision,
            decision_reason,
            critical_count,
            warning_count,
            ok_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_inputs(now: DateTime<Utc>) -> CommitteeInputs {
        CommitteeInputs {
            sources: vec![("coingecko".to_string(), Some(now)), ("binance".to_string(), Some(now))],
            volatility_score: 10.0,
            recent_slippage_bps: 5.0,
            current_drawdown_pct: 1.0,
        }
    }

    #[test]
    fn clean_inputs_approve() {
        let now = Utc::now();
        let committee = RiskCommittee::new(RiskCommitteeConfig::default());
        let report = committee.convene("corr-1", &fresh_inputs(now), now);
        assert_eq!(report.decision, CommitteeDecision::Approve);
        assert_eq!(report.critical_count, 0);
    }

    #[test]
    fn single_breach_blocks() {
        let now = Utc::now();
        let committee = RiskCommittee::new(RiskCommitteeConfig::default());
        let mut inputs = fresh_inputs(now);
        inputs.current_drawdown_pct = 15.0;
        let report = committee.convene("corr-2", &inputs, now);
        assert_eq!(report.decision, CommitteeDecision::Block);
    }

    #[test]
    fn two_warnings_hold() {
        let now = Utc::now();
        let committee = RiskCommittee::new(RiskCommitteeConfig::default());
        let mut inputs = fresh_inputs(now);
        inputs.volatility_score = 45.0; // medium: warning
        inputs.current_drawdown_pct = 8.0; // at-risk: warning
        let report = committee.convene("corr-3", &inputs, now);
        assert_eq!(report.decision, CommitteeDecision::Hold);
        assert_eq!(report.warning_count, 2);
    }

    #[test]
    fn single_warning_still_approves() {
        let now = Utc::now();
        let committee = RiskCommittee::new(RiskCommitteeConfig::default());
        let mut inputs = fresh_inputs(now);
        inputs.recent_slippage_bps = 30.0; // degraded: warning
        let report = committee.convene("corr-4", &inputs, now);
        assert_eq!(report.decision, CommitteeDecision::Approve);
        assert_eq!(report.warning_count, 1);
    }

    #[test]
    fn missing_expected_source_is_critical() {
        let now = Utc::now();
        let committee = RiskCommittee::new(RiskCommitteeConfig::default());
        let mut inputs = fresh_inputs(now);
        inputs.sources.retain(|(name, _)| name != "binance");
        let report = committee.convene("corr-5", &inputs, now);
        assert_eq!(report.decision, CommitteeDecision::Block);
        assert_eq!(report.data_integrity.status, DataIntegrityStatus::Fail);
    }
}
