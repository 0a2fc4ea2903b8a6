//! Risk Scoring Engine (spec §4.2): deterministic, capital-agnostic
//! environmental risk assessment consumed by the Risk Budget Manager as a
//! system-gate input.

pub mod assessors;
pub mod config;
pub mod engine;
pub mod types;

pub use config::RiskScoringConfig;
pub use engine::{RiskScoringEngine, RiskScoringInputs};
pub use types::{
    ContributingFactor, DataFreshnessStatus, DimensionAssessment, InsufficientDataError, LiquidityDataInput,
    MarketDataInput, RiskDimension, RiskLevel, RiskScoreResult, RiskState, RiskStateChange, SystemIntegrityDataInput,
    VolatilityDataInput, ALL_DIMENSIONS,
};
