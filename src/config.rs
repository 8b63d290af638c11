// src/config.rs
//! Parameter records for the six estimators.
//!
//! Every record carries the shared [`RunConfig`] (sample budget, batching,
//! emission cadence, seed) flattened next to its own fields, so the JSON
//! shape is one flat object per kind:
//!
//! ```json
//! { "simulation_type": "option-pricing",
//!   "params": { "n_simulations": 100000, "seed": 7, "strike_price": 105.0 } }
//! ```
//!
//! Records are validated once, before a run is created. Validation is
//! all-or-nothing and the error names the offending field.

use crate::error::{validation::*, McError, McResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_SIMULATIONS: u64 = 1_000;
pub const MAX_SIMULATIONS: u64 = 10_000_000;
pub const MIN_BATCH: u64 = 100;
pub const MAX_BATCH: u64 = 50_000;

/// Estimator kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationKind {
    Pi,
    Integration,
    OptionPricing,
    Hypothesis,
    Risk,
    Markov,
}

impl SimulationKind {
    pub const ALL: [SimulationKind; 6] = [
        SimulationKind::Pi,
        SimulationKind::Integration,
        SimulationKind::OptionPricing,
        SimulationKind::Hypothesis,
        SimulationKind::Risk,
        SimulationKind::Markov,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationKind::Pi => "pi",
            SimulationKind::Integration => "integration",
            SimulationKind::OptionPricing => "option-pricing",
            SimulationKind::Hypothesis => "hypothesis",
            SimulationKind::Risk => "risk",
            SimulationKind::Markov => "markov",
        }
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationKind {
    type Err = McError;

    fn from_str(s: &str) -> McResult<Self> {
        SimulationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| McError::InvalidConfiguration {
                field: "simulation_type".to_string(),
                reason: format!("unknown simulation type '{}'", s),
            })
    }
}

/// Batching and sampling settings shared by every kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Total number of samples (for the Markov chain, burn-in included)
    pub n_simulations: u64,
    pub batch_size: u64,
    /// Emit progress whenever the iteration count is a multiple of this
    pub update_frequency: u64,
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            n_simulations: 10_000,
            batch_size: 1_000,
            update_frequency: 1_000,
            seed: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> McResult<()> {
        validate_count(
            "n_simulations",
            self.n_simulations,
            MIN_SIMULATIONS,
            MAX_SIMULATIONS,
        )?;
        validate_count("batch_size", self.batch_size, MIN_BATCH, MAX_BATCH)?;
        validate_count(
            "update_frequency",
            self.update_frequency,
            MIN_BATCH,
            MAX_BATCH,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    Gaussian,
    Sine,
    Polynomial,
    Exponential,
    Reciprocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    TwoSided,
    RightTailed,
    LeftTailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnDistribution {
    Normal,
    T,
    Historical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDistribution {
    Normal,
    Gamma,
    Beta,
    Bimodal,
    Cauchy,
    Exponential,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiParams {
    #[serde(flatten)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationParams {
    #[serde(flatten)]
    pub run: RunConfig,
    pub function_type: FunctionType,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl Default for IntegrationParams {
    fn default() -> Self {
        IntegrationParams {
            run: RunConfig::default(),
            function_type: FunctionType::Gaussian,
            lower_bound: -2.0,
            upper_bound: 2.0,
        }
    }
}

impl IntegrationParams {
    pub fn validate(&self) -> McResult<()> {
        validate_finite("lower_bound", self.lower_bound)?;
        validate_finite("upper_bound", self.upper_bound)?;
        if self.upper_bound <= self.lower_bound {
            return Err(McError::InvalidParameters {
                parameter: "upper_bound".to_string(),
                value: self.upper_bound,
                constraint: format!(
                    "must be greater than lower_bound ({}); the integration width would be {}",
                    self.lower_bound,
                    self.upper_bound - self.lower_bound
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionPricingParams {
    #[serde(flatten)]
    pub run: RunConfig,
    pub stock_price: f64,
    pub strike_price: f64,
    pub volatility: f64,
    pub risk_free_rate: f64,
    pub time_to_maturity: f64,
    pub option_type: OptionType,
}

impl Default for OptionPricingParams {
    fn default() -> Self {
        OptionPricingParams {
            run: RunConfig::default(),
            stock_price: 100.0,
            strike_price: 110.0,
            volatility: 0.2,
            risk_free_rate: 0.05,
            time_to_maturity: 1.0,
            option_type: OptionType::Call,
        }
    }
}

impl OptionPricingParams {
    pub fn validate(&self) -> McResult<()> {
        validate_positive("stock_price", self.stock_price)?;
        validate_positive("strike_price", self.strike_price)?;
        validate_left_open_range("volatility", self.volatility, 0.0, 2.0)?;
        validate_range("risk_free_rate", self.risk_free_rate, -0.1, 0.5)?;
        validate_left_open_range("time_to_maturity", self.time_to_maturity, 0.0, 10.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HypothesisParams {
    #[serde(flatten)]
    pub run: RunConfig,
    pub null_mean: f64,
    pub alt_mean: f64,
    pub std_dev: f64,
    pub sample_size: u64,
    pub alpha: f64,
    pub test_type: TestType,
}

impl Default for HypothesisParams {
    fn default() -> Self {
        HypothesisParams {
            run: RunConfig::default(),
            null_mean: 0.0,
            alt_mean: 0.5,
            std_dev: 1.0,
            sample_size: 30,
            alpha: 0.05,
            test_type: TestType::TwoSided,
        }
    }
}

impl HypothesisParams {
    pub fn validate(&self) -> McResult<()> {
        validate_finite("null_mean", self.null_mean)?;
        validate_finite("alt_mean", self.alt_mean)?;
        validate_positive("std_dev", self.std_dev)?;
        validate_count("sample_size", self.sample_size, 2, 1_000)?;
        validate_open_range("alpha", self.alpha, 0.0, 1.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    #[serde(flatten)]
    pub run: RunConfig,
    pub portfolio_value: f64,
    pub expected_return: f64,
    pub portfolio_volatility: f64,
    /// Horizon in trading days
    pub time_horizon: u64,
    pub confidence_level: f64,
    pub distribution: ReturnDistribution,
    /// Reservoir capacity for the loss quantile
    pub max_retained_losses: u64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            run: RunConfig::default(),
            portfolio_value: 1_000_000.0,
            expected_return: 0.08,
            portfolio_volatility: 0.15,
            time_horizon: 10,
            confidence_level: 0.95,
            distribution: ReturnDistribution::Normal,
            max_retained_losses: 100_000,
        }
    }
}

impl RiskParams {
    pub fn validate(&self) -> McResult<()> {
        validate_positive("portfolio_value", self.portfolio_value)?;
        validate_range("expected_return", self.expected_return, -1.0, 1.0)?;
        validate_left_open_range("portfolio_volatility", self.portfolio_volatility, 0.0, 2.0)?;
        validate_count("time_horizon", self.time_horizon, 1, 252)?;
        validate_open_range("confidence_level", self.confidence_level, 0.5, 1.0)?;
        validate_count(
            "max_retained_losses",
            self.max_retained_losses,
            MIN_SIMULATIONS,
            MAX_SIMULATIONS,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovParams {
    #[serde(flatten)]
    pub run: RunConfig,
    pub distribution_type: TargetDistribution,
    pub burn_in: u64,
    pub step_size: f64,
    pub initial_value: f64,
}

impl Default for MarkovParams {
    fn default() -> Self {
        MarkovParams {
            run: RunConfig::default(),
            distribution_type: TargetDistribution::Normal,
            burn_in: 1_000,
            step_size: 0.5,
            initial_value: 0.0,
        }
    }
}

impl MarkovParams {
    pub fn validate(&self) -> McResult<()> {
        validate_count("burn_in", self.burn_in, 0, 100_000)?;
        validate_left_open_range("step_size", self.step_size, 0.0, 10.0)?;
        validate_finite("initial_value", self.initial_value)?;
        Ok(())
    }
}

/// Validated-at-submission parameters, tagged by estimator kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "simulation_type", content = "params", rename_all = "kebab-case")]
pub enum ParameterRecord {
    Pi(PiParams),
    Integration(IntegrationParams),
    OptionPricing(OptionPricingParams),
    Hypothesis(HypothesisParams),
    Risk(RiskParams),
    Markov(MarkovParams),
}

impl ParameterRecord {
    /// Default parameters for a kind
    pub fn defaults(kind: SimulationKind) -> Self {
        match kind {
            SimulationKind::Pi => ParameterRecord::Pi(PiParams::default()),
            SimulationKind::Integration => ParameterRecord::Integration(Default::default()),
            SimulationKind::OptionPricing => ParameterRecord::OptionPricing(Default::default()),
            SimulationKind::Hypothesis => ParameterRecord::Hypothesis(Default::default()),
            SimulationKind::Risk => ParameterRecord::Risk(Default::default()),
            SimulationKind::Markov => ParameterRecord::Markov(Default::default()),
        }
    }

    pub fn kind(&self) -> SimulationKind {
        match self {
            ParameterRecord::Pi(_) => SimulationKind::Pi,
            ParameterRecord::Integration(_) => SimulationKind::Integration,
            ParameterRecord::OptionPricing(_) => SimulationKind::OptionPricing,
            ParameterRecord::Hypothesis(_) => SimulationKind::Hypothesis,
            ParameterRecord::Risk(_) => SimulationKind::Risk,
            ParameterRecord::Markov(_) => SimulationKind::Markov,
        }
    }

    pub fn run(&self) -> &RunConfig {
        match self {
            ParameterRecord::Pi(p) => &p.run,
            ParameterRecord::Integration(p) => &p.run,
            ParameterRecord::OptionPricing(p) => &p.run,
            ParameterRecord::Hypothesis(p) => &p.run,
            ParameterRecord::Risk(p) => &p.run,
            ParameterRecord::Markov(p) => &p.run,
        }
    }

    pub fn run_mut(&mut self) -> &mut RunConfig {
        match self {
            ParameterRecord::Pi(p) => &mut p.run,
            ParameterRecord::Integration(p) => &mut p.run,
            ParameterRecord::OptionPricing(p) => &mut p.run,
            ParameterRecord::Hypothesis(p) => &mut p.run,
            ParameterRecord::Risk(p) => &mut p.run,
            ParameterRecord::Markov(p) => &mut p.run,
        }
    }

    /// Same record with a different seed
    pub fn with_seed(&self, seed: Option<u64>) -> Self {
        let mut record = self.clone();
        record.run_mut().seed = seed;
        record
    }

    /// Validate the shared run settings, then the kind-specific fields
    pub fn validate(&self) -> McResult<()> {
        self.run().validate()?;
        match self {
            ParameterRecord::Pi(_) => Ok(()),
            ParameterRecord::Integration(p) => p.validate(),
            ParameterRecord::OptionPricing(p) => p.validate(),
            ParameterRecord::Hypothesis(p) => p.validate(),
            ParameterRecord::Risk(p) => p.validate(),
            ParameterRecord::Markov(p) => p.validate(),
        }
    }

    /// Parse and validate untyped JSON parameters for `simulation_type`.
    /// Missing fields take their defaults.
    pub fn from_json(simulation_type: &str, params: &serde_json::Value) -> McResult<Self> {
        let kind: SimulationKind = simulation_type.parse()?;

        if !params.is_object() && !params.is_null() {
            return Err(McError::InvalidConfiguration {
                field: "params".to_string(),
                reason: "must be a JSON object".to_string(),
            });
        }
        if let Some(seed) = params.get("seed") {
            if !seed.is_null() && !seed.is_u64() {
                return Err(McError::InvalidConfiguration {
                    field: "seed".to_string(),
                    reason: format!("must be a non-negative integer (got {})", seed),
                });
            }
        }

        let params = if params.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            params.clone()
        };
        let record = match kind {
            SimulationKind::Pi => ParameterRecord::Pi(parse(params)?),
            SimulationKind::Integration => ParameterRecord::Integration(parse(params)?),
            SimulationKind::OptionPricing => ParameterRecord::OptionPricing(parse(params)?),
            SimulationKind::Hypothesis => ParameterRecord::Hypothesis(parse(params)?),
            SimulationKind::Risk => ParameterRecord::Risk(parse(params)?),
            SimulationKind::Markov => ParameterRecord::Markov(parse(params)?),
        };
        record.validate()?;
        Ok(record)
    }
}

fn parse<T>(value: serde_json::Value) -> McResult<T>
where
    T: serde::de::DeserializeOwned + Serialize + Default,
{
    serde_json::from_value(value.clone()).map_err(|e| McError::InvalidConfiguration {
        field: offending_field::<T>(&value).unwrap_or_else(|| "params".to_string()),
        reason: e.to_string(),
    })
}

/// First key of `value` that fails to deserialize when placed over the defaults.
/// Flattened run settings lose their key in serde's message, so the key is
/// found by elimination.
fn offending_field<T>(value: &serde_json::Value) -> Option<String>
where
    T: serde::de::DeserializeOwned + Serialize + Default,
{
    let defaults = serde_json::to_value(T::default()).ok()?;
    let defaults = defaults.as_object()?;
    value.as_object()?.iter().find_map(|(key, given)| {
        let mut candidate = defaults.clone();
        candidate.insert(key.clone(), given.clone());
        serde_json::from_value::<T>(serde_json::Value::Object(candidate))
            .is_err()
            .then(|| key.clone())
    })
}
