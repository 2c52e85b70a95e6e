//! Configuration of the fixpoint iterator and of the interprocedural analysis.

use std::collections::HashMap;

use num_bigint::BigInt;

use crate::progress::ProgressLogger;
use crate::types::{BlockId, FunctionId};

/// Extrapolation used on loop heads after the widening delay.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WideningStrategy {
    #[default]
    Widen,
    /// Plain join (may not terminate on infinite-height domains).
    Join,
}

/// Refinement used in decreasing iterations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum NarrowingStrategy {
    #[default]
    Narrow,
    /// Plain meet (may not terminate on infinite-height domains).
    Meet,
}

/// Per loop head thresholds for widening and narrowing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideningHints {
    thresholds: HashMap<BlockId, BigInt>,
}

impl WideningHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, head: BlockId, threshold: impl Into<BigInt>) {
        self.thresholds.insert(head, threshold.into());
    }

    pub fn get(&self, head: BlockId) -> Option<&BigInt> {
        self.thresholds.get(&head)
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

/// Parameters of one intraprocedural fixpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixpointParameters {
    pub widening_strategy: WideningStrategy,
    pub narrowing_strategy: NarrowingStrategy,
    /// Number of plain joins on a loop head before extrapolating.
    pub widening_delay: usize,
    /// Extrapolate every `widening_period` iterations after the delay.
    pub widening_period: usize,
    /// Bound on decreasing iterations per cycle (`None` = until convergence).
    pub narrowing_iterations: Option<usize>,
    /// Bound on increasing iterations per loop head.
    pub max_iterations: usize,
    pub widening_hints: WideningHints,
}

impl Default for FixpointParameters {
    fn default() -> Self {
        Self {
            widening_strategy: WideningStrategy::Widen,
            narrowing_strategy: NarrowingStrategy::Narrow,
            widening_delay: 1,
            widening_period: 1,
            narrowing_iterations: None,
            max_iterations: 1000,
            widening_hints: WideningHints::new(),
        }
    }
}

impl FixpointParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_widening_strategy(mut self, strategy: WideningStrategy) -> Self {
        self.widening_strategy = strategy;
        self
    }

    pub fn with_narrowing_strategy(mut self, strategy: NarrowingStrategy) -> Self {
        self.narrowing_strategy = strategy;
        self
    }

    pub fn with_widening_delay(mut self, delay: usize) -> Self {
        self.widening_delay = delay;
        self
    }

    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn with_widening_period(mut self, period: usize) -> Self {
        assert!(period > 0, "widening period must be positive");
        self.widening_period = period;
        self
    }

    pub fn with_narrowing_iterations(mut self, iterations: Option<usize>) -> Self {
        self.narrowing_iterations = iterations;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_widening_hint(mut self, head: BlockId, threshold: impl Into<BigInt>) -> Self {
        self.widening_hints.add(head, threshold);
        self
    }
}

/// How calling contexts are distinguished in the results.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContextSensitivity {
    /// Every call of a function shares one context; results are joined.
    Insensitive,
    /// Contexts are the last `depth` call sites (`usize::MAX` keeps full call strings).
    CallString { depth: usize },
}

impl Default for ContextSensitivity {
    fn default() -> Self {
        ContextSensitivity::CallString { depth: usize::MAX }
    }
}

/// Options of an interprocedural analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub params: FixpointParameters,
    pub overrides: HashMap<FunctionId, FixpointParameters>,
    pub context_sensitivity: ContextSensitivity,
    pub use_fixpoint_cache: bool,
    pub logger: ProgressLogger,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            params: FixpointParameters::default(),
            overrides: HashMap::new(),
            context_sensitivity: ContextSensitivity::default(),
            use_fixpoint_cache: true,
            logger: ProgressLogger::default(),
        }
    }
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: FixpointParameters) -> Self {
        self.params = params;
        self
    }

    /// Use specific parameters for one function.
    pub fn with_override(mut self, function: FunctionId, params: FixpointParameters) -> Self {
        self.overrides.insert(function, params);
        self
    }

    pub fn with_context_sensitivity(mut self, sensitivity: ContextSensitivity) -> Self {
        self.context_sensitivity = sensitivity;
        self
    }

    pub fn with_fixpoint_cache(mut self, enabled: bool) -> Self {
        self.use_fixpoint_cache = enabled;
        self
    }

    pub fn with_logger(mut self, logger: ProgressLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Parameters for `function`: its override, or the defaults.
    pub fn params_for(&self, function: FunctionId) -> &FixpointParameters {
        self.overrides.get(&function).unwrap_or(&self.params)
    }
}
