//! Run-scoped settings shared by every pass of one pipeline run.
//!
//! There is no process-wide mutable state: the comparison tolerance, the validation switch, the
//! expression printer and the numeric backend all travel in a [`Context`] that the caller builds
//! once and hands to each pass.
//!
//! ```
//! use hybrid_rs::context::Context;
//! use hybrid_rs::estimator::UnavailableEstimator;
//! use hybrid_rs::interval::Interval;
//!
//! let ctx = Context::default()
//!     .with_tolerance(1e-3)
//!     .with_estimator(UnavailableEstimator::new("offline"));
//! assert!(ctx.intervals_equal(&Interval::new(0.0, 0.7071), &Interval::new(0.0, 0.70712)));
//! assert_eq!(ctx.estimator.name(), "unavailable");
//! ```

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::config::Configuration;
use crate::error::Result;
use crate::estimator::{RangeEstimator, SimulationEstimator};
use crate::expr::Expr;
use crate::interval::Interval;
use crate::printer::PrinterConfig;

#[derive(Clone)]
pub struct Context {
    /// Absolute tolerance for interval comparisons.
    pub tolerance: f64,
    /// When `false`, [`Context::validate`] accepts everything.
    pub validation: bool,
    /// Operator spellings for rendering; `None` means the default printer.
    pub printer: Option<PrinterConfig>,
    pub estimator: Arc<dyn RangeEstimator>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            validation: true,
            printer: None,
            estimator: Arc::new(SimulationEstimator::default()),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("tolerance", &self.tolerance)
            .field("validation", &self.validation)
            .field("printer", &self.printer)
            .field("estimator", &self.estimator.name())
            .finish()
    }
}

// Builders
impl Context {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_printer(mut self, printer: PrinterConfig) -> Self {
        self.printer = Some(printer);
        self
    }

    pub fn with_estimator(self, estimator: impl RangeEstimator + 'static) -> Self {
        self.with_shared_estimator(Arc::new(estimator))
    }

    pub fn with_shared_estimator(mut self, estimator: Arc<dyn RangeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }
}

impl Context {
    pub fn intervals_equal(&self, a: &Interval, b: &Interval) -> bool {
        a.approx_eq(b, self.tolerance)
    }

    pub fn render(&self, expr: &Expr) -> String {
        match &self.printer {
            Some(printer) => expr.to_string_with(printer),
            None => expr.to_string(),
        }
    }

    pub fn render_configuration(&self, config: &Configuration) -> String {
        match &self.printer {
            Some(printer) => config.to_string_with(printer),
            None => config.to_string(),
        }
    }

    /// Runs [`Configuration::validate`] unless validation is switched off.
    pub fn validate(&self, config: &Configuration) -> Result<()> {
        if !self.validation {
            debug!("Validation disabled, skipping integrity checks");
            return Ok(());
        }
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::automaton::{AutomatonTransition, BaseComponent};

    fn broken() -> Configuration {
        let mut ha = BaseComponent::new();
        ha.add_transition(AutomatonTransition::new("a", "b"));
        Configuration::new(ha)
    }

    #[test]
    fn test_validation_toggle() {
        assert!(Context::default().validate(&broken()).is_err());
        assert!(Context::default().with_validation(false).validate(&broken()).is_ok());
    }

    #[test]
    fn test_printer_selection() {
        let e = Expr::var("x").le(Expr::num(1.0)).and(Expr::var("y").ge(Expr::num(0.0)));
        assert_eq!(Context::default().render(&e), "x <= 1 && y >= 0");
        let ctx = Context::default().with_printer(PrinterConfig::spaceex());
        assert_eq!(ctx.render(&e), "x <= 1 & y >= 0");
    }

    #[test]
    fn test_default_estimator() {
        let ctx = Context::default();
        assert_eq!(ctx.estimator.name(), "simulation");
        assert_eq!(ctx.tolerance, 1e-9);
        assert!(format!("{:?}", ctx).contains("simulation"));
    }
}
