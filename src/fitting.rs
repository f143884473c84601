//! Fitting service boundary and a least-squares reference model.
//!
//! The engine treats a fitting as a black box: it only needs to fit one
//! attribute on one [`InstanceRuns`], read back the fit's own quality, and
//! score a *foreign* fitting's model against a fitting's own data.

use crate::attribute::DimensionRelationship;
use crate::data::InstanceRuns;
use crate::error::{Error, Result};

/// Fits models of runtime behavior and scores them against data.
///
/// `evaluate(f, f)` must equal `quality(f)` so that a fitting is at zero
/// distance from itself.
pub trait FittingService: Sync {
    /// Opaque fit result: model, parameters and whatever data it needs to
    /// score foreign models.
    type Fitting: Send + Sync;

    /// Fit `attribute` on all runs of `runs`.
    fn fit(&self, runs: &InstanceRuns, attribute: &DimensionRelationship) -> Result<Self::Fitting>;

    /// Error of `foreign`'s model on `own`'s data. Lower is better.
    fn evaluate(&self, foreign: &Self::Fitting, own: &Self::Fitting) -> f64;

    /// Error of a fitting's model on its own data.
    fn quality(&self, fitting: &Self::Fitting) -> f64;
}

/// Ordinary least squares line through every point of every run.
///
/// ```text
/// dependent ≈ intercept + slope × independent
/// ```
///
/// Quality and evaluation are mean squared residuals.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquaresFitter;

/// A fitted line together with the points it was fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFit {
    /// Fitted intercept.
    pub intercept: f64,
    /// Fitted slope.
    pub slope: f64,
    xs: Vec<f64>,
    ys: Vec<f64>,
    mse: f64,
}

impl LineFit {
    /// Model value at `x`.
    #[inline]
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Mean squared residual of `model` on this fit's points.
    fn mse_of(&self, model: &LineFit) -> f64 {
        let n = self.xs.len() as f64;
        self.xs
            .iter()
            .zip(&self.ys)
            .map(|(&x, &y)| {
                let r = y - model.predict(x);
                r * r
            })
            .sum::<f64>()
            / n
    }
}

impl LeastSquaresFitter {
    /// Create the fitter.
    pub fn new() -> Self {
        Self
    }
}

impl FittingService for LeastSquaresFitter {
    type Fitting = LineFit;

    fn fit(&self, runs: &InstanceRuns, attribute: &DimensionRelationship) -> Result<LineFit> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for run in runs.runs() {
            let width = run.n_dimensions();
            if attribute.independent >= width || attribute.dependent >= width {
                return Err(Error::DimensionMismatch {
                    expected: attribute.independent.max(attribute.dependent) + 1,
                    found: width,
                });
            }
            xs.extend(run.column(attribute.independent).iter().copied());
            ys.extend(run.column(attribute.dependent).iter().copied());
        }

        if xs.is_empty() {
            return Err(Error::Model(format!(
                "no points for '{}' on instance '{}'",
                attribute.label(),
                runs.instance()
            )));
        }
        if xs.iter().chain(&ys).any(|v| !v.is_finite()) {
            return Err(Error::Model(format!(
                "non-finite measurement for '{}' on instance '{}'",
                attribute.label(),
                runs.instance()
            )));
        }

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;
        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            let dx = x - mean_x;
            sxx += dx * dx;
            sxy += dx * (y - mean_y);
        }
        // Degenerate x: horizontal line through the mean.
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = mean_y - slope * mean_x;

        let mut fit = LineFit {
            intercept,
            slope,
            xs,
            ys,
            mse: 0.0,
        };
        fit.mse = fit.mse_of(&fit);
        Ok(fit)
    }

    fn evaluate(&self, foreign: &LineFit, own: &LineFit) -> f64 {
        own.mse_of(foreign)
    }

    fn quality(&self, fitting: &LineFit) -> f64 {
        fitting.mse
    }
}
