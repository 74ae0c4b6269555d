use crate::error::AnalyticsError;
use nalgebra::{DMatrix, DVector};

pub const MIN_FORECAST_POINTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

pub trait TrendRegressor: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, ys: &[f64]) -> Result<LinearFit, AnalyticsError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NalgebraOls;

impl TrendRegressor for NalgebraOls {
    fn name(&self) -> &'static str {
        "nalgebra_ols"
    }

    fn fit(&self, ys: &[f64]) -> Result<LinearFit, AnalyticsError> {
        let n = ys.len();
        if n < 2 {
            return Err(AnalyticsError::InsufficientData(format!(
                "trend fit needs 2 points (got {n})"
            )));
        }

        let x = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { i as f64 });
        let y = DVector::from_column_slice(ys);

        let xtx = x.transpose() * &x;
        let xty = x.transpose() * &y;
        let xtx_inv = xtx.try_inverse().ok_or_else(|| {
            AnalyticsError::DegenerateInput("singular design matrix in trend fit".to_string())
        })?;
        let beta = xtx_inv * xty;

        Ok(LinearFit {
            intercept: beta[0],
            slope: beta[1],
        })
    }
}

/// Centered closed form: `slope = Σ(x-x̄)(y-ȳ) / Σ(x-x̄)²`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosedFormOls;

impl TrendRegressor for ClosedFormOls {
    fn name(&self) -> &'static str {
        "closed_form_ols"
    }

    fn fit(&self, ys: &[f64]) -> Result<LinearFit, AnalyticsError> {
        let n = ys.len();
        if n < 2 {
            return Err(AnalyticsError::InsufficientData(format!(
                "trend fit needs 2 points (got {n})"
            )));
        }

        let x_mean = (n - 1) as f64 / 2.0;
        let y_mean = ys.iter().sum::<f64>() / n as f64;

        let (sxy, sxx) = ys.iter().enumerate().fold((0.0, 0.0), |(sxy, sxx), (i, y)| {
            let dx = i as f64 - x_mean;
            (sxy + dx * (y - y_mean), sxx + dx * dx)
        });

        let slope = sxy / sxx;
        Ok(LinearFit {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }
}

/// Fitted line evaluated one step past the window; missing for fewer than
/// [`MIN_FORECAST_POINTS`] closes or a failed/non-finite fit.
pub fn forecast_next(closes: &[f64], regressor: &dyn TrendRegressor) -> Option<f64> {
    if closes.len() < MIN_FORECAST_POINTS {
        return None;
    }
    match regressor.fit(closes) {
        Ok(fit) => Some(fit.at(closes.len() as f64)).filter(|v| v.is_finite()),
        Err(err) => {
            tracing::debug!(regressor = regressor.name(), error = %err, "trend fit failed");
            None
        }
    }
}
