use ndarray::{Array1, ArrayView1};
use ndarray_linalg::Inverse;

use crate::error::FitError;
use crate::math::vandermonde;

/// Seconds per day, to express per-second slopes as daily rates
pub const SECONDS_PER_DAY: f64 = 86_400.;

/// Straight line `value = slope * t + intercept` fitted by least squares
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Standard error of the slope
    pub slope_err: f64,
    /// Standard error of the intercept
    pub intercept_err: f64,
    /// Unreduced chi-square, the sum of squared residuals over the squared uncertainty
    pub chi_square: f64,
    /// Number of points in the fit
    pub dof: usize,
}

impl LinearFit {
    #[must_use]
    pub fn at(&self, t: f64) -> f64 {
        lin_fit(t, self.slope, self.intercept)
    }
}

#[must_use]
pub fn lin_fit(t: f64, slope: f64, intercept: f64) -> f64 {
    slope.mul_add(t, intercept)
}

/// Sum of squared deviations of `data` from `modelled`, in units of `uncertainty`
#[must_use]
pub fn chi_square(data: &[f64], modelled: &[f64], uncertainty: f64) -> f64 {
    data.iter()
        .zip(modelled)
        .map(|(datum, model)| (datum - model).powi(2))
        .sum::<f64>()
        / uncertainty.powi(2)
}

/// Fit a straight line through `(t, y)`, every point carrying the same `uncertainty`.
///
/// With a scalar uncertainty the fit is ordinary least squares. The parameter errors are the
/// square roots of the covariance diagonal, scaled by the residual variance, so with exactly two
/// points (no residual freedom) they are infinite. The abscissae are centred before solving,
/// which keeps the normal matrix well conditioned for epoch-sized times.
///
/// # Errors
/// [`FitError::LengthMismatch`] unless `t` and `y` pair up, [`FitError::InsufficientPoints`] for
/// fewer than two points, [`FitError::Singular`] when all abscissae coincide.
#[allow(clippy::cast_precision_loss)]
pub fn linear_fit(t: &[f64], data: &[f64], uncertainty: f64) -> Result<LinearFit, FitError> {
    if t.len() != data.len() {
        return Err(FitError::LengthMismatch {
            times: t.len(),
            values: data.len(),
        });
    }
    let n = t.len();
    if n < 2 {
        return Err(FitError::InsufficientPoints { found: n });
    }
    let y = ArrayView1::from(data);

    let t_mean = t.iter().sum::<f64>() / n as f64;
    let centred = t.iter().map(|ti| ti - t_mean).collect::<Vec<_>>();
    let spread = centred.iter().map(|ti| ti * ti).sum::<f64>();
    let magnitude = t.iter().map(|ti| ti * ti).sum::<f64>();
    if spread.is_nan() || spread <= f64::EPSILON * magnitude {
        return Err(FitError::Singular);
    }

    let design = vandermonde(&centred, 1);
    let covariance = design
        .t()
        .dot(&design)
        .inv()
        .map_err(|_| FitError::Singular)?;
    let params: Array1<f64> = covariance.dot(&design.t().dot(&y));

    let slope = params[1];
    let intercept = slope.mul_add(-t_mean, params[0]);

    let residuals = &y - &design.dot(&params);
    let (slope_err, intercept_err) = if n > 2 {
        let residual_variance = residuals.mapv(|r| r * r).sum() / (n - 2) as f64;
        let intercept_variance = t_mean.mul_add(
            t_mean.mul_add(covariance[[1, 1]], -2. * covariance[[0, 1]]),
            covariance[[0, 0]],
        );
        (
            (covariance[[1, 1]] * residual_variance).sqrt(),
            (intercept_variance * residual_variance).sqrt(),
        )
    } else {
        (f64::INFINITY, f64::INFINITY)
    };

    let modelled = t
        .iter()
        .map(|&ti| lin_fit(ti, slope, intercept))
        .collect::<Vec<_>>();

    Ok(LinearFit {
        slope,
        intercept,
        slope_err,
        intercept_err,
        chi_square: chi_square(data, &modelled, uncertainty),
        dof: n,
    })
}

#[cfg(test)]
mod tests {
    use ndarray_rand::rand::{Rng, SeedableRng};
    use ndarray_rand::rand_distr::Normal;
    use proptest::prelude::*;
    use rand_isaac::Isaac64Rng;

    use super::{chi_square, lin_fit, linear_fit};
    use crate::error::FitError;

    fn hourly_seconds(count: u32) -> Vec<f64> {
        (0..count).map(|hour| 3_600. * f64::from(hour)).collect()
    }

    #[test]
    fn exact_lines_are_recovered() {
        let t = hourly_seconds(48)
            .into_iter()
            .map(|t| t + 1.6e7)
            .collect::<Vec<_>>();
        let (slope, intercept) = (2.5e-6, 3.2);
        let y = t.iter().map(|&t| lin_fit(t, slope, intercept)).collect::<Vec<_>>();

        let fit = linear_fit(&t, &y, 0.1).unwrap();

        approx::assert_relative_eq!(fit.slope, slope, max_relative = 1e-8);
        approx::assert_relative_eq!(fit.intercept, intercept, max_relative = 1e-8);
        approx::assert_abs_diff_eq!(fit.slope_err, 0., epsilon = 1e-10);
        approx::assert_abs_diff_eq!(fit.intercept_err, 0., epsilon = 1e-4);
        approx::assert_abs_diff_eq!(fit.chi_square, 0., epsilon = 1e-10);
        assert_eq!(fit.dof, 48);
    }

    #[test]
    fn noisy_lines_fall_within_their_errors() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let uncertainty = 0.1;
        let noise = Normal::new(0., uncertainty).unwrap();

        let t = hourly_seconds(500);
        let (slope, intercept) = (-4e-6, 5.);
        let y = t
            .iter()
            .map(|&t| lin_fit(t, slope, intercept) + rng.sample(noise))
            .collect::<Vec<f64>>();

        let fit = linear_fit(&t, &y, uncertainty).unwrap();

        assert!((fit.slope - slope).abs() < 5. * fit.slope_err);
        assert!((fit.intercept - intercept).abs() < 5. * fit.intercept_err);
        #[allow(clippy::cast_precision_loss)]
        let reduced = fit.chi_square / fit.dof as f64;
        assert!((0.7..1.3).contains(&reduced), "reduced chi-square {reduced}");
    }

    #[test]
    fn two_points_have_unbounded_errors() {
        let fit = linear_fit(&[0., 10.], &[1., 2.], 1.).unwrap();
        approx::assert_relative_eq!(fit.slope, 0.1);
        approx::assert_relative_eq!(fit.intercept, 1.);
        assert!(fit.slope_err.is_infinite());
    }

    #[test]
    fn too_few_points_cannot_be_fitted() {
        assert_eq!(
            linear_fit(&[1.], &[1.], 1.),
            Err(FitError::InsufficientPoints { found: 1 })
        );
        assert_eq!(
            linear_fit(&[], &[], 1.),
            Err(FitError::InsufficientPoints { found: 0 })
        );
    }

    #[test]
    fn misaligned_inputs_are_rejected() {
        assert_eq!(
            linear_fit(&[0., 600., 1200.], &[1., 2.], 1.),
            Err(FitError::LengthMismatch {
                times: 3,
                values: 2
            })
        );
    }

    #[test]
    fn constant_times_are_singular() {
        assert_eq!(
            linear_fit(&[7.2e6; 5], &[1., 2., 3., 4., 5.], 1.),
            Err(FitError::Singular)
        );
    }

    #[test]
    fn chi_square_is_unreduced() {
        approx::assert_relative_eq!(chi_square(&[1., 2., 3.], &[1., 1., 1.], 0.5), 20.);
    }

    proptest! {
        #[test]
        fn chi_square_grows_as_uncertainty_shrinks(
            y in prop::collection::vec(-10f64..10., 3..50),
            uncertainty in 0.01f64..10.,
            factor in 0.01f64..1.,
        ) {
            #[allow(clippy::cast_precision_loss)]
            let t = (0..y.len()).map(|ii| 600. * ii as f64).collect::<Vec<_>>();
            let loose = linear_fit(&t, &y, uncertainty).unwrap();
            let tight = linear_fit(&t, &y, uncertainty * factor).unwrap();

            prop_assert!(loose.chi_square >= 0.);
            prop_assert!(tight.chi_square >= loose.chi_square);
        }
    }
}
