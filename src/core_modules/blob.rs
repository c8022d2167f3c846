// THEORY:
// The `blob` module defines the probabilistic object model of the engine. A
// `Blob` is a compact 2-D Gaussian summary of a region of activity: a mean
// position and a symmetric 2x2 covariance stored as its three distinct terms.
// Unlike a bounding box, a Gaussian carries its own notion of "how far away is
// still plausibly me". The association step exploits this by scoring events
// with the probability density rather than the Euclidean distance, so a
// spread-out blob can legitimately claim an event that a tighter but closer
// blob would reject.

use serde::{Deserialize, Serialize};

/// A tracked region of activity modeled as a 2-D Gaussian.
/// This is a "dumb" data container; all estimation logic lives in the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    /// The x coordinate of the mean position.
    pub x: f64,
    /// The y coordinate of the mean position.
    pub y: f64,
    /// The variance along x (the top-left covariance term).
    pub squared_sigma_x: f64,
    /// The x/y covariance term (off-diagonal).
    pub sigma_xy: f64,
    /// The variance along y (the bottom-right covariance term).
    pub squared_sigma_y: f64,
}

impl Blob {
    /// Creates an isotropic blob: independent x/y with a shared variance.
    pub fn isotropic(x: f64, y: f64, squared_sigma: f64) -> Self {
        Self {
            x,
            y,
            squared_sigma_x: squared_sigma,
            sigma_xy: 0.0,
            squared_sigma_y: squared_sigma,
        }
    }

    /// The determinant of the covariance matrix. Must stay strictly positive
    /// for `density_at` to be well-defined; the engine does not guard against
    /// a collapse to zero or below (extreme inertia settings can get there).
    pub fn determinant(&self) -> f64 {
        self.squared_sigma_x * self.squared_sigma_y - self.sigma_xy.powi(2)
    }

    /// Evaluates the bivariate Gaussian probability density at `(x, y)`,
    /// including the full `2π·√det` normalization so the density integrates
    /// to 1 over the plane. A degenerate covariance yields `inf` or `NaN`
    /// here; callers treat such values as never winning an association.
    pub fn density_at(&self, x: f64, y: f64) -> f64 {
        let x_position = x - self.x;
        let y_position = y - self.y;
        let determinant = self.determinant();
        (-(x_position.powi(2) * self.squared_sigma_y
            + y_position.powi(2) * self.squared_sigma_x
            - 2.0 * x_position * y_position * self.sigma_xy)
            / (2.0 * determinant))
            .exp()
            / (2.0 * std::f64::consts::PI * determinant.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn isotropic_density_matches_closed_form() {
        let sigma_squared = 5.0;
        let blob = Blob::isotropic(10.0, 20.0, sigma_squared);

        // For an isotropic Gaussian the density reduces to
        // exp(-r² / 2σ²) / (2πσ²).
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, -2.0), (3.0, 4.0)] {
            let expected = (-(dx * dx + dy * dy) / (2.0 * sigma_squared)).exp()
                / (2.0 * PI * sigma_squared);
            let actual = blob.density_at(10.0 + dx, 20.0 + dy);
            assert!(
                (actual - expected).abs() < TOLERANCE,
                "offset ({dx}, {dy}): expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn density_peaks_at_the_mean() {
        let blob = Blob {
            x: 5.0,
            y: 5.0,
            squared_sigma_x: 4.0,
            sigma_xy: 1.0,
            squared_sigma_y: 3.0,
        };
        let peak = blob.density_at(5.0, 5.0);
        assert!(peak > blob.density_at(6.0, 5.0));
        assert!(peak > blob.density_at(5.0, 3.5));
        assert!(peak > blob.density_at(4.0, 6.0));
    }

    #[test]
    fn determinant_subtracts_the_squared_cross_term() {
        let blob = Blob {
            x: 0.0,
            y: 0.0,
            squared_sigma_x: 6.0,
            sigma_xy: 2.0,
            squared_sigma_y: 3.0,
        };
        assert!((blob.determinant() - 14.0).abs() < TOLERANCE);
    }

    #[test]
    fn degenerate_covariance_is_not_finite() {
        // A collapsed covariance produces a non-finite density; the tracker
        // relies on strict comparisons to keep such blobs from winning.
        let blob = Blob::isotropic(0.0, 0.0, 0.0);
        assert!(!blob.density_at(0.0, 0.0).is_finite());
    }
}
