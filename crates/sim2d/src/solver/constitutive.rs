//! Snow material model and the 2x2 decompositions it needs.

use glam::{Mat2, Vec2};
use serde::{Deserialize, Serialize};

use crate::constants::SNOW_DENSITY;
use crate::error::{SimError, SimResult};

/// Elasto-plastic snow (fixed corotated elasticity with plastic hardening).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowMaterial {
    /// Young's modulus (Pa)
    pub youngs_modulus: f32,
    pub poisson_ratio: f32,
    /// Rest density (kg/m^3)
    pub density: f32,
    /// Exponential hardening coefficient
    pub hardening: f32,
    /// Singular values below `1 - critical_compression` yield
    pub critical_compression: f32,
    /// Singular values above `1 + critical_stretch` yield
    pub critical_stretch: f32,
}

impl Default for SnowMaterial {
    fn default() -> Self {
        Self {
            youngs_modulus: 1.4e5,
            poisson_ratio: 0.2,
            density: SNOW_DENSITY,
            hardening: 10.0,
            critical_compression: 2.5e-2,
            critical_stretch: 7.5e-3,
        }
    }
}

impl SnowMaterial {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.youngs_modulus.is_finite() && self.youngs_modulus > 0.0) {
            return Err(SimError::configuration(
                "youngs_modulus",
                format!("must be positive, got {}", self.youngs_modulus),
            ));
        }
        if !(0.0..0.5).contains(&self.poisson_ratio) {
            return Err(SimError::configuration(
                "poisson_ratio",
                format!("must be in [0, 0.5), got {}", self.poisson_ratio),
            ));
        }
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(SimError::configuration(
                "density",
                format!("must be positive, got {}", self.density),
            ));
        }
        if !(self.hardening.is_finite() && self.hardening >= 0.0) {
            return Err(SimError::configuration(
                "hardening",
                format!("must be non-negative, got {}", self.hardening),
            ));
        }
        if !(0.0..1.0).contains(&self.critical_compression) {
            return Err(SimError::configuration(
                "critical_compression",
                format!("must be in [0, 1), got {}", self.critical_compression),
            ));
        }
        if !(self.critical_stretch.is_finite() && self.critical_stretch >= 0.0) {
            return Err(SimError::configuration(
                "critical_stretch",
                format!("must be non-negative, got {}", self.critical_stretch),
            ));
        }
        Ok(())
    }

    /// Lame parameters (lambda, mu).
    pub fn lame_lambda_mu(&self) -> (f32, f32) {
        let (e, nu) = (self.youngs_modulus, self.poisson_ratio);
        let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let mu = e / (2.0 * (1.0 + nu));
        (lambda, mu)
    }

    /// Hardening factor for plastic volume ratio `jp`.
    #[inline]
    pub fn hardening_factor(&self, jp: f32) -> f32 {
        (self.hardening * (1.0 - jp)).exp().clamp(0.1, 5.0)
    }

    /// Kirchhoff stress of elastic deformation `f` at plastic volume ratio `jp`.
    pub fn kirchhoff_stress(&self, f: Mat2, jp: f32) -> Mat2 {
        let (lambda, mu) = self.lame_lambda_mu();
        let h = self.hardening_factor(jp);
        let (mu, lambda) = (mu * h, lambda * h);

        let (r, _) = polar_decompose2(f);
        let j = f.determinant();
        (f - r) * f.transpose() * (2.0 * mu) + Mat2::IDENTITY * (lambda * j * (j - 1.0))
    }

    /// Clamp the singular values of `f` into the elastic range. Returns the
    /// projected matrix and the ratio `det(f) / det(projected)` that moves into
    /// the plastic part.
    pub fn project_plastic(&self, f: Mat2) -> (Mat2, f32) {
        let (u, sigma, v) = svd2(f);
        let lo = 1.0 - self.critical_compression;
        let hi = 1.0 + self.critical_stretch;
        let clamped = sigma.clamp(Vec2::splat(lo), Vec2::splat(hi));
        let projected = u * Mat2::from_diagonal(clamped) * v.transpose();
        (projected, (sigma.x * sigma.y) / (clamped.x * clamped.y))
    }
}

/// Build a matrix from rows.
#[inline]
fn from_rows(r0: [f32; 2], r1: [f32; 2]) -> Mat2 {
    Mat2::from_cols(Vec2::new(r0[0], r1[0]), Vec2::new(r0[1], r1[1]))
}

/// Element at row `r`, column `c`.
#[inline]
fn at(m: &Mat2, r: usize, c: usize) -> f32 {
    m.col(c)[r]
}

/// Polar decomposition `m = R S` with `R` a rotation.
pub fn polar_decompose2(m: Mat2) -> (Mat2, Mat2) {
    let x = at(&m, 0, 0) + at(&m, 1, 1);
    let y = at(&m, 1, 0) - at(&m, 0, 1);
    let norm = (x * x + y * y).sqrt();
    if norm <= f32::EPSILON {
        return (Mat2::IDENTITY, m);
    }
    let (c, s) = (x / norm, y / norm);
    let r = from_rows([c, -s], [s, c]);
    (r, r.transpose() * m)
}

/// Singular value decomposition `m = U diag(sigma) V^T` with `U` and `V`
/// rotations and `sigma.x >= sigma.y`. `sigma.y` is negative when
/// `det(m) < 0`.
pub fn svd2(m: Mat2) -> (Mat2, Vec2, Mat2) {
    let (r, s) = polar_decompose2(m);
    let (s00, s01, s11) = (at(&s, 0, 0), at(&s, 0, 1), at(&s, 1, 1));

    let (c, sn, mut s1, mut s2) = if s01.abs() < 1e-6 {
        (1.0, 0.0, s00, s11)
    } else {
        let tau = 0.5 * (s00 - s11);
        let w = (tau * tau + s01 * s01).sqrt();
        let t = if tau > 0.0 { s01 / (tau + w) } else { s01 / (tau - w) };
        let c = 1.0 / (t * t + 1.0).sqrt();
        let sn = -t * c;
        (
            c,
            sn,
            c * c * s00 - 2.0 * c * sn * s01 + sn * sn * s11,
            sn * sn * s00 + 2.0 * c * sn * s01 + c * c * s11,
        )
    };

    let mut v = from_rows([c, sn], [-sn, c]);
    if s1 < s2 {
        std::mem::swap(&mut s1, &mut s2);
        v = from_rows([-sn, c], [-c, -sn]);
    }
    (r * v, Vec2::new(s1, s2), v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn assert_mat_close(a: Mat2, b: Mat2, tol: f32) {
        assert!(
            (a - b).to_cols_array().iter().all(|d| d.abs() < tol),
            "{:?} != {:?}",
            a,
            b
        );
    }

    fn is_rotation(m: Mat2) -> bool {
        (m.determinant() - 1.0).abs() < 1e-4
            && (m.transpose() * m - Mat2::IDENTITY)
                .to_cols_array()
                .iter()
                .all(|d| d.abs() < 1e-4)
    }

    #[test]
    fn test_lame_parameters() {
        let material = SnowMaterial {
            youngs_modulus: 1000.0,
            poisson_ratio: 0.25,
            ..SnowMaterial::default()
        };
        let (lambda, mu) = material.lame_lambda_mu();
        assert!((lambda - 400.0).abs() < 1e-3);
        assert!((mu - 400.0).abs() < 1e-3);
    }

    #[test]
    fn test_polar_and_svd_reconstruct() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let m = Mat2::from_cols_array(&[
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
            ]);

            let (r, s) = polar_decompose2(m);
            assert!(is_rotation(r));
            assert_mat_close(r * s, m, 1e-4);
            assert!((at(&s, 0, 1) - at(&s, 1, 0)).abs() < 1e-4);

            let (u, sigma, v) = svd2(m);
            assert!(is_rotation(u));
            assert!(is_rotation(v));
            assert!(sigma.x >= sigma.y);
            assert_mat_close(u * Mat2::from_diagonal(sigma) * v.transpose(), m, 1e-3);
        }
    }

    #[test]
    fn test_svd_of_diagonal_and_rotation() {
        let (_, sigma, _) = svd2(Mat2::from_diagonal(Vec2::new(0.5, 2.0)));
        assert!((sigma - Vec2::new(2.0, 0.5)).length() < 1e-6);

        let rotation = Mat2::from_angle(0.7);
        let (u, sigma, v) = svd2(rotation);
        assert!((sigma - Vec2::ONE).length() < 1e-5);
        assert_mat_close(u * v.transpose(), rotation, 1e-5);
    }

    #[test]
    fn test_rest_state_is_stress_free() {
        let material = SnowMaterial::default();
        assert_mat_close(material.kirchhoff_stress(Mat2::IDENTITY, 1.0), Mat2::ZERO, 1e-6);
        let rotated = material.kirchhoff_stress(Mat2::from_angle(0.3), 1.0);
        assert_mat_close(rotated, Mat2::ZERO, 0.5);
        // Compression pushes back
        let squeezed = material.kirchhoff_stress(Mat2::from_diagonal(Vec2::splat(0.9)), 1.0);
        assert!(at(&squeezed, 0, 0) < 0.0);
    }

    #[test]
    fn test_plastic_projection() {
        let material = SnowMaterial::default();
        let (projected, ratio) = material.project_plastic(Mat2::IDENTITY);
        assert_mat_close(projected, Mat2::IDENTITY, 1e-6);
        assert!((ratio - 1.0).abs() < 1e-6);

        let squeezed = Mat2::from_diagonal(Vec2::new(0.9, 1.0));
        let (projected, ratio) = material.project_plastic(squeezed);
        let lo = 1.0 - material.critical_compression;
        assert!((projected.determinant() - lo).abs() < 1e-5);
        assert!((ratio - 0.9 / lo).abs() < 1e-5);
    }

    #[test]
    fn test_material_validation() {
        SnowMaterial::default().validate().unwrap();
        let bad = SnowMaterial {
            poisson_ratio: 0.5,
            ..SnowMaterial::default()
        };
        assert!(bad.validate().unwrap_err().is_configuration());
        let bad = SnowMaterial {
            youngs_modulus: 0.0,
            ..SnowMaterial::default()
        };
        assert!(bad.validate().is_err());
    }
}
