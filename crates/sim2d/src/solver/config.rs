//! Serializable solver configuration.
//!
//! Builders wrap these structs; validation happens in `validate()`, which
//! the builders call from their terminal `build`.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_CFL, DEFAULT_PARTICLE_MASS, DEFAULT_PARTICLE_RADIUS, GRAVITY, WATER_DENSITY,
};
use crate::error::{SimError, SimResult};
use crate::grid::{ClosedBoundaries, PressureSolverConfig};
use crate::solver::constitutive::SnowMaterial;

/// Physical and numerical parameters of the grid step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSolverParams {
    #[serde(with = "crate::serde_utils::vec2")]
    pub gravity: Vec2,
    /// Kinematic viscosity (m^2/s)
    pub viscosity: f32,
    /// Density used to convert the projection potential into pressure (kg/m^3)
    pub density: f32,
    pub pressure: PressureSolverConfig,
    pub max_cfl: f32,
    pub use_adaptive_substeps: bool,
    pub closed_boundaries: ClosedBoundaries,
    /// Layers of air faces that receive extrapolated fluid velocity.
    pub extrapolation_depth: usize,
}

impl Default for GridSolverParams {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, GRAVITY),
            viscosity: 0.0,
            density: WATER_DENSITY,
            pressure: PressureSolverConfig::default(),
            max_cfl: DEFAULT_MAX_CFL,
            use_adaptive_substeps: true,
            closed_boundaries: ClosedBoundaries::ALL,
            extrapolation_depth: 5,
        }
    }
}

impl GridSolverParams {
    pub fn validate(&self) -> SimResult<()> {
        if !self.gravity.is_finite() {
            return Err(SimError::configuration(
                "gravity",
                format!("must be finite, got {:?}", self.gravity),
            ));
        }
        if !(self.viscosity.is_finite() && self.viscosity >= 0.0) {
            return Err(SimError::configuration(
                "viscosity",
                format!("must be non-negative, got {}", self.viscosity),
            ));
        }
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(SimError::configuration(
                "density",
                format!("must be positive, got {}", self.density),
            ));
        }
        if !(self.max_cfl.is_finite() && self.max_cfl > 0.0) {
            return Err(SimError::configuration(
                "max_cfl",
                format!("must be positive, got {}", self.max_cfl),
            ));
        }
        self.pressure.validate()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> SimResult<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> SimResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Grid geometry plus grid step parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridFluidSolverConfig {
    pub resolution: [usize; 2],
    #[serde(with = "crate::serde_utils::vec2")]
    pub grid_spacing: Vec2,
    #[serde(with = "crate::serde_utils::vec2")]
    pub grid_origin: Vec2,
    pub params: GridSolverParams,
}

impl Default for GridFluidSolverConfig {
    fn default() -> Self {
        Self {
            resolution: [1, 1],
            grid_spacing: Vec2::ONE,
            grid_origin: Vec2::ZERO,
            params: GridSolverParams::default(),
        }
    }
}

impl GridFluidSolverConfig {
    pub fn validate(&self) -> SimResult<()> {
        let s = self.grid_spacing;
        if !(s.x > 0.0 && s.y > 0.0 && s.is_finite()) {
            return Err(SimError::configuration(
                "grid_spacing",
                format!("must be positive and finite, got {:?}", s),
            ));
        }
        if !self.grid_origin.is_finite() {
            return Err(SimError::configuration(
                "grid_origin",
                format!("must be finite, got {:?}", self.grid_origin),
            ));
        }
        self.params.validate()
    }

    pub fn from_json_str(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> SimResult<Self> {
        read_json(path.as_ref())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> SimResult<()> {
        write_json(self, path.as_ref())
    }
}

/// Particle-grid transfer scheme of a hybrid solver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum TransferKind {
    Pic,
    /// `ratio` of FLIP in the FLIP/PIC blend, in `[0, 1]`.
    Flip {
        ratio: f32,
    },
    Apic,
    Mpm,
}

impl Default for TransferKind {
    fn default() -> Self {
        Self::Flip { ratio: 0.95 }
    }
}

/// Everything needed to build a [`crate::solver::HybridSolver2`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSolverConfig {
    pub grid: GridFluidSolverConfig,
    pub transfer: TransferKind,
    /// Used by [`TransferKind::Mpm`] only.
    pub material: SnowMaterial,
    pub particle_radius: f32,
    pub particle_mass: f32,
    /// Normal restitution of particle-collider contacts, in `[0, 1]`.
    pub restitution: f32,
}

impl Default for HybridSolverConfig {
    fn default() -> Self {
        Self {
            grid: GridFluidSolverConfig::default(),
            transfer: TransferKind::default(),
            material: SnowMaterial::default(),
            particle_radius: DEFAULT_PARTICLE_RADIUS,
            particle_mass: DEFAULT_PARTICLE_MASS,
            restitution: 0.0,
        }
    }
}

impl HybridSolverConfig {
    pub fn validate(&self) -> SimResult<()> {
        self.grid.validate()?;
        if let TransferKind::Flip { ratio } = self.transfer {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(SimError::configuration(
                    "transfer.ratio",
                    format!("must be in [0, 1], got {}", ratio),
                ));
            }
        }
        if self.transfer == TransferKind::Mpm {
            self.material.validate()?;
        }
        if !(self.particle_radius.is_finite() && self.particle_radius >= 0.0) {
            return Err(SimError::configuration(
                "particle_radius",
                format!("must be non-negative, got {}", self.particle_radius),
            ));
        }
        if !(self.particle_mass.is_finite() && self.particle_mass > 0.0) {
            return Err(SimError::configuration(
                "particle_mass",
                format!("must be positive, got {}", self.particle_mass),
            ));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::configuration(
                "restitution",
                format!("must be in [0, 1], got {}", self.restitution),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> SimResult<Self> {
        read_json(path.as_ref())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> SimResult<()> {
        write_json(self, path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PressureSolverKind;

    #[test]
    fn test_defaults_are_valid() {
        GridFluidSolverConfig::default().validate().unwrap();
        HybridSolverConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "resolution": [4, 4],
            "grid_spacing": {"x": 0.5, "y": 0.5},
            "params": {"viscosity": 0.01, "pressure": {"kind": "Jacobi", "max_iterations": 50, "tolerance": 0.001}}
        }"#;
        let config = GridFluidSolverConfig::from_json_str(json).unwrap();
        assert_eq!(config.resolution, [4, 4]);
        assert_eq!(config.grid_spacing, Vec2::splat(0.5));
        assert_eq!(config.grid_origin, Vec2::ZERO);
        assert_eq!(config.params.viscosity, 0.01);
        assert_eq!(config.params.pressure.kind, PressureSolverKind::Jacobi);
        assert_eq!(config.params.gravity, Vec2::new(0.0, GRAVITY));
    }

    #[test]
    fn test_hybrid_config_json() {
        let json = r#"{"transfer": {"scheme": "flip", "ratio": 0.9}, "restitution": 0.5}"#;
        let config = HybridSolverConfig::from_json_str(json).unwrap();
        assert_eq!(config.transfer, TransferKind::Flip { ratio: 0.9 });
        assert_eq!(config.restitution, 0.5);

        let text = serde_json::to_string(&HybridSolverConfig {
            transfer: TransferKind::Mpm,
            ..HybridSolverConfig::default()
        })
        .unwrap();
        assert!(text.contains(r#""scheme":"mpm""#));
        let back = HybridSolverConfig::from_json_str(&text).unwrap();
        assert_eq!(back.transfer, TransferKind::Mpm);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = GridFluidSolverConfig::default();
        config.grid_spacing = Vec2::new(1.0, 0.0);
        assert!(config.validate().unwrap_err().is_configuration());

        let mut hybrid = HybridSolverConfig::default();
        hybrid.transfer = TransferKind::Flip { ratio: 1.5 };
        assert!(hybrid.validate().is_err());

        let mut hybrid = HybridSolverConfig::default();
        hybrid.grid.params.density = -1.0;
        assert!(hybrid.validate().is_err());

        assert!(GridFluidSolverConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("sim2d_config_{}.json", std::process::id()));
        let mut config = HybridSolverConfig::default();
        config.grid.resolution = [16, 8];
        config.save_json(&path).unwrap();
        let loaded = HybridSolverConfig::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);

        let missing = HybridSolverConfig::load_json(path.with_extension("missing"));
        assert!(matches!(missing, Err(SimError::Io(_))));
    }
}
