// config.rs
// Scenario configuration loaded from a TOML file, validated before any
// simulation state is built.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    pub domain: DomainConfig,
    pub time: TimeConfig,
    pub solver: SolverConfig,
    #[serde(default)]
    pub sphere: Option<SphereConfig>,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    /// RNG seed; a fixed seed reproduces a run exactly.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Node counts per axis, at least 2 each.
    pub nodes: [usize; 3],
    /// Mesh origin [m].
    pub origin: [f64; 3],
    /// Diagonally opposite corner [m].
    pub corner: [f64; 3],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Time step [s].
    pub dt: f64,
    /// Total step budget.
    pub steps: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    pub max_iterations: u32,
    pub tolerance: f64,
    /// Reference potential [V] for the Boltzmann electron term.
    #[serde(default)]
    pub phi0: f64,
    /// Reference electron temperature [eV].
    pub te0: f64,
    /// Reference electron density [1/m^3].
    pub n0: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SphereConfig {
    pub center: [f64; 3],
    pub radius: f64,
    /// Fixed surface potential [V].
    pub potential: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    /// Particle mass in atomic mass units.
    pub mass_amu: f64,
    /// Particle charge in elementary charges.
    pub charge_e: f64,
    /// Macro-particle weight, real particles per simulated one.
    pub weight: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name of the species this source feeds.
    pub species: String,
    /// Injected number density [1/m^3].
    pub density: f64,
    /// Drift speed along the beam axis [m/s].
    pub velocity: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write field snapshots every this many steps (0 disables them).
    #[serde(default = "default_fields_every")]
    pub fields_every: u32,
    /// Directory for field snapshots.
    #[serde(default = "default_fields_dir")]
    pub fields_dir: String,
    /// Per-step runtime diagnostics CSV.
    #[serde(default = "default_diag_path")]
    pub diag_path: String,
    /// Checkpoint written at the end of the run; `.json` selects JSON,
    /// anything else gzipped binary.
    #[serde(default)]
    pub checkpoint_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fields_every: default_fields_every(),
            fields_dir: default_fields_dir(),
            diag_path: default_diag_path(),
            checkpoint_path: None,
        }
    }
}

fn default_fields_every() -> u32 {
    20
}

fn default_fields_dir() -> String {
    "results".to_string()
}

fn default_diag_path() -> String {
    "runtime_diags.csv".to_string()
}

fn default_seed() -> u64 {
    0
}

impl SimConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let content = fs::read_to_string(path)?;
        let config: SimConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast checks; a configuration that passes builds a physically
    /// sane scenario, anything else would silently corrupt the physics.
    pub fn validate(&self) -> Result<(), SimError> {
        for (axis, &n) in ["x", "y", "z"].iter().zip(self.domain.nodes.iter()) {
            if n < 2 {
                return Err(SimError::config(format!(
                    "domain needs at least 2 nodes along {axis}, got {n}"
                )));
            }
        }
        for axis in 0..3 {
            if self.domain.corner[axis] <= self.domain.origin[axis] {
                return Err(SimError::config(format!(
                    "domain corner must exceed origin along axis {axis}"
                )));
            }
        }
        if self.time.dt <= 0.0 {
            return Err(SimError::config(format!("time step must be positive, got {}", self.time.dt)));
        }
        if self.time.steps == 0 {
            return Err(SimError::config("step budget must be at least 1"));
        }
        if self.solver.max_iterations == 0 {
            return Err(SimError::config("solver needs at least one iteration"));
        }
        if self.solver.tolerance <= 0.0 {
            return Err(SimError::config(format!(
                "solver tolerance must be positive, got {}",
                self.solver.tolerance
            )));
        }
        if self.species.is_empty() {
            return Err(SimError::config("at least one species is required"));
        }
        for sp in &self.species {
            if sp.mass_amu <= 0.0 || sp.weight <= 0.0 {
                return Err(SimError::config(format!(
                    "species {} needs positive mass and weight",
                    sp.name
                )));
            }
        }
        for src in &self.sources {
            if !self.species.iter().any(|sp| sp.name == src.species) {
                return Err(SimError::config(format!(
                    "source refers to unknown species {}",
                    src.species
                )));
            }
            if src.density < 0.0 {
                return Err(SimError::config("source density must be non-negative"));
            }
        }
        if let Some(sphere) = &self.sphere {
            if sphere.radius <= 0.0 {
                return Err(SimError::config(format!(
                    "sphere radius must be positive, got {}",
                    sphere.radius
                )));
            }
        }
        Ok(())
    }
}

impl Default for SimConfig {
    /// The stock scenario: a cold O+ beam entering a grounded inlet and
    /// flowing past a charged sphere.
    fn default() -> Self {
        Self {
            domain: DomainConfig {
                nodes: [21, 21, 41],
                origin: [-0.1, -0.1, 0.0],
                corner: [0.1, 0.1, 0.4],
            },
            time: TimeConfig { dt: 1e-7, steps: 400 },
            solver: SolverConfig {
                max_iterations: 10_000,
                tolerance: 1e-4,
                phi0: 0.0,
                te0: 1.5,
                n0: 1e10,
            },
            sphere: Some(SphereConfig {
                center: [0.0, 0.0, 0.15],
                radius: 0.05,
                potential: -100.0,
            }),
            species: vec![SpeciesConfig {
                name: "O+".to_string(),
                mass_amu: 16.0,
                charge_e: 1.0,
                weight: 1e2,
            }],
            sources: vec![SourceConfig {
                species: "O+".to_string(),
                density: 1e10,
                velocity: 7000.0,
            }],
            output: OutputConfig::default(),
            seed: default_seed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = SimConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: SimConfig = toml::from_str(&text).unwrap();
        back.validate().unwrap();
        assert_eq!(back.domain.nodes, cfg.domain.nodes);
        assert_eq!(back.species[0].name, "O+");
    }

    #[test]
    fn degenerate_domain_is_rejected() {
        let mut cfg = SimConfig::default();
        cfg.domain.corner[1] = cfg.domain.origin[1];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_source_species_is_rejected() {
        let mut cfg = SimConfig::default();
        cfg.sources[0].species = "Xe+".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn minimal_toml_uses_output_defaults() {
        let text = r#"
            seed = 7

            [domain]
            nodes = [11, 11, 21]
            origin = [-0.05, -0.05, 0.0]
            corner = [0.05, 0.05, 0.2]

            [time]
            dt = 1e-7
            steps = 10

            [solver]
            max_iterations = 4000
            tolerance = 1e-5
            te0 = 1.5
            n0 = 1e10

            [[species]]
            name = "O+"
            mass_amu = 16.0
            charge_e = 1.0
            weight = 100.0

            [[sources]]
            species = "O+"
            density = 1e10
            velocity = 7000.0
        "#;
        let cfg: SimConfig = toml::from_str(text).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.output.fields_every, 20);
        assert_eq!(cfg.seed, 7);
        assert!(cfg.sphere.is_none());
        assert_eq!(cfg.solver.phi0, 0.0);
    }
}
