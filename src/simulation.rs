// simulation.rs
// Owns the coupled field/particle state and runs one full PIC step:
// inject -> move -> deposit -> aggregate charge -> solve -> differentiate.

use rand::rngs::StdRng;

use crate::mesh::Mesh;
use crate::solver::{PotentialSolver, SolveStats};
use crate::source::ColdBeamSource;
use crate::species::Species;

pub struct Simulation {
    pub mesh: Mesh,
    pub species: Vec<Species>,
    pub sources: Vec<ColdBeamSource>,
    pub solver: PotentialSolver,
    /// Outcome of the most recent solve, surfaced by the diagnostics.
    pub last_solve: SolveStats,
    rng: StdRng,
}

impl Simulation {
    pub fn new(
        mesh: Mesh,
        species: Vec<Species>,
        sources: Vec<ColdBeamSource>,
        solver: PotentialSolver,
        rng: StdRng,
    ) -> Self {
        Self {
            mesh,
            species,
            sources,
            solver,
            last_solve: SolveStats { iterations: 0, residual: f64::MAX, converged: false },
            rng,
        }
    }

    /// Solves the initial potential and field before the first step, so the
    /// first particle push sees a consistent field.
    pub fn initialize(&mut self) {
        self.last_solve = self.solver.solve(&mut self.mesh);
        self.solver.compute_ef(&mut self.mesh);
    }

    /// One full time step. Diagnostics may read any field once this
    /// returns; everything is updated and consistent.
    pub fn step(&mut self) {
        for src in &mut self.sources {
            src.sample(&mut self.species[src.species], &self.mesh, &mut self.rng);
        }

        for sp in &mut self.species {
            sp.advance(&self.mesh, &mut self.rng);
            sp.compute_number_density(&self.mesh);
        }

        self.mesh.compute_charge_density(&self.species);
        self.last_solve = self.solver.solve(&mut self.mesh);
        self.solver.compute_ef(&mut self.mesh);
    }

    pub fn total_particles(&self) -> usize {
        self.species.iter().map(|sp| sp.particles.len()).sum()
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
