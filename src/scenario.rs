// scenario.rs
// Turns a validated configuration into a ready-to-run simulation.
// Everything here happens once, before the first solve.

use rand::rngs::StdRng;
use rand::SeedableRng;
use ultraviolet::DVec3;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::mesh::Mesh;
use crate::simulation::Simulation;
use crate::solver::PotentialSolver;
use crate::source::ColdBeamSource;
use crate::species::Species;
use crate::units::{AMU, QE};

fn vec3(a: [f64; 3]) -> DVec3 {
    DVec3::new(a[0], a[1], a[2])
}

pub fn build(cfg: &SimConfig) -> Result<Simulation, SimError> {
    cfg.validate()?;

    let [ni, nj, nk] = cfg.domain.nodes;
    let mut mesh = Mesh::new(ni, nj, nk);
    mesh.set_extents(vec3(cfg.domain.origin), vec3(cfg.domain.corner))?;
    mesh.set_time(cfg.time.dt, cfg.time.steps);

    if let Some(sphere) = &cfg.sphere {
        mesh.add_sphere(vec3(sphere.center), sphere.radius, sphere.potential);
    }
    mesh.add_inlet();

    let species: Vec<Species> = cfg
        .species
        .iter()
        .map(|sp| Species::new(&sp.name, sp.mass_amu * AMU, sp.charge_e * QE, sp.weight, &mesh))
        .collect();

    let sources = cfg
        .sources
        .iter()
        .map(|src| {
            // validated above, so the lookup cannot fail
            let index = species.iter().position(|sp| sp.name == src.species).ok_or_else(|| {
                SimError::config(format!("source refers to unknown species {}", src.species))
            })?;
            Ok(ColdBeamSource::new(index, src.density, src.velocity))
        })
        .collect::<Result<Vec<_>, SimError>>()?;

    let mut solver = PotentialSolver::new(cfg.solver.max_iterations, cfg.solver.tolerance);
    solver.set_reference_values(cfg.solver.phi0, cfg.solver.te0, cfg.solver.n0)?;

    let rng = StdRng::seed_from_u64(cfg.seed);
    Ok(Simulation::new(mesh, species, sources, solver, rng))
}
