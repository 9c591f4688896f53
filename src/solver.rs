// solver.rs
// Iterative potential solver: Gauss-Seidel with over-relaxation on the
// discretized Poisson equation with a Boltzmann-electron source term,
// plus the finite-difference electric field evaluation.

use log::warn;
use rayon::prelude::*;
use ultraviolet::DVec3;

use crate::error::SimError;
use crate::mesh::Mesh;
use crate::units::{EPS_0, QE};

/// Over-relaxation factor for the Gauss-Seidel sweep.
const SOR_OMEGA: f64 = 1.4;
/// Residual is evaluated every this many sweeps.
const CHECK_INTERVAL: u32 = 25;

/// Outcome of one `solve` call. Non-convergence is recoverable: the mesh
/// keeps the last iterate and the simulation continues on a degraded field.
#[derive(Clone, Copy, Debug)]
pub struct SolveStats {
    pub iterations: u32,
    pub residual: f64,
    pub converged: bool,
}

pub struct PotentialSolver {
    max_it: u32,
    tolerance: f64,

    /// Reference potential [V] of the quasi-neutral electron term.
    phi0: f64,
    /// Reference electron temperature [eV].
    te0: f64,
    /// Reference electron density [1/m^3]; zero disables the term.
    n0: f64,
}

impl PotentialSolver {
    pub fn new(max_it: u32, tolerance: f64) -> Self {
        Self { max_it, tolerance, phi0: 0.0, te0: 1.0, n0: 0.0 }
    }

    /// Configures the Boltzmann electron term; call before the first solve.
    pub fn set_reference_values(&mut self, phi0: f64, te0: f64, n0: f64) -> Result<(), SimError> {
        if te0 <= 0.0 {
            return Err(SimError::config(format!(
                "reference electron temperature must be positive, got {te0}"
            )));
        }
        if n0 < 0.0 {
            return Err(SimError::config(format!(
                "reference electron density must be non-negative, got {n0}"
            )));
        }
        self.phi0 = phi0;
        self.te0 = te0;
        self.n0 = n0;
        Ok(())
    }

    /// Relaxes the potential toward the solution of
    /// `-lap(phi) = (rho_ion - e*n0*exp((phi-phi0)/Te)) / eps0`
    /// on free nodes. Dirichlet nodes are re-clamped from their tags and
    /// never updated; non-Dirichlet domain boundary nodes get a zero-gradient
    /// (Neumann) condition, mirroring their interior neighbor.
    pub fn solve(&self, mesh: &mut Mesh) -> SolveStats {
        let (ni, nj, nk) = (mesh.ni, mesh.nj, mesh.nk);
        let dh = mesh.dh();
        let idx2 = 1.0 / (dh.x * dh.x);
        let idy2 = 1.0 / (dh.y * dh.y);
        let idz2 = 1.0 / (dh.z * dh.z);
        let denom = 2.0 * (idx2 + idy2 + idz2);

        // the node tags are the source of truth for clamped values
        for flat in 0..mesh.node_kind.node_count() {
            if let Some(phi) = mesh.node_kind.data()[flat].fixed_potential() {
                mesh.phi.data_mut()[flat] = phi;
            }
        }

        let mut residual = f64::MAX;
        let mut iterations = 0;
        let mut converged = false;

        for it in 1..=self.max_it {
            iterations = it;
            for i in 0..ni {
                for j in 0..nj {
                    for k in 0..nk {
                        if !mesh.node_kind[(i, j, k)].is_free() {
                            continue;
                        }
                        if i == 0 {
                            mesh.phi[(i, j, k)] = mesh.phi[(i + 1, j, k)];
                        } else if i == ni - 1 {
                            mesh.phi[(i, j, k)] = mesh.phi[(i - 1, j, k)];
                        } else if j == 0 {
                            mesh.phi[(i, j, k)] = mesh.phi[(i, j + 1, k)];
                        } else if j == nj - 1 {
                            mesh.phi[(i, j, k)] = mesh.phi[(i, j - 1, k)];
                        } else if k == 0 {
                            mesh.phi[(i, j, k)] = mesh.phi[(i, j, k + 1)];
                        } else if k == nk - 1 {
                            mesh.phi[(i, j, k)] = mesh.phi[(i, j, k - 1)];
                        } else {
                            let phi_here = mesh.phi[(i, j, k)];
                            let b = self.effective_rho(mesh.rho[(i, j, k)], phi_here);
                            let phi_new = (b
                                + idx2 * (mesh.phi[(i - 1, j, k)] + mesh.phi[(i + 1, j, k)])
                                + idy2 * (mesh.phi[(i, j - 1, k)] + mesh.phi[(i, j + 1, k)])
                                + idz2 * (mesh.phi[(i, j, k - 1)] + mesh.phi[(i, j, k + 1)]))
                                / denom;
                            mesh.phi[(i, j, k)] = phi_here + SOR_OMEGA * (phi_new - phi_here);
                        }
                    }
                }
            }

            if it % CHECK_INTERVAL == 0 {
                residual = self.residual_norm(mesh, idx2, idy2, idz2, denom);
                if residual < self.tolerance {
                    converged = true;
                    break;
                }
            }
        }

        if !converged {
            residual = self.residual_norm(mesh, idx2, idy2, idz2, denom);
            converged = residual < self.tolerance;
            if !converged {
                warn!(
                    "potential solver did not converge: residual {residual:.3e} after {iterations} iterations (tolerance {:.3e})",
                    self.tolerance
                );
            }
        }

        SolveStats { iterations, residual, converged }
    }

    /// Charge density with the Boltzmann electron response folded in, over
    /// the permittivity.
    fn effective_rho(&self, rho_ion: f64, phi: f64) -> f64 {
        (rho_ion - QE * self.n0 * ((phi - self.phi0) / self.te0).exp()) / EPS_0
    }

    /// L2 norm of the discretized equation error over free interior nodes.
    fn residual_norm(&self, mesh: &Mesh, idx2: f64, idy2: f64, idz2: f64, denom: f64) -> f64 {
        let (ni, nj, nk) = (mesh.ni, mesh.nj, mesh.nk);
        let mut sum = 0.0;
        for i in 1..ni - 1 {
            for j in 1..nj - 1 {
                for k in 1..nk - 1 {
                    if !mesh.node_kind[(i, j, k)].is_free() {
                        continue;
                    }
                    let b = self.effective_rho(mesh.rho[(i, j, k)], mesh.phi[(i, j, k)]);
                    let r = -mesh.phi[(i, j, k)] * denom
                        + b
                        + idx2 * (mesh.phi[(i - 1, j, k)] + mesh.phi[(i + 1, j, k)])
                        + idy2 * (mesh.phi[(i, j - 1, k)] + mesh.phi[(i, j + 1, k)])
                        + idz2 * (mesh.phi[(i, j, k - 1)] + mesh.phi[(i, j, k + 1)]);
                    sum += r * r;
                }
            }
        }
        (sum / mesh.phi.node_count() as f64).sqrt()
    }

    /// Differentiates the potential into `E = -grad(phi)`: central
    /// differences on interior nodes, second-order one-sided at the domain
    /// boundary. Call strictly after `solve`.
    pub fn compute_ef(&self, mesh: &mut Mesh) {
        let (ni, nj, nk) = (mesh.ni, mesh.nj, mesh.nk);
        let dh = mesh.dh();
        let phi = &mesh.phi;

        mesh.ef
            .data_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(flat, e)| {
                let (i, j, k) = phi.node_of(flat);

                let ex = if i == 0 {
                    -(-3.0 * phi[(i, j, k)] + 4.0 * phi[(i + 1, j, k)] - phi[(i + 2, j, k)])
                        / (2.0 * dh.x)
                } else if i == ni - 1 {
                    -(phi[(i - 2, j, k)] - 4.0 * phi[(i - 1, j, k)] + 3.0 * phi[(i, j, k)])
                        / (2.0 * dh.x)
                } else {
                    -(phi[(i + 1, j, k)] - phi[(i - 1, j, k)]) / (2.0 * dh.x)
                };

                let ey = if j == 0 {
                    -(-3.0 * phi[(i, j, k)] + 4.0 * phi[(i, j + 1, k)] - phi[(i, j + 2, k)])
                        / (2.0 * dh.y)
                } else if j == nj - 1 {
                    -(phi[(i, j - 2, k)] - 4.0 * phi[(i, j - 1, k)] + 3.0 * phi[(i, j, k)])
                        / (2.0 * dh.y)
                } else {
                    -(phi[(i, j + 1, k)] - phi[(i, j - 1, k)]) / (2.0 * dh.y)
                };

                let ez = if k == 0 {
                    -(-3.0 * phi[(i, j, k)] + 4.0 * phi[(i, j, k + 1)] - phi[(i, j, k + 2)])
                        / (2.0 * dh.z)
                } else if k == nk - 1 {
                    -(phi[(i, j, k - 2)] - 4.0 * phi[(i, j, k - 1)] + 3.0 * phi[(i, j, k)])
                        / (2.0 * dh.z)
                } else {
                    -(phi[(i, j, k + 1)] - phi[(i, j, k - 1)]) / (2.0 * dh.z)
                };

                *e = DVec3::new(ex, ey, ez);
            });
    }
}
