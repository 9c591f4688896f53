// species.rs
// One physical particle species: its macro-particles, their motion under the
// mesh electric field, the wall policy, and number-density deposition.

use rand::Rng;
use serde::{Deserialize, Serialize};
use ultraviolet::DVec3;

use crate::field::Field;
use crate::mesh::Mesh;

/// A macro-particle: one simulated particle standing for `mpw0` real ones.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Particle {
    pub pos: DVec3,
    pub vel: DVec3,
}

/// Boundary event counters. These are expected steady-state behavior, not
/// failures; they are reported by the diagnostics each step.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct WallTally {
    /// Removed after crossing the exit plane.
    pub exited: u64,
    /// Removed on contact with the fixed-potential object.
    pub collected: u64,
    /// Removed after flowing back through the inlet plane.
    pub absorbed: u64,
    /// Diffusely re-emitted from a transverse wall.
    pub reflected: u64,
}

pub struct Species {
    pub name: String,
    /// Particle mass [kg].
    pub mass: f64,
    /// Particle charge [C].
    pub charge: f64,
    /// Nominal macro-particle weight, real particles per simulated one.
    pub mpw0: f64,

    pub particles: Vec<Particle>,
    /// Number density [1/m^3], fully recomputed each step.
    pub den: Field<f64>,
    pub tally: WallTally,
}

impl Species {
    pub fn new(name: impl Into<String>, mass: f64, charge: f64, mpw0: f64, mesh: &Mesh) -> Self {
        Self {
            name: name.into(),
            mass,
            charge,
            mpw0,
            particles: Vec::new(),
            den: Field::new(mesh.ni, mesh.nj, mesh.nk),
            tally: WallTally::default(),
        }
    }

    pub fn add_particle(&mut self, pos: DVec3, vel: DVec3) {
        self.particles.push(Particle { pos, vel });
    }

    /// Leapfrog push of every particle over one time step, followed by the
    /// boundary policy. Removal uses swap-remove so the pass stays
    /// index-stable while the collection shrinks.
    pub fn advance<R: Rng>(&mut self, mesh: &Mesh, rng: &mut R) {
        let dt = mesh.dt();
        let qm_dt = self.charge / self.mass * dt;

        let mut p = 0;
        while p < self.particles.len() {
            let part = &mut self.particles[p];

            // gather E at the pre-move position, which is inside by invariant
            let lc = mesh.x_to_l(part.pos);
            let ef_part = mesh.ef.gather(lc);
            part.vel += ef_part * qm_dt;
            part.pos += part.vel * dt;

            if mesh.in_sphere(part.pos) {
                self.tally.collected += 1;
                self.particles.swap_remove(p);
                continue;
            }
            if mesh.passed_through(part.pos) {
                self.tally.exited += 1;
                self.particles.swap_remove(p);
                continue;
            }
            if !mesh.in_bounds(part.pos) {
                // backflow out through the inlet plane
                self.tally.absorbed += 1;
                self.particles.swap_remove(p);
                continue;
            }
            if let Some(normal) = mesh.wall_normal(part.pos) {
                // specular position correction, diffuse velocity resampling
                let speed = part.vel.mag();
                reflect_transverse(&mut part.pos, mesh.x0(), mesh.xm());
                part.vel = mesh.wall_diffuse_vector(rng, normal) * speed;
                self.tally.reflected += 1;
            }
            p += 1;
        }
    }

    /// Full recompute of the number-density field: scatter each particle's
    /// weight with the same trilinear weights the force gather uses, then
    /// divide by node volume.
    pub fn compute_number_density(&mut self, mesh: &Mesh) {
        self.den.fill(0.0);
        for part in &self.particles {
            self.den.scatter(mesh.x_to_l(part.pos), self.mpw0);
        }
        self.den.divide_by(&mesh.node_vol);
    }

    /// Total kinetic energy of the real population this species stands for.
    pub fn kinetic_energy(&self) -> f64 {
        let v2: f64 = self.particles.iter().map(|p| p.vel.mag_sq()).sum();
        0.5 * self.mass * self.mpw0 * v2
    }
}

/// Folds transverse coordinates back inside the bounding box by mirror
/// reflection about whichever wall plane was crossed.
fn reflect_transverse(pos: &mut DVec3, x0: DVec3, xm: DVec3) {
    if pos.x < x0.x {
        pos.x = 2.0 * x0.x - pos.x;
    } else if pos.x > xm.x {
        pos.x = 2.0 * xm.x - pos.x;
    }
    if pos.y < x0.y {
        pos.y = 2.0 * x0.y - pos.y;
    } else if pos.y > xm.y {
        pos.y = 2.0 * xm.y - pos.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{AMU, QE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_mesh() -> Mesh {
        let mut mesh = Mesh::new(5, 5, 9);
        mesh.set_extents(DVec3::new(-0.1, -0.1, 0.0), DVec3::new(0.1, 0.1, 0.4))
            .unwrap();
        mesh.set_time(1e-7, 10);
        mesh
    }

    #[test]
    fn deposition_conserves_total_weight() {
        let mesh = test_mesh();
        let mut sp = Species::new("O+", 16.0 * AMU, QE, 200.0, &mesh);
        sp.add_particle(DVec3::new(0.013, -0.042, 0.11), DVec3::zero());
        sp.add_particle(DVec3::new(-0.09, 0.08, 0.35), DVec3::zero());
        sp.add_particle(DVec3::new(0.0, 0.0, 0.0), DVec3::zero());
        sp.compute_number_density(&mesh);

        let mut integral = 0.0;
        for (d, v) in sp.den.data().iter().zip(mesh.node_vol.data().iter()) {
            integral += d * v;
        }
        let expect = 3.0 * sp.mpw0;
        assert!((integral - expect).abs() < 1e-9 * expect);
    }

    #[test]
    fn charge_density_integrates_to_total_charge() {
        let mut mesh = test_mesh();
        let mut ions = Species::new("O+", 16.0 * AMU, QE, 150.0, &mesh);
        let mut neutrals = Species::new("O", 16.0 * AMU, 0.0, 500.0, &mesh);
        for n in 0..10 {
            let z = 0.02 + 0.03 * n as f64;
            ions.add_particle(DVec3::new(0.01, 0.0, z), DVec3::zero());
            neutrals.add_particle(DVec3::new(-0.01, 0.02, z), DVec3::zero());
        }
        ions.compute_number_density(&mesh);
        neutrals.compute_number_density(&mesh);
        let species = vec![ions, neutrals];
        mesh.compute_charge_density(&species);

        let mut integral = 0.0;
        for (r, v) in mesh.rho.data().iter().zip(mesh.node_vol.data().iter()) {
            integral += r * v;
        }
        // neutrals are skipped, only the ion charge remains
        let expect = QE * 150.0 * 10.0;
        assert!((integral - expect).abs() < 1e-9 * expect);
    }

    #[test]
    fn uniform_field_matches_discrete_constant_acceleration() {
        let mut mesh = test_mesh();
        mesh.ef.fill(DVec3::new(0.0, 0.0, 1000.0));
        let mut sp = Species::new("O+", 16.0 * AMU, QE, 1.0, &mesh);
        let x0 = DVec3::new(0.0, 0.0, 0.01);
        let v0 = DVec3::new(0.0, 0.0, 50.0);
        sp.add_particle(x0, v0);

        let dt = mesh.dt();
        let a = QE / (16.0 * AMU) * 1000.0;
        let mut rng = StdRng::seed_from_u64(1);
        let n_steps = 20;
        for _ in 0..n_steps {
            sp.advance(&mesh, &mut rng);
        }
        assert_eq!(sp.particles.len(), 1);
        let p = sp.particles[0];

        // v_n = v0 + n a dt, x_n = x0 + n v0 dt + a dt^2 n(n+1)/2
        let n = n_steps as f64;
        let vz = v0.z + n * a * dt;
        let z = x0.z + n * v0.z * dt + a * dt * dt * n * (n + 1.0) / 2.0;
        assert!((p.vel.z - vz).abs() < 1e-9 * vz.abs());
        assert!((p.pos.z - z).abs() < 1e-12);
    }

    #[test]
    fn wall_hit_keeps_speed_and_turns_inward() {
        let mut mesh = test_mesh();
        mesh.set_time(1e-4, 10);
        let mut sp = Species::new("O+", 16.0 * AMU, QE, 1.0, &mesh);
        // aimed straight at the y-max wall, crossing within one step
        sp.add_particle(DVec3::new(0.0, 0.095, 0.2), DVec3::new(0.0, 100.0, 0.0));
        let speed = 100.0;

        let mut rng = StdRng::seed_from_u64(3);
        sp.advance(&mesh, &mut rng);

        assert_eq!(sp.particles.len(), 1);
        assert_eq!(sp.tally.reflected, 1);
        let p = sp.particles[0];
        assert!(p.pos.y <= 0.1 && p.pos.y >= -0.1);
        assert!((p.vel.mag() - speed).abs() < 1e-9 * speed);
        // inward normal at y-max is -y
        assert!(p.vel.dot(DVec3::new(0.0, -1.0, 0.0)) >= 0.0);
    }

    #[test]
    fn exit_plane_removes_and_counts() {
        let mut mesh = test_mesh();
        mesh.set_time(1e-4, 10);
        let mut sp = Species::new("O+", 16.0 * AMU, QE, 1.0, &mesh);
        sp.add_particle(DVec3::new(0.0, 0.0, 0.395), DVec3::new(0.0, 0.0, 100.0));
        sp.add_particle(DVec3::new(0.0, 0.0, 0.2), DVec3::zero());

        let mut rng = StdRng::seed_from_u64(5);
        sp.advance(&mesh, &mut rng);

        assert_eq!(sp.particles.len(), 1);
        assert_eq!(sp.tally.exited, 1);
        assert!((sp.particles[0].pos.z - 0.2).abs() < 1e-12);
    }

    #[test]
    fn sphere_collects_particles() {
        let mut mesh = test_mesh();
        mesh.set_time(1e-4, 10);
        mesh.add_sphere(DVec3::new(0.0, 0.0, 0.2), 0.05, 0.0);
        let mut sp = Species::new("O+", 16.0 * AMU, QE, 1.0, &mesh);
        sp.add_particle(DVec3::new(0.0, 0.0, 0.14), DVec3::new(0.0, 0.0, 200.0));

        let mut rng = StdRng::seed_from_u64(7);
        sp.advance(&mesh, &mut rng);
        assert_eq!(sp.particles.len(), 0);
        assert_eq!(sp.tally.collected, 1);
    }
}
