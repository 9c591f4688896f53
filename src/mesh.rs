// mesh.rs
// Structured simulation domain: grid geometry, field storage, time state,
// boundary-condition authoring, and wall interaction helpers.

use std::f64::consts::PI;
use std::time::Instant;

use rand::Rng;
use rayon::prelude::*;
use ultraviolet::DVec3;

use crate::error::SimError;
use crate::field::Field;
use crate::species::Species;
use crate::units::EPS_0;

/// Per-node boundary condition tag.
///
/// `Fixed` and `Inlet` nodes are Dirichlet: the solver holds them at their
/// prescribed potential (the inlet plane is grounded) and never updates them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum NodeKind {
    #[default]
    Free,
    Fixed(f64),
    Inlet,
}

impl NodeKind {
    pub fn fixed_potential(self) -> Option<f64> {
        match self {
            NodeKind::Free => None,
            NodeKind::Fixed(phi) => Some(phi),
            NodeKind::Inlet => Some(0.0),
        }
    }

    pub fn is_free(self) -> bool {
        matches!(self, NodeKind::Free)
    }
}

#[derive(Clone, Copy, Debug)]
struct Sphere {
    center: DVec3,
    rad2: f64,
}

/// The computational domain. Owns all node-centered fields, performs the
/// logical/physical coordinate mapping, and tracks simulation time.
///
/// The beam axis is z: particles are injected at the k=0 (z-minimum) plane
/// and leave through the opposite face; x and y walls are solid.
pub struct Mesh {
    pub ni: usize,
    pub nj: usize,
    pub nk: usize,

    /// Potential [V].
    pub phi: Field<f64>,
    /// Charge density [C/m^3].
    pub rho: Field<f64>,
    /// Electric field [V/m].
    pub ef: Field<DVec3>,
    /// Finite-volume integration weight per node [m^3].
    pub node_vol: Field<f64>,
    /// Dirichlet tags.
    pub node_kind: Field<NodeKind>,

    x0: DVec3,
    xm: DVec3,
    xc: DVec3,
    dh: DVec3,

    dt: f64,
    time: f64,
    ts: u32,
    num_ts: u32,

    sphere: Option<Sphere>,
    started: Instant,
}

impl Mesh {
    pub fn new(ni: usize, nj: usize, nk: usize) -> Self {
        Self {
            ni,
            nj,
            nk,
            phi: Field::new(ni, nj, nk),
            rho: Field::new(ni, nj, nk),
            ef: Field::filled(ni, nj, nk, DVec3::zero()),
            node_vol: Field::new(ni, nj, nk),
            node_kind: Field::new(ni, nj, nk),
            x0: DVec3::zero(),
            xm: DVec3::zero(),
            xc: DVec3::zero(),
            dh: DVec3::zero(),
            dt: 0.0,
            time: 0.0,
            ts: 0,
            num_ts: 0,
            sphere: None,
            started: Instant::now(),
        }
    }

    /// Sets the bounding box and recomputes spacing, centroid, and node
    /// volumes together. The extents must span a positive length per axis.
    pub fn set_extents(&mut self, x0: DVec3, xm: DVec3) -> Result<(), SimError> {
        let lx = xm.x - x0.x;
        let ly = xm.y - x0.y;
        let lz = xm.z - x0.z;
        if lx <= 0.0 || ly <= 0.0 || lz <= 0.0 {
            return Err(SimError::config(format!(
                "degenerate extents: lengths ({lx:.3e}, {ly:.3e}, {lz:.3e}) must be positive"
            )));
        }
        self.x0 = x0;
        self.xm = xm;
        self.dh = DVec3::new(
            lx / (self.ni - 1) as f64,
            ly / (self.nj - 1) as f64,
            lz / (self.nk - 1) as f64,
        );
        self.xc = (x0 + xm) * 0.5;
        self.compute_node_volumes();
        Ok(())
    }

    pub fn x0(&self) -> DVec3 {
        self.x0
    }

    pub fn xm(&self) -> DVec3 {
        self.xm
    }

    pub fn xc(&self) -> DVec3 {
        self.xc
    }

    pub fn dh(&self) -> DVec3 {
        self.dh
    }

    /// Configures the time step and step budget; does not start the clock.
    pub fn set_time(&mut self, dt: f64, num_ts: u32) {
        self.dt = dt;
        self.num_ts = num_ts;
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn ts(&self) -> u32 {
        self.ts
    }

    pub fn num_steps(&self) -> u32 {
        self.num_ts
    }

    pub fn is_last_step(&self) -> bool {
        self.ts == self.num_ts
    }

    /// Advances to the next step; the sole loop-continuation signal.
    /// Returns true for steps 1..=num_ts, so the budget is inclusive.
    pub fn advance_time(&mut self) -> bool {
        self.time += self.dt;
        self.ts += 1;
        self.ts <= self.num_ts
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Restores the clock from a checkpoint.
    pub fn restore_clock(&mut self, time: f64, ts: u32) {
        self.time = time;
        self.ts = ts;
    }

    /// Physical position to fractional node-index coordinate.
    pub fn x_to_l(&self, x: DVec3) -> DVec3 {
        DVec3::new(
            (x.x - self.x0.x) / self.dh.x,
            (x.y - self.x0.y) / self.dh.y,
            (x.z - self.x0.z) / self.dh.z,
        )
    }

    /// Logical coordinate to physical position; exact inverse of `x_to_l`.
    pub fn pos(&self, lc: DVec3) -> DVec3 {
        self.x0 + self.dh * lc
    }

    /// Physical position of a node.
    pub fn node_pos(&self, i: usize, j: usize, k: usize) -> DVec3 {
        self.pos(DVec3::new(i as f64, j as f64, k as f64))
    }

    /// rho = sum over charged species of charge * number density.
    pub fn compute_charge_density(&mut self, species: &[Species]) {
        self.rho.fill(0.0);
        for sp in species {
            if sp.charge == 0.0 {
                continue; // neutrals contribute nothing
            }
            self.rho.scaled_add(&sp.den, sp.charge);
        }
    }

    /// Tags every node inside the sphere as a fixed-potential object and
    /// writes the prescribed potential so the solver starts clamped.
    pub fn add_sphere(&mut self, center: DVec3, radius: f64, phi_sphere: f64) {
        self.sphere = Some(Sphere { center, rad2: radius * radius });
        for i in 0..self.ni {
            for j in 0..self.nj {
                for k in 0..self.nk {
                    if self.in_sphere(self.node_pos(i, j, k)) {
                        self.node_kind[(i, j, k)] = NodeKind::Fixed(phi_sphere);
                        self.phi[(i, j, k)] = phi_sphere;
                    }
                }
            }
        }
    }

    /// Marks the k=0 face as the grounded inlet plane.
    pub fn add_inlet(&mut self) {
        for i in 0..self.ni {
            for j in 0..self.nj {
                self.node_kind[(i, j, 0)] = NodeKind::Inlet;
                self.phi[(i, j, 0)] = 0.0;
            }
        }
    }

    /// True if `x` is inside or on the embedded sphere.
    pub fn in_sphere(&self, x: DVec3) -> bool {
        match self.sphere {
            Some(s) => (x - s.center).mag_sq() <= s.rad2,
            None => false,
        }
    }

    /// True while the position is within the beam axis extent.
    pub fn in_bounds(&self, pos: DVec3) -> bool {
        pos.z >= self.x0.z && pos.z < self.xm.z
    }

    /// True once the position has crossed the exit plane opposite the inlet.
    pub fn passed_through(&self, pos: DVec3) -> bool {
        pos.z >= self.xm.z
    }

    /// Inward unit normal of the transverse wall the position lies beyond,
    /// or `None` when the position has not crossed any wall.
    pub fn wall_normal(&self, pos: DVec3) -> Option<DVec3> {
        if pos.x <= self.x0.x {
            Some(DVec3::new(1.0, 0.0, 0.0))
        } else if pos.x >= self.xm.x {
            Some(DVec3::new(-1.0, 0.0, 0.0))
        } else if pos.y <= self.x0.y {
            Some(DVec3::new(0.0, 1.0, 0.0))
        } else if pos.y >= self.xm.y {
            Some(DVec3::new(0.0, -1.0, 0.0))
        } else {
            None
        }
    }

    /// Samples a unit velocity direction from a cosine-weighted diffuse
    /// distribution about the inward wall normal.
    pub fn wall_diffuse_vector<R: Rng>(&self, rng: &mut R, normal: DVec3) -> DVec3 {
        let sin_theta: f64 = rng.random();
        let cos_theta = (1.0 - sin_theta * sin_theta).sqrt();
        let psi = 2.0 * PI * rng.random::<f64>();

        // wall normals are axis-aligned unit vectors, so picking the less
        // aligned axis keeps both tangents unit length
        let pick = if normal.x.abs() < 0.5 {
            DVec3::new(1.0, 0.0, 0.0)
        } else {
            DVec3::new(0.0, 1.0, 0.0)
        };
        let t1 = normal.cross(pick);
        let t2 = normal.cross(t1);
        t1 * (sin_theta * psi.cos()) + t2 * (sin_theta * psi.sin()) + normal * cos_theta
    }

    /// Total electrostatic field energy, 0.5 * eps0 * sum(|E|^2 * volume).
    pub fn potential_energy(&self) -> f64 {
        let pe: f64 = self
            .ef
            .data()
            .par_iter()
            .zip(self.node_vol.data().par_iter())
            .map(|(e, vol)| e.mag_sq() * vol)
            .sum();
        0.5 * EPS_0 * pe
    }

    /// Trapezoidal integration weights: full cell volume in the interior,
    /// halved once per boundary face the node touches.
    fn compute_node_volumes(&mut self) {
        let cell = self.dh.x * self.dh.y * self.dh.z;
        for i in 0..self.ni {
            for j in 0..self.nj {
                for k in 0..self.nk {
                    let mut vol = cell;
                    if i == 0 || i == self.ni - 1 {
                        vol *= 0.5;
                    }
                    if j == 0 || j == self.nj - 1 {
                        vol *= 0.5;
                    }
                    if k == 0 || k == self.nk - 1 {
                        vol *= 0.5;
                    }
                    self.node_vol[(i, j, k)] = vol;
                }
            }
        }
    }
}
