// diagnostics.rs
// Screen, CSV, and VTK field reporting. Reads mesh and species state only
// after a step has fully completed, so everything it sees is consistent.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SimError;
use crate::mesh::NodeKind;
use crate::simulation::Simulation;

/// One status line per step, mirroring the per-step particle counts and the
/// solver outcome.
pub fn screen_output(sim: &Simulation) {
    let mut counts = String::new();
    for sp in &sim.species {
        counts.push_str(&format!("\t{}: {}", sp.name, sp.particles.len()));
    }
    let solve = if sim.last_solve.converged {
        format!("{} its", sim.last_solve.iterations)
    } else {
        format!("{} its (residual {:.2e})", sim.last_solve.iterations, sim.last_solve.residual)
    };
    println!(
        "ts: {}\t time: {:.4e}{counts}\t solver: {solve}",
        sim.mesh.ts(),
        sim.mesh.time()
    );
}

/// Appends per-step runtime diagnostics to a CSV file, writing the header
/// once on creation.
pub struct DiagWriter {
    writer: BufWriter<File>,
}

impl DiagWriter {
    pub fn create<P: AsRef<Path>>(path: P, sim: &Simulation) -> Result<Self, SimError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);

        let mut header = String::from("ts,time");
        for sp in &sim.species {
            header.push_str(&format!(",{0}.np,{0}.ke,{0}.exited,{0}.collected", sp.name));
        }
        header.push_str(",pe,solver_its,solver_residual");
        writeln!(writer, "{header}")?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, sim: &Simulation) -> Result<(), SimError> {
        write!(self.writer, "{},{:e}", sim.mesh.ts(), sim.mesh.time())?;
        for sp in &sim.species {
            write!(
                self.writer,
                ",{},{:e},{},{}",
                sp.particles.len(),
                sp.kinetic_energy(),
                sp.tally.exited,
                sp.tally.collected
            )?;
        }
        writeln!(
            self.writer,
            ",{:e},{},{:e}",
            sim.mesh.potential_energy(),
            sim.last_solve.iterations,
            sim.last_solve.residual
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the mesh fields and per-species densities as an ASCII VTK
/// ImageData snapshot, `fields_{ts:05}.vti` under `dir`.
pub fn write_fields(dir: &str, sim: &Simulation) -> Result<PathBuf, SimError> {
    fs::create_dir_all(dir)?;
    let path = Path::new(dir).join(format!("fields_{:05}.vti", sim.mesh.ts()));
    let mut out = BufWriter::new(File::create(&path)?);

    let mesh = &sim.mesh;
    let (ni, nj, nk) = (mesh.ni, mesh.nj, mesh.nk);
    let x0 = mesh.x0();
    let dh = mesh.dh();

    writeln!(out, "<?xml version=\"1.0\"?>")?;
    writeln!(out, "<VTKFile type=\"ImageData\" version=\"0.1\" byte_order=\"LittleEndian\">")?;
    writeln!(
        out,
        "<ImageData WholeExtent=\"0 {} 0 {} 0 {}\" Origin=\"{} {} {}\" Spacing=\"{} {} {}\">",
        ni - 1,
        nj - 1,
        nk - 1,
        x0.x,
        x0.y,
        x0.z,
        dh.x,
        dh.y,
        dh.z
    )?;
    writeln!(out, "<Piece Extent=\"0 {} 0 {} 0 {}\">", ni - 1, nj - 1, nk - 1)?;
    writeln!(out, "<PointData>")?;

    // VTK point data runs with i varying fastest
    write_scalar(&mut out, "phi", ni, nj, nk, |i, j, k| mesh.phi[(i, j, k)])?;
    write_scalar(&mut out, "rho", ni, nj, nk, |i, j, k| mesh.rho[(i, j, k)])?;
    write_scalar(&mut out, "node_vol", ni, nj, nk, |i, j, k| mesh.node_vol[(i, j, k)])?;

    writeln!(out, "<DataArray Name=\"node_kind\" NumberOfComponents=\"1\" format=\"ascii\" type=\"Int32\">")?;
    for k in 0..nk {
        for j in 0..nj {
            for i in 0..ni {
                let tag = match mesh.node_kind[(i, j, k)] {
                    NodeKind::Free => 0,
                    NodeKind::Fixed(_) => 1,
                    NodeKind::Inlet => 2,
                };
                write!(out, "{tag} ")?;
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "</DataArray>")?;

    writeln!(out, "<DataArray Name=\"ef\" NumberOfComponents=\"3\" format=\"ascii\" type=\"Float64\">")?;
    for k in 0..nk {
        for j in 0..nj {
            for i in 0..ni {
                let e = mesh.ef[(i, j, k)];
                write!(out, "{:e} {:e} {:e} ", e.x, e.y, e.z)?;
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "</DataArray>")?;

    for sp in &sim.species {
        write_scalar(&mut out, &format!("nd.{}", sp.name), ni, nj, nk, |i, j, k| {
            sp.den[(i, j, k)]
        })?;
    }

    writeln!(out, "</PointData>")?;
    writeln!(out, "</Piece>")?;
    writeln!(out, "</ImageData>")?;
    writeln!(out, "</VTKFile>")?;
    out.flush()?;
    Ok(path)
}

fn write_scalar<W: Write>(
    out: &mut W,
    name: &str,
    ni: usize,
    nj: usize,
    nk: usize,
    value: impl Fn(usize, usize, usize) -> f64,
) -> Result<(), SimError> {
    writeln!(
        out,
        "<DataArray Name=\"{name}\" NumberOfComponents=\"1\" format=\"ascii\" type=\"Float64\">"
    )?;
    for k in 0..nk {
        for j in 0..nj {
            for i in 0..ni {
                write!(out, "{:e} ", value(i, j, k))?;
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "</DataArray>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::scenario;

    #[test]
    fn field_snapshot_and_diag_csv_are_written() {
        let mut cfg = SimConfig::default();
        cfg.domain.nodes = [5, 5, 9];
        cfg.time.steps = 2;
        let mut sim = scenario::build(&cfg).unwrap();
        sim.initialize();
        sim.mesh.advance_time();
        sim.step();

        let dir = std::env::temp_dir().join("ionflow_diag_test");
        let dir_str = dir.to_str().unwrap().to_string();
        let _ = fs::remove_dir_all(&dir);

        let path = write_fields(&dir_str, &sim).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("<VTKFile type=\"ImageData\""));
        assert!(text.contains("Name=\"phi\""));
        assert!(text.contains("Name=\"nd.O+\""));

        let csv_path = dir.join("diags.csv");
        let mut diag = DiagWriter::create(&csv_path, &sim).unwrap();
        diag.append(&sim).unwrap();
        diag.append(&sim).unwrap();
        let csv = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ts,time,O+.np"));

        let _ = fs::remove_dir_all(&dir);
    }
}
