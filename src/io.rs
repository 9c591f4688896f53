// io.rs
// Checkpoint persistence: particle populations plus the simulation clock.
// JSON for .json paths, gzipped bincode otherwise; written via a temp file
// so an interrupted save never truncates an existing checkpoint.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::simulation::Simulation;
use crate::species::{Particle, WallTally};

#[derive(Serialize, Deserialize)]
pub struct Checkpoint {
    pub ts: u32,
    pub time: f64,
    pub species: Vec<SpeciesState>,
}

#[derive(Serialize, Deserialize)]
pub struct SpeciesState {
    pub name: String,
    pub tally: WallTally,
    pub particles: Vec<Particle>,
}

impl Checkpoint {
    pub fn capture(sim: &Simulation) -> Self {
        Self {
            ts: sim.mesh.ts(),
            time: sim.mesh.time(),
            species: sim
                .species
                .iter()
                .map(|sp| SpeciesState {
                    name: sp.name.clone(),
                    tally: sp.tally,
                    particles: sp.particles.clone(),
                })
                .collect(),
        }
    }

    /// Restores particles and clock into an already-built scenario, then
    /// rebuilds the derived fields so the next step starts consistent.
    pub fn restore_into(self, sim: &mut Simulation) -> Result<(), SimError> {
        for state in self.species {
            let sp = sim
                .species
                .iter_mut()
                .find(|sp| sp.name == state.name)
                .ok_or_else(|| {
                    SimError::Checkpoint(format!(
                        "checkpoint species {} not present in scenario",
                        state.name
                    ))
                })?;
            sp.particles = state.particles;
            sp.tally = state.tally;
        }
        sim.mesh.restore_clock(self.time, self.ts);

        for sp in &mut sim.species {
            sp.compute_number_density(&sim.mesh);
        }
        sim.mesh.compute_charge_density(&sim.species);
        sim.initialize();
        Ok(())
    }
}

pub fn save_checkpoint<P: AsRef<Path>>(path: P, sim: &Simulation) -> Result<(), SimError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let checkpoint = Checkpoint::capture(sim);

    let tmp_path = path.with_extension({
        let mut os = path.extension().map(|e| e.to_os_string()).unwrap_or_default();
        os.push(".tmp");
        os
    });
    {
        let file = fs::File::create(&tmp_path)?;
        if path.extension().is_some_and(|e| e == "json") {
            serde_json::to_writer(file, &checkpoint)
                .map_err(|e| SimError::Checkpoint(e.to_string()))?;
        } else {
            let mut encoder = GzEncoder::new(file, Compression::fast());
            bincode::serialize_into(&mut encoder, &checkpoint)
                .map_err(|e| SimError::Checkpoint(e.to_string()))?;
            let mut file = encoder.finish()?;
            file.flush()?;
        }
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Checkpoint, SimError> {
    let data = fs::read(path.as_ref())?;
    let bytes = match maybe_decompress_gzip(&data)? {
        Some(decoded) => decoded,
        None => data,
    };
    if let Ok(checkpoint) = serde_json::from_slice::<Checkpoint>(&bytes) {
        return Ok(checkpoint);
    }
    bincode::deserialize(&bytes).map_err(|e| SimError::Checkpoint(e.to_string()))
}

fn maybe_decompress_gzip(data: &[u8]) -> Result<Option<Vec<u8>>, SimError> {
    if data.len() < 2 || data[0] != 0x1f || data[1] != 0x8b {
        return Ok(None);
    }
    let mut decoder = GzDecoder::new(Cursor::new(data));
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded)?;
    Ok(Some(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::scenario;

    fn small_sim() -> Simulation {
        let mut cfg = SimConfig::default();
        cfg.domain.nodes = [5, 5, 9];
        cfg.time.steps = 3;
        cfg.solver.max_iterations = 2000;
        let mut sim = scenario::build(&cfg).unwrap();
        sim.initialize();
        sim.mesh.advance_time();
        sim.step();
        sim
    }

    #[test]
    fn binary_checkpoint_round_trips() {
        let sim = small_sim();
        let path = std::env::temp_dir().join("ionflow_ckpt_test.gz");
        save_checkpoint(&path, &sim).unwrap();
        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.ts, sim.mesh.ts());
        assert_eq!(loaded.species[0].particles.len(), sim.species[0].particles.len());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn json_checkpoint_round_trips_and_restores() {
        let sim = small_sim();
        let path = std::env::temp_dir().join("ionflow_ckpt_test.json");
        save_checkpoint(&path, &sim).unwrap();

        // fresh scenario, state restored from the checkpoint
        let mut cfg = SimConfig::default();
        cfg.domain.nodes = [5, 5, 9];
        cfg.time.steps = 3;
        cfg.solver.max_iterations = 2000;
        let mut restored = scenario::build(&cfg).unwrap();
        load_checkpoint(&path).unwrap().restore_into(&mut restored).unwrap();

        assert_eq!(restored.mesh.ts(), sim.mesh.ts());
        assert_eq!(restored.species[0].particles.len(), sim.species[0].particles.len());
        let a = restored.species[0].particles[3].pos;
        let b = sim.species[0].particles[3].pos;
        assert_eq!(a.x, b.x);
        assert_eq!(a.z, b.z);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn restoring_into_mismatched_scenario_fails() {
        let sim = small_sim();
        let path = std::env::temp_dir().join("ionflow_ckpt_mismatch.gz");
        save_checkpoint(&path, &sim).unwrap();

        let mut cfg = SimConfig::default();
        cfg.domain.nodes = [5, 5, 9];
        cfg.species[0].name = "Xe+".to_string();
        cfg.sources[0].species = "Xe+".to_string();
        let mut other = scenario::build(&cfg).unwrap();
        assert!(load_checkpoint(&path).unwrap().restore_into(&mut other).is_err());
        let _ = fs::remove_file(&path);
    }
}
