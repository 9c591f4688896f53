// main.rs
// Program entry point: load the scenario, run the step loop, report.

use std::env;
use std::process;

use ionflow::config::SimConfig;
use ionflow::diagnostics::{self, DiagWriter};
use ionflow::error::SimError;
use ionflow::{io, scenario};

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("ionflow: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), SimError> {
    let mut scenario_path: Option<String> = None;
    let mut resume_path: Option<String> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--resume" => {
                resume_path = Some(args.next().ok_or_else(|| {
                    SimError::config("--resume requires a checkpoint path")
                })?);
            }
            "--help" | "-h" => {
                println!("usage: ionflow [scenario.toml] [--resume checkpoint]");
                return Ok(());
            }
            other => scenario_path = Some(other.to_string()),
        }
    }

    let cfg = match &scenario_path {
        Some(path) => SimConfig::load_from_file(path)?,
        None => SimConfig::default(),
    };

    let mut sim = scenario::build(&cfg)?;
    match resume_path {
        Some(path) => {
            io::load_checkpoint(&path)?.restore_into(&mut sim)?;
            println!("resumed from {path} at ts {}", sim.mesh.ts());
        }
        None => sim.initialize(),
    }

    let mut diag = DiagWriter::create(&cfg.output.diag_path, &sim)?;

    while sim.mesh.advance_time() {
        sim.step();

        diagnostics::screen_output(&sim);
        diag.append(&sim)?;
        if cfg.output.fields_every > 0
            && (sim.mesh.ts() % cfg.output.fields_every == 0 || sim.mesh.is_last_step())
        {
            diagnostics::write_fields(&cfg.output.fields_dir, &sim)?;
        }
    }

    if let Some(path) = &cfg.output.checkpoint_path {
        io::save_checkpoint(path, &sim)?;
        println!("checkpoint written to {path}");
    }

    println!("Simulation took {:.3} seconds", sim.mesh.elapsed_secs());
    Ok(())
}
