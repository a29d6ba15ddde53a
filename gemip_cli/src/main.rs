//! GEMIP command-line runner
//!
//! Generates a seeded pattern/world pair, runs the selected formulations in
//! parallel through a match session and prints the ranked solutions.

mod args;
mod generate;

use std::sync::Arc;

use clap::Parser;
use gemip_driver::MatchSession;
use gemip_formulation::FormulationKind;
use gemip_graph::Weights;
use gemip_solver::SolverRegistry;
use tracing::info;

use args::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let registry = SolverRegistry::builtin();
    if args.list {
        println!("formulations: {}", FormulationKind::names().join(", "));
        println!("backends: {}", registry.names().join(", "));
        return Ok(());
    }
    let config = args.to_config()?;

    let pair = generate::pair(&args.pair_shape())?;
    info!(
        "pattern: {} vertices / {} edges, world: {} vertices / {} edges, planted at {:?}",
        pair.pattern.vertex_count(),
        pair.pattern.edge_count(),
        pair.world.vertex_count(),
        pair.world.edge_count(),
        pair.planted
    );
    let weights = Weights::label_distance(&pair.pattern, &pair.world, args.mismatch)
        .with_creation_costs(args.creation_cost, args.creation_cost);

    let pattern = Arc::new(pair.pattern);
    let world = Arc::new(pair.world);
    let mut session = MatchSession::new(
        config.clone(),
        registry,
        Arc::clone(&pattern),
        Arc::clone(&world),
        Arc::new(weights),
    )?;
    for kind in &args.formulations {
        info!("Submitting {kind}");
        session.submit(kind.instantiate(&config.formulation))?;
    }
    let report = session.collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.solutions)?);
    } else {
        println!("\n=== Solutions ===");
        for (i, solution) in report.solutions.iter().enumerate() {
            println!("{i}: {solution}");
            println!("   {}", solution.describe(&pattern, &world));
        }
    }
    for kind in &report.cancelled {
        println!("{kind}: cancelled");
    }
    for (kind, failure) in &report.failures {
        let verdict = if failure.error.is_infeasible() {
            "no match"
        } else {
            "error"
        };
        println!("{kind}: {verdict} ({failure})");
    }

    Ok(())
}
