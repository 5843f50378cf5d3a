use anyhow::{Context as _, Result};
use clap::Parser;
use log::{error, info};
use rand::random;
use std::{fs, sync::Arc};

use gls_experiments::catalog::{self, GraphCatalog};
use gls_experiments::datastructures::*;
use gls_experiments::experiment::Experiment;
use gls_experiments::scheduler::{Shuffle, WorkerPool};
use gls_experiments::sweep::SweepSpec;

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();
    let config = match Config::from_cli(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let ctx = Arc::new(Context::new(&config));
    let family = args.family;
    let graph_catalog = GraphCatalog::load(&ctx)?;

    let graphs = match (&args.group, &args.graph) {
        (Some(group), Some(name)) => match graph_catalog.find(&ctx, group, name) {
            Ok(graph) => vec![Arc::new(graph)],
            Err(err) if err.is_not_found() => {
                error!("{err}");
                std::process::exit(1);
            }
            Err(err) => return Err(err.into()),
        },
        _ => match catalog::load_graphs(&ctx, &graph_catalog) {
            Ok(graphs) => graphs,
            Err(err) => {
                error!("{err}");
                std::process::exit(exitcode::CONFIG);
            }
        },
    };

    let seed = config.seed.unwrap_or_else(random);
    info!("{family}: {} graphs, {} slots, seed {seed}", graphs.len(), config.num_slots);
    let prefix = args.slot.clone().unwrap_or_else(|| family.to_string());
    let pool = WorkerPool::new(&ctx.exec_root(), &prefix, config.num_slots)
        .with_shuffle(Shuffle::Seeded(seed));
    let spec = SweepSpec::new(family).with_scratch(config.scratch);
    let report = Experiment::new(ctx.clone(), spec).run(&graphs, &pool)?;

    let report_path = ctx.experiment_root().join(format!("{prefix}.report.json"));
    fs::create_dir_all(ctx.experiment_root())?;
    serde_json::to_writer_pretty(
        fs::File::create(&report_path)
            .with_context(|| format!("cannot create {}", report_path.display()))?,
        &report,
    )?;
    info!(
        "{} completed, {} skipped, {} failed, {} tables written",
        report.completed,
        report.skipped,
        report.failed.len(),
        report.tables.len()
    );
    if !report.is_success() {
        error!("{} graphs are incomplete", report.incomplete_graphs.len());
        std::process::exit(exitcode::SOFTWARE);
    }
    Ok(())
}
