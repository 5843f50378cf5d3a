use anyhow::Result;
use clap::Parser;
use gls_experiments::{catalog::GraphCatalog, datastructures::*, summary};
use log::{error, info};

fn main() -> Result<()> {
    let args = SummaryArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();
    let Ok(config) = Config::load(args.config.as_deref(), args.data_root.as_deref()) else {
        std::process::exit(exitcode::CONFIG);
    };
    let ctx = Context::new(&config);
    let catalog = GraphCatalog::load(&ctx)?;

    let result = match &args.group {
        Some(group) => summary::group_summary(&ctx, &catalog, args.family, group),
        None => summary::global_summary(&ctx, &catalog, args.family),
    };
    match result {
        Ok(path) => info!("{}", path.display()),
        Err(err) if err.is_not_found() => {
            error!("{err}");
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
