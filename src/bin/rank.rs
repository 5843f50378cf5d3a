use anyhow::{bail, Result};
use clap::Parser;
use gls_experiments::{
    aggregator::{Filter, Ranking},
    catalog::GraphCatalog,
    datastructures::*,
    summary,
};

fn main() -> Result<()> {
    let args = RankArgs::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();
    let Ok(config) = Config::load(args.config.as_deref(), args.data_root.as_deref()) else {
        std::process::exit(exitcode::CONFIG);
    };
    let ctx = Context::new(&config);
    let catalog = GraphCatalog::load(&ctx)?;

    let mut filters = Vec::new();
    for (exprs, keep) in [(&args.filters, true), (&args.exclude, false)] {
        for expr in exprs {
            match Filter::parse(expr, keep) {
                Some(filter) => filters.push(filter),
                None => bail!("filter {expr:?} is not of the form COLUMN=VALUE"),
            }
        }
    }
    let ranking = Ranking {
        key: args.by,
        filters,
        sort_by: args.sort,
        top: args.top,
    };
    let report = summary::rank_report(&ctx, &catalog, args.family, &ranking)?;
    match &args.out {
        Some(path) => report.write(path)?,
        None => {
            for record in report.records() {
                let fields = record.values().map(|v| v.to_string()).collect::<Vec<_>>();
                println!("{}", fields.join(" "));
            }
        }
    }
    Ok(())
}
