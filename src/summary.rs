use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    aggregator::{aggregate, rank_top, Aggregation, Normalization, Partition, Ranking},
    catalog::GraphCatalog,
    datastructures::*,
    error::{ExperimentError, Result},
    sweep::SweepSpec,
    tabular::Table,
};

#[cfg(test)]
mod tests;

/// Metrics averaged over the graphs of a group.
pub const GROUP_METRICS: [&str; 4] = ["k", "time", "iterations", "conflicts"];
pub const HITS: &str = "hits";

/// Directories below `dir`, sorted by name.
fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect::<Vec<_>>();
    dirs.sort();
    Ok(dirs)
}

fn summarized(family: SweepFamily) -> Result<SweepSpec> {
    match family {
        SweepFamily::Strategy | SweepFamily::Meta => Ok(SweepSpec::new(family)),
        SweepFamily::Moves => Err(ExperimentError::not_found("summary for", family.name())),
    }
}

pub fn group_aggregation(family: SweepFamily) -> Result<Aggregation> {
    let spec = summarized(family)?;
    Ok(Aggregation::new(
        spec.label_columns().iter().copied(),
        GROUP_METRICS,
        Normalization::PartitionMax,
    )
    .skip_zero("iterations")
    .subtract_lower_bound("k")
    .with_hits(HITS))
}

/// Group tables already carry the hit count, it is averaged like the other metrics.
pub fn global_aggregation(family: SweepFamily) -> Result<Aggregation> {
    let spec = summarized(family)?;
    Ok(Aggregation::new(
        spec.label_columns().iter().copied(),
        GROUP_METRICS.iter().copied().chain([HITS]),
        Normalization::PartitionMax,
    ))
}

pub fn group_dir(ctx: &Context, group: &str) -> PathBuf {
    ctx.experiment_root().join(group)
}

pub fn group_table_path(ctx: &Context, family: SweepFamily, group: &str) -> PathBuf {
    group_dir(ctx, group).join(format!("{family}.csv"))
}

pub fn global_table_path(ctx: &Context, family: SweepFamily) -> PathBuf {
    ctx.experiment_root().join(format!("{family}.csv"))
}

/// Per-graph tables of one group, optionally without the graphs greedy already solves.
pub fn graph_tables(
    ctx: &Context,
    catalog: &GraphCatalog,
    family: SweepFamily,
    group: &str,
    skip_trivial: bool,
) -> Result<Vec<Partition>> {
    let dir = group_dir(ctx, group);
    if !dir.is_dir() {
        return Err(ExperimentError::not_found("group", group));
    }
    let mut partitions = Vec::new();
    for (name, folder) in subdirectories(&dir)? {
        let path = folder.join(format!("{family}.csv"));
        if !path.is_file() {
            continue;
        }
        let graph = catalog.describe(ctx, group, &name);
        if skip_trivial && graph.is_trivial() {
            info!("{graph}: greedy reaches the lower bound, skipping");
            continue;
        }
        partitions.push(
            Partition::new(graph.to_string(), Table::read(&path)?)
                .with_lower_bound(graph.lower_bound as f64),
        );
    }
    Ok(partitions)
}

/// Averages the per-graph tables of `group` into `<group>/<family>.csv`. An existing group
/// table is kept as is.
pub fn group_summary(
    ctx: &Context,
    catalog: &GraphCatalog,
    family: SweepFamily,
    group: &str,
) -> Result<PathBuf> {
    let aggregation = group_aggregation(family)?;
    let path = group_table_path(ctx, family, group);
    if path.is_file() {
        info!("{} exists, skipping", path.display());
        return Ok(path);
    }
    let partitions = graph_tables(ctx, catalog, family, group, false)?;
    if partitions.is_empty() {
        return Err(ExperimentError::not_found(
            "graph tables in group",
            format!("{group}/*/{family}.csv"),
        ));
    }
    aggregate(&partitions, &aggregation)?.write(&path)?;
    info!(
        "{group}: summarized {} graphs into {}",
        partitions.len(),
        path.display()
    );
    Ok(path)
}

/// Summarizes every group, then averages the group tables into `experiment/<family>.csv`.
/// The global table is rebuilt on every call.
pub fn global_summary(
    ctx: &Context,
    catalog: &GraphCatalog,
    family: SweepFamily,
) -> Result<PathBuf> {
    let aggregation = global_aggregation(family)?;
    let mut partitions = Vec::new();
    for (group, _) in subdirectories(&ctx.experiment_root())? {
        match group_summary(ctx, catalog, family, &group) {
            Ok(path) => partitions.push(Partition::new(group, Table::read(&path)?)),
            Err(err) if err.is_not_found() => warn!("{group}: {err}"),
            Err(err) => return Err(err),
        }
    }
    if partitions.is_empty() {
        return Err(ExperimentError::not_found("group tables for", family.name()));
    }
    let path = global_table_path(ctx, family);
    aggregate(&partitions, &aggregation)?.write(&path)?;
    info!("summarized {} groups into {}", partitions.len(), path.display());
    Ok(path)
}

/// Runs `ranking` over the per-graph tables of every group, skipping trivial graphs.
pub fn rank_report(
    ctx: &Context,
    catalog: &GraphCatalog,
    family: SweepFamily,
    ranking: &Ranking,
) -> Result<Table> {
    let mut partitions = Vec::new();
    for (group, _) in subdirectories(&ctx.experiment_root())? {
        partitions.extend(graph_tables(ctx, catalog, family, &group, true)?);
    }
    info!("ranking {} over {} graphs", ranking.key, partitions.len());
    rank_top(&partitions, ranking)
}
