use std::{
    collections::HashSet,
    fs,
    path::PathBuf,
    sync::Arc,
};

use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    datastructures::*,
    error::Result,
    log_parser::{parse_summary, parse_trace, SUMMARY_COLUMNS},
    sandbox::{IniDocument, Sandbox},
    scheduler::{Executor, WorkerPool, WorkerSlot},
    sweep::{SweepEntry, SweepSpec},
    tabular::Table,
};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    /// The raw log already existed.
    Skipped,
}

/// Runs one work item: materializes the slot's config, invokes the solver and stores the
/// raw log once it parses.
pub struct SolverExecutor {
    ctx: Arc<Context>,
    spec: SweepSpec,
}

impl SolverExecutor {
    pub fn new(ctx: Arc<Context>, spec: SweepSpec) -> Self {
        Self { ctx, spec }
    }
}

impl Executor<WorkItem> for SolverExecutor {
    type Output = RunOutcome;

    fn execute(&self, slot: &WorkerSlot, item: &WorkItem) -> Result<RunOutcome> {
        if item.output.exists() {
            debug!("slot {}: {} exists, skipping", slot.id(), item.output.display());
            return Ok(RunOutcome::Skipped);
        }
        let template = IniDocument::read(&self.ctx.template(self.spec.family.name()))?;
        let sandbox = Sandbox::prepare(slot, &self.ctx.solver)?;
        let overrides = self
            .spec
            .fixed_overrides()
            .into_iter()
            .chain(item.point.overrides(item.graph.lower_bound))
            .collect_vec();
        sandbox.materialize(&template, &overrides)?;

        debug!("slot {}: running {item}", slot.id());
        let stdout = sandbox.invoke(&item.graph.path)?;
        match self.spec.family {
            SweepFamily::Moves => {
                parse_trace(&stdout)?;
            }
            SweepFamily::Strategy | SweepFamily::Meta => {
                parse_summary(&stdout)?;
            }
        }

        if let Some(parent) = item.output.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = item.output.with_extension("partial");
        fs::write(&partial, stdout)?;
        fs::rename(&partial, &item.output)?;
        Ok(RunOutcome::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub graph: String,
    pub output: PathBuf,
    pub error: String,
}

/// What a runner invocation did, written next to the experiment folders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub family: String,
    pub items: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: Vec<FailedItem>,
    pub tables: Vec<PathBuf>,
    pub incomplete_graphs: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.incomplete_graphs.is_empty()
    }
}

/// One sweep family applied to a set of graphs.
pub struct Experiment {
    ctx: Arc<Context>,
    spec: SweepSpec,
    entries: Vec<SweepEntry>,
}

impl Experiment {
    pub fn new(ctx: Arc<Context>, spec: SweepSpec) -> Self {
        let entries = spec.entries();
        Self { ctx, spec, entries }
    }

    pub fn entries(&self) -> &[SweepEntry] {
        &self.entries
    }

    /// Per-graph summary of the strategy and meta families.
    pub fn table_path(&self, graph: &GraphDescriptor) -> PathBuf {
        graph.folder.join(format!("{}.csv", self.spec.family))
    }

    pub fn log_path(&self, graph: &GraphDescriptor, entry: &SweepEntry) -> PathBuf {
        graph
            .folder
            .join(self.spec.family.name())
            .join(format!("{}.log", entry.slug))
    }

    /// Trace table of a single moves run.
    pub fn trace_path(&self, graph: &GraphDescriptor, entry: &SweepEntry) -> PathBuf {
        graph.folder.join(format!("{}.csv", entry.slug))
    }

    fn is_done(&self, graph: &GraphDescriptor) -> bool {
        match self.spec.family {
            SweepFamily::Moves => self
                .entries
                .iter()
                .all(|entry| self.trace_path(graph, entry).exists()),
            SweepFamily::Strategy | SweepFamily::Meta => self.table_path(graph).exists(),
        }
    }

    /// Work items of every graph whose derived tables do not exist yet, in sweep order.
    pub fn plan(&self, graphs: &[Arc<GraphDescriptor>]) -> Vec<WorkItem> {
        graphs
            .iter()
            .filter(|graph| {
                let done = self.is_done(graph);
                if done {
                    debug!("{graph}: {} already done", self.spec.family);
                }
                !done
            })
            .flat_map(|graph| {
                self.entries.iter().map(move |entry| WorkItem {
                    graph: graph.clone(),
                    point: entry.point,
                    output: self.log_path(graph, entry),
                })
            })
            .collect()
    }

    /// Schedules all pending items on `pool`, then builds the tables of every graph whose
    /// items all succeeded.
    pub fn run(&self, graphs: &[Arc<GraphDescriptor>], pool: &WorkerPool) -> Result<RunReport> {
        let items = self.plan(graphs);
        let mut report = RunReport {
            family: self.spec.family.to_string(),
            items: items.len(),
            ..Default::default()
        };
        info!(
            "{}: {} items for {} graphs",
            self.spec.family,
            items.len(),
            graphs.len()
        );
        let executor = Arc::new(SolverExecutor::new(self.ctx.clone(), self.spec));
        let mut failed_graphs = HashSet::new();
        for completion in pool.run(items, executor)? {
            match completion.result {
                Ok(RunOutcome::Completed) => report.completed += 1,
                Ok(RunOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    error!("{}: {err}", completion.item);
                    failed_graphs.insert(completion.item.graph.to_string());
                    report.failed.push(FailedItem {
                        graph: completion.item.graph.to_string(),
                        output: completion.item.output.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        for graph in graphs {
            if failed_graphs.contains(&graph.to_string()) {
                warn!("{graph}: not all runs succeeded, tables are not written");
                report.incomplete_graphs.push(graph.to_string());
                continue;
            }
            match self.assemble(graph) {
                Ok(tables) => report.tables.extend(tables),
                Err(err) => {
                    error!("{graph}: {err}");
                    report.incomplete_graphs.push(graph.to_string());
                }
            }
        }
        Ok(report)
    }

    /// Turns the raw logs of one graph into its derived tables and returns the paths written.
    pub fn assemble(&self, graph: &GraphDescriptor) -> Result<Vec<PathBuf>> {
        match self.spec.family {
            SweepFamily::Moves => self.assemble_traces(graph),
            SweepFamily::Strategy | SweepFamily::Meta => {
                let path = self.table_path(graph);
                if path.exists() {
                    return Ok(Vec::new());
                }
                let header = self
                    .spec
                    .label_columns()
                    .iter()
                    .chain(SUMMARY_COLUMNS.iter())
                    .copied();
                let mut table = Table::new(header);
                for entry in &self.entries {
                    let log = fs::read_to_string(self.log_path(graph, entry))?;
                    let fields = parse_summary(&log)?;
                    table.push_row(entry.labels.iter().cloned().chain(fields))?;
                }
                table.write(&path)?;
                info!("{graph}: wrote {}", path.display());
                Ok(vec![path])
            }
        }
    }

    fn assemble_traces(&self, graph: &GraphDescriptor) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for entry in &self.entries {
            let path = self.trace_path(graph, entry);
            if path.exists() {
                continue;
            }
            let log = fs::read_to_string(self.log_path(graph, entry))?;
            parse_trace(&log)?.to_table()?.write(&path)?;
            written.push(path);
        }
        if !written.is_empty() {
            info!("{graph}: wrote {} trace tables", written.len());
        }
        Ok(written)
    }
}
