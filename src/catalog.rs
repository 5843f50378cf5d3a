use std::{collections::HashMap, fs, path::Path, sync::Arc};

use log::warn;

use crate::{
    datastructures::*,
    error::{ExperimentError, Result},
    tabular::{Record, Table},
};


#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogEntry {
    lower_bound: Option<u32>,
    greedy: Option<u32>,
}

/// Known graphs and their reference values, keyed by (group, graph).
#[derive(Debug, Clone, Default)]
pub struct GraphCatalog {
    entries: HashMap<(String, String), CatalogEntry>,
}

impl GraphCatalog {
    pub fn from_table(table: &Table) -> Result<Self> {
        for column in ["source", "graph"] {
            if !table.header().iter().any(|h| h == column) {
                return Err(ExperimentError::parse(
                    1,
                    format!("graph catalog has no {column:?} column"),
                ));
            }
        }
        let number = |record: &Record, column: &str| {
            record
                .get_f64(column)
                .filter(|v| *v >= 0.0)
                .map(|v| v as u32)
        };
        let entries = table
            .records()
            .iter()
            .map(|record| {
                let text = |c: &str| {
                    record.get(c).map(|v| v.to_string()).unwrap_or_default()
                };
                (
                    (text("source"), text("graph")),
                    CatalogEntry {
                        lower_bound: number(record, "x"),
                        greedy: number(record, "greedy"),
                    },
                )
            })
            .collect();
        Ok(Self { entries })
    }

    /// A missing catalog file yields an empty catalog.
    pub fn load(ctx: &Context) -> Result<Self> {
        let path = ctx.catalog();
        if !path.exists() {
            warn!("Graph catalog {:?} not found, using default lower bounds", path);
            return Ok(Self::default());
        }
        GraphCatalog::from_table(&Table::read(&path)?)
    }

    pub fn contains(&self, group: &str, name: &str) -> bool {
        self.entries
            .contains_key(&(group.to_string(), name.to_string()))
    }

    pub fn describe(&self, ctx: &Context, group: &str, name: &str) -> GraphDescriptor {
        let entry = self.entries.get(&(group.to_string(), name.to_string()));
        GraphDescriptor {
            group: group.to_string(),
            name: name.to_string(),
            path: ctx.graph_path(group, name),
            folder: ctx.graph_folder(group, name),
            lower_bound: entry
                .and_then(|e| e.lower_bound)
                .unwrap_or(DEFAULT_LOWER_BOUND),
            greedy: entry.and_then(|e| e.greedy),
        }
    }

    /// Looks up a single graph; the graph file has to exist.
    pub fn find(&self, ctx: &Context, group: &str, name: &str) -> Result<GraphDescriptor> {
        let descriptor = self.describe(ctx, group, name);
        if !descriptor.path.is_file() {
            return Err(ExperimentError::not_found("graph", format!("{group}/{name}")));
        }
        Ok(descriptor)
    }
}

/// Reads `<group> <graph>` pairs, skipping lines that are not exactly a pair.
pub fn read_work_list(path: &Path) -> Result<Vec<(String, String)>> {
    let text = fs::read_to_string(path)
        .map_err(|e| ExperimentError::config(path, format!("cannot read work list: {e}")))?;
    Ok(text
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                [group, graph] => Some((group.to_string(), graph.to_string())),
                _ => None,
            }
        })
        .collect())
}

/// Descriptors for every work list entry whose graph file exists.
pub fn load_graphs(ctx: &Context, catalog: &GraphCatalog) -> Result<Vec<Arc<GraphDescriptor>>> {
    Ok(read_work_list(&ctx.work_list())?
        .into_iter()
        .filter_map(|(group, name)| match catalog.find(ctx, &group, &name) {
            Ok(graph) => Some(Arc::new(graph)),
            Err(_) => {
                warn!("Graph {group} {name} does not exist, skipping");
                None
            }
        })
        .collect())
}
