use core::fmt;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::Verbosity;
use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};

/// Lower bound used when the catalog does not know the graph.
pub const DEFAULT_LOWER_BOUND: u32 = 2;
/// Lambda written to the config when the solver computes lambda itself.
pub const DEFAULT_LAMBDA: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildStrategy {
    Random,
    Greedy,
    Bipartite,
}

impl BuildStrategy {
    pub const ALL: [BuildStrategy; 3] = [
        BuildStrategy::Random,
        BuildStrategy::Greedy,
        BuildStrategy::Bipartite,
    ];

    pub fn id(&self) -> u32 {
        match self {
            BuildStrategy::Random => 0,
            BuildStrategy::Greedy => 1,
            BuildStrategy::Bipartite => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildStrategy::Random => "Random",
            BuildStrategy::Greedy => "Greedy",
            BuildStrategy::Bipartite => "Bipartite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateStrategy {
    /// Every epoch starts from scratch.
    Scratch,
    UseHistory,
}

impl UpdateStrategy {
    pub fn id(&self) -> u32 {
        match self {
            UpdateStrategy::Scratch => 0,
            UpdateStrategy::UseHistory => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Minimal,
    Maximum,
    Median,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Minimal, Target::Maximum, Target::Median];

    pub fn id(&self) -> u32 {
        match self {
            Target::Minimal => 1,
            Target::Maximum => 2,
            Target::Median => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Target::Minimal => "Minimal",
            Target::Maximum => "Maximum",
            Target::Median => "Median",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lambda {
    /// Solver units, a tenth of the reported lambda.
    Fixed(u32),
    Dynamic,
}

impl Lambda {
    pub fn solver_value(&self) -> u32 {
        match self {
            Lambda::Fixed(l) => *l,
            Lambda::Dynamic => DEFAULT_LAMBDA,
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lambda::Fixed(l) => write!(f, "{:.1}", *l as f64 / 10.0),
            Lambda::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// A fully resolved solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepPoint {
    pub build_strategy: BuildStrategy,
    pub update_strategy: UpdateStrategy,
    pub source_target: Target,
    pub destination_target: Target,
    pub reset_weights: bool,
    pub aspiration: bool,
    pub dynamic_lambda: bool,
    pub lambda: Lambda,
    pub window_size: u32,
}

impl SweepPoint {
    /// Key/value pairs written over the `gls` section of the base template.
    pub fn overrides(&self, lower_bound: u32) -> Vec<(&'static str, String)> {
        vec![
            ("BUILD_STRATEGY", self.build_strategy.id().to_string()),
            ("UPDATE_STRATEGY", self.update_strategy.id().to_string()),
            ("SOURCE_TARGET", self.source_target.id().to_string()),
            ("DESTINATION_TARGET", self.destination_target.id().to_string()),
            ("RESET_WEIGHTS", flag(self.reset_weights)),
            ("ASPIRATION", flag(self.aspiration)),
            ("DYNAMIC_LAMBDA", flag(self.dynamic_lambda)),
            ("LAMBDA", self.lambda.solver_value().to_string()),
            ("MAX_NO_IMPROVE", self.window_size.to_string()),
            ("LOWER_BOUND", lower_bound.to_string()),
        ]
    }
}

fn flag(on: bool) -> String {
    u8::from(on).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescriptor {
    pub group: String,
    pub name: String,
    pub path: PathBuf,
    /// Where every artifact of this graph is written.
    pub folder: PathBuf,
    pub lower_bound: u32,
    pub greedy: Option<u32>,
}

impl GraphDescriptor {
    /// Graphs where greedy already hits the lower bound carry no signal for rankings.
    pub fn is_trivial(&self) -> bool {
        self.greedy == Some(self.lower_bound)
    }
}

impl fmt::Display for GraphDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub graph: Arc<GraphDescriptor>,
    pub point: SweepPoint,
    /// Raw solver output; its presence marks the item as done.
    pub output: PathBuf,
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.graph, self.output.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScratchPolicy {
    /// One scratch run per build strategy. The solver rejects scratch updates for any build
    /// but random, so those runs fail.
    EveryBuild,
    /// Only the random build supports scratch updates in the solver.
    #[default]
    RandomOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_root: PathBuf,
    /// Solver binary, relative paths are resolved against `data_root`.
    #[serde(default = "default_solver")]
    pub solver: PathBuf,
    /// Directory holding `<family>.ini` templates.
    #[serde(default = "default_templates")]
    pub templates: PathBuf,
    #[serde(default = "default_num_slots")]
    pub num_slots: usize,
    /// Seed for the queue shuffle, random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub scratch: ScratchPolicy,
}

fn default_solver() -> PathBuf {
    PathBuf::from("bin").join("gls.exe")
}

fn default_templates() -> PathBuf {
    PathBuf::from(".")
}

fn default_num_slots() -> usize {
    6
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("db"),
            solver: default_solver(),
            templates: default_templates(),
            num_slots: default_num_slots(),
            seed: None,
            scratch: ScratchPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config> {
        let config_str = fs::read_to_string(path)
            .map_err(|e| ExperimentError::config(path, e.to_string()))?;
        serde_json::from_str(&config_str)
            .map_err(|e| ExperimentError::config(path, e.to_string()))
    }

    /// Reads the optional json config and applies the data root override.
    pub fn load(path: Option<&Path>, data_root: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(data_root) = data_root {
            config.data_root = data_root.to_path_buf();
        }
        Ok(config)
    }

    pub fn from_cli(args: &Args) -> Result<Config> {
        let mut config = Config::load(args.config.as_deref(), args.data_root.as_deref())?;
        if let Some(num_slots) = args.num_slots {
            config.num_slots = num_slots;
        }
        if let Some(seed) = args.seed {
            config.seed = Some(seed);
        }
        if let Some(scratch) = args.scratch {
            config.scratch = scratch;
        }
        if config.num_slots == 0 {
            return Err(ExperimentError::config(
                args.config.clone().unwrap_or_default(),
                "num_slots must be at least 1",
            ));
        }
        Ok(config)
    }
}

/// Every path the pipeline touches, derived once from the config.
#[derive(Debug, Clone)]
pub struct Context {
    pub data_root: PathBuf,
    pub solver: PathBuf,
    pub templates: PathBuf,
}

impl Context {
    pub fn new(config: &Config) -> Self {
        let solver = if config.solver.is_absolute() {
            config.solver.clone()
        } else {
            config.data_root.join(&config.solver)
        };
        Self {
            data_root: config.data_root.clone(),
            solver,
            templates: config.templates.clone(),
        }
    }

    pub fn graphs_dir(&self) -> PathBuf {
        self.data_root.join("graphs")
    }

    pub fn catalog(&self) -> PathBuf {
        self.data_root.join("graphs.csv")
    }

    pub fn work_list(&self) -> PathBuf {
        self.data_root.join("experiments.in")
    }

    pub fn experiment_root(&self) -> PathBuf {
        self.data_root.join("experiment")
    }

    pub fn exec_root(&self) -> PathBuf {
        self.data_root.join("exec")
    }

    pub fn graph_path(&self, group: &str, name: &str) -> PathBuf {
        self.graphs_dir().join(group).join(name)
    }

    pub fn graph_folder(&self, group: &str, name: &str) -> PathBuf {
        self.experiment_root().join(group).join(name)
    }

    pub fn template(&self, family: &str) -> PathBuf {
        self.templates.join(format!("{family}.ini"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SweepFamily {
    /// Build strategy x source/destination target cross.
    Strategy,
    /// Window size x aspiration x penalty reset x lambda scan.
    Meta,
    /// Traced runs of the named solver variants.
    Moves,
}

impl SweepFamily {
    pub fn name(&self) -> &'static str {
        match self {
            SweepFamily::Strategy => "strategy",
            SweepFamily::Meta => "meta",
            SweepFamily::Moves => "moves",
        }
    }
}

impl fmt::Display for SweepFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Sweep family to run
    #[arg(value_enum)]
    pub family: SweepFamily,
    /// Group of a single graph to run (requires --graph)
    #[arg(long, requires = "graph")]
    pub group: Option<String>,
    /// Name of a single graph to run (requires --group)
    #[arg(long, requires = "group")]
    pub graph: Option<String>,
    /// Prefix of the worker slot directories, defaults to the family name
    #[arg(short, long)]
    pub slot: Option<String>,
    /// Path to the json config
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Root of the experiment database
    #[arg(short, long, value_name = "DIR")]
    pub data_root: Option<PathBuf>,
    /// Number of concurrent solver runs
    #[arg(short = 'j', long)]
    pub num_slots: Option<usize>,
    /// Seed for shuffling the work queue
    #[arg(long)]
    pub seed: Option<u64>,
    /// Which build strategies get a scratch run
    #[arg(long, value_enum)]
    pub scratch: Option<ScratchPolicy>,
    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Parser)]
#[command(author, version, about = "Average per-graph tables into group and global summaries")]
pub struct SummaryArgs {
    #[arg(value_enum)]
    pub family: SweepFamily,
    /// Only summarize this group
    #[arg(long)]
    pub group: Option<String>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long, value_name = "DIR")]
    pub data_root: Option<PathBuf>,
    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Count how often a configuration is among the best runs of a graph"
)]
pub struct RankArgs {
    /// Column whose values are counted
    #[arg(long)]
    pub by: String,
    /// Per-graph tables to rank
    #[arg(long, value_enum, default_value_t = SweepFamily::Meta)]
    pub family: SweepFamily,
    /// Keep only rows where COLUMN=VALUE
    #[arg(long = "where", value_name = "COLUMN=VALUE")]
    pub filters: Vec<String>,
    /// Drop rows where COLUMN=VALUE
    #[arg(long, value_name = "COLUMN=VALUE")]
    pub exclude: Vec<String>,
    /// Number of best rows taken per graph
    #[arg(long, default_value_t = 10)]
    pub top: usize,
    /// Sort columns, compared in order
    #[arg(long, value_delimiter = ',', default_values_t = vec![
        "k".to_string(),
        "time".to_string(),
        "final_conflicts".to_string(),
        "iterations".to_string(),
    ])]
    pub sort: Vec<String>,
    /// Write the report as a table instead of printing it
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long, value_name = "DIR")]
    pub data_root: Option<PathBuf>,
    #[command(flatten)]
    pub verbosity: Verbosity,
}
