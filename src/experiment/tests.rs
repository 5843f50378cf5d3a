use super::*;
use crate::{catalog::GraphCatalog, scheduler::Shuffle, test_utils::*};

const SUMMARY: &str = "4,120,35,4,9,3,0,14,6,74,0,2,20";

fn experiment(ctx: &Context, family: SweepFamily) -> Experiment {
    Experiment::new(Arc::new(ctx.clone()), SweepSpec::new(family))
}

fn pool(ctx: &Context) -> WorkerPool {
    WorkerPool::new(&ctx.exec_root(), "test", 2).with_shuffle(Shuffle::Seeded(1))
}

fn queen(ctx: &Context) -> Arc<GraphDescriptor> {
    let catalog = GraphCatalog::load(ctx).unwrap();
    Arc::new(catalog.find(ctx, "dimacs", "queen5_5.col").unwrap())
}

#[test]
fn test_plan_skips_finished_graphs() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let catalog = GraphCatalog::load(&ctx).unwrap();
    let graphs = crate::catalog::load_graphs(&ctx, &catalog).unwrap();
    let strategy = experiment(&ctx, SweepFamily::Strategy);
    assert_eq!(strategy.plan(&graphs).len(), 3 * 28);

    let done = strategy.table_path(&graphs[0]);
    fs::create_dir_all(done.parent().unwrap()).unwrap();
    fs::write(&done, "").unwrap();
    let items = strategy.plan(&graphs);
    assert_eq!(items.len(), 2 * 28);
    assert!(items.iter().all(|item| item.graph != graphs[0]));
    assert!(items[0]
        .output
        .ends_with("queen5_5.col/strategy/Random-Scratch.log"));
}

#[cfg(unix)]
#[test]
fn test_strategy_run_writes_graph_table() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    fake_solver(
        &ctx.data_root,
        &format!("grep -q 'DEBUG = 4' gls.ini || exit 1\necho '{SUMMARY}'\n"),
    );
    let graph = queen(&ctx);
    let strategy = experiment(&ctx, SweepFamily::Strategy);

    let report = strategy.run(&[graph.clone()], &pool(&ctx)).unwrap();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.completed, 28);
    assert_eq!(report.tables, vec![strategy.table_path(&graph)]);

    let table = Table::read(strategy.table_path(&graph)).unwrap();
    assert_eq!(table.len(), 28);
    assert_eq!(&table.header()[..4], ["init", "source", "destination", "k"]);
    let first = &table.records()[0];
    assert_eq!(first.get("init").unwrap().to_string(), "Scratch");
    assert_eq!(first.get("source").unwrap().to_string(), "");
    assert_eq!(first.get_f64("final_score"), Some(20.0));
    let last = &table.records()[27];
    assert_eq!(last.get("init").unwrap().to_string(), "Bipartite");
    assert_eq!(last.get("destination").unwrap().to_string(), "Median");
}

#[cfg(unix)]
#[test]
fn test_existing_logs_are_not_rerun() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let calls = root.path().join("calls");
    fake_solver(
        &ctx.data_root,
        &format!("echo run >> {}\necho '{SUMMARY}'\n", calls.display()),
    );
    let graph = queen(&ctx);
    let strategy = experiment(&ctx, SweepFamily::Strategy);
    let existing = strategy.log_path(&graph, &strategy.entries()[3]);
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, "1,1,1,1,1,1,1,1,1,1,1,1,1\n").unwrap();

    let report = strategy.run(&[graph.clone()], &pool(&ctx)).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.completed, 27);
    assert_eq!(fs::read_to_string(&calls).unwrap().lines().count(), 27);
    assert_eq!(
        fs::read_to_string(&existing).unwrap(),
        "1,1,1,1,1,1,1,1,1,1,1,1,1\n"
    );

    // A second run finds the graph table and plans nothing.
    let again = strategy.run(&[graph], &pool(&ctx)).unwrap();
    assert_eq!(again.items, 0);
    assert_eq!(fs::read_to_string(&calls).unwrap().lines().count(), 27);
}

#[cfg(unix)]
#[test]
fn test_failed_runs_leave_graph_incomplete() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    // Only the scratch runs print a usable summary.
    fake_solver(
        &ctx.data_root,
        &format!("grep -q 'UPDATE_STRATEGY = 0' gls.ini && echo '{SUMMARY}'\nexit 0\n"),
    );
    let graph = queen(&ctx);
    let strategy = experiment(&ctx, SweepFamily::Strategy);

    let report = strategy.run(&[graph.clone()], &pool(&ctx)).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed.len(), 27);
    assert_eq!(report.incomplete_graphs, vec![graph.to_string()]);
    assert!(!strategy.table_path(&graph).exists());
    let scratch = strategy.log_path(&graph, &strategy.entries()[0]);
    assert!(scratch.exists());
}

/// Rejects scratch updates for every build but random, like the solver does.
const SCRATCH_RANDOM_ONLY: &str = r#"
bs=$(grep '^BUILD_STRATEGY' gls.ini | cut -d= -f2 | tr -d ' ')
us=$(grep '^UPDATE_STRATEGY' gls.ini | cut -d= -f2 | tr -d ' ')
if [ "$bs" != 0 ] && [ "$us" = 0 ]; then
    echo "Scratch is supported only for random start"
    exit 1
fi
"#;

#[cfg(unix)]
#[test]
fn test_default_strategy_sweep_completes_with_scratch_restriction() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    fake_solver(&ctx.data_root, &format!("{SCRATCH_RANDOM_ONLY}echo '{SUMMARY}'\n"));
    let graph = queen(&ctx);
    let strategy = experiment(&ctx, SweepFamily::Strategy);

    let report = strategy.run(&[graph.clone()], &pool(&ctx)).unwrap();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.tables, vec![strategy.table_path(&graph)]);
    let table = Table::read(strategy.table_path(&graph)).unwrap();
    let scratch = table
        .records()
        .iter()
        .filter(|r| r.get("init").unwrap().to_string() == "Scratch")
        .count();
    assert_eq!(scratch, 1);

    // Scratch for every build is opt-in, the solver rejects two of those runs.
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    fake_solver(&ctx.data_root, &format!("{SCRATCH_RANDOM_ONLY}echo '{SUMMARY}'\n"));
    let graph = queen(&ctx);
    let every_build = Experiment::new(
        Arc::new(ctx.clone()),
        SweepSpec::new(SweepFamily::Strategy).with_scratch(ScratchPolicy::EveryBuild),
    );
    let report = every_build.run(&[graph.clone()], &pool(&ctx)).unwrap();
    assert_eq!(report.completed, 28);
    assert_eq!(report.failed.len(), 2);
    assert!(!every_build.table_path(&graph).exists());
}

#[cfg(unix)]
#[test]
fn test_moves_run_writes_trace_tables() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let log = fs::canonicalize("data/test/logs/moves.log").unwrap();
    fake_solver(&ctx.data_root, &format!("cat {}\n", log.display()));
    let graph = queen(&ctx);
    let moves = experiment(&ctx, SweepFamily::Moves);

    let report = moves.run(&[graph.clone()], &pool(&ctx)).unwrap();
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.tables.len(), 18);
    let trace = Table::read(graph.folder.join("moves.2.asp_keep.csv")).unwrap();
    assert_eq!(trace.header(), crate::log_parser::TRACE_COLUMNS);
    assert_eq!(trace.len(), 3 + 1 + 2);
}
