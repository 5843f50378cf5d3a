use super::*;
use crate::{aggregator::Filter, tabular::Value, test_utils::*};

fn write_strategy(
    ctx: &Context,
    group: &str,
    graph: &str,
    rows: &[(&str, f64, f64, f64, f64)],
) {
    let mut table = Table::new([
        "init",
        "source",
        "destination",
        "k",
        "time",
        "iterations",
        "conflicts",
    ]);
    for (init, k, time, iterations, conflicts) in rows {
        table
            .push_row([
                Value::from(*init),
                Value::from("Minimal"),
                Value::from("Maximum"),
                Value::from(*k),
                Value::from(*time),
                Value::from(*iterations),
                Value::from(*conflicts),
            ])
            .unwrap();
    }
    table
        .write(ctx.graph_folder(group, graph).join("strategy.csv"))
        .unwrap();
}

fn populate(ctx: &Context) {
    write_strategy(
        ctx,
        "dimacs",
        "queen5_5.col",
        &[("Random", 7.0, 10.0, 5.0, 2.0), ("Greedy", 6.0, 20.0, 0.0, 4.0)],
    );
    write_strategy(
        ctx,
        "dimacs",
        "myciel3.col",
        &[("Random", 4.0, 4.0, 3.0, 0.0), ("Greedy", 5.0, 8.0, 3.0, 0.0)],
    );
    write_strategy(
        ctx,
        "other",
        "tiny.col",
        &[("Random", 3.0, 1.0, 1.0, 1.0), ("Greedy", 4.0, 2.0, 1.0, 1.0)],
    );
}

fn column(table: &Table, name: &str) -> Vec<f64> {
    table
        .column(name)
        .map(|v| v.and_then(Value::as_f64).unwrap())
        .collect()
}

#[test]
fn test_group_summary() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let catalog = GraphCatalog::load(&ctx).unwrap();
    populate(&ctx);

    let path = group_summary(&ctx, &catalog, SweepFamily::Strategy, "dimacs").unwrap();
    assert_eq!(path, group_table_path(&ctx, SweepFamily::Strategy, "dimacs"));
    let table = Table::read(&path).unwrap();
    assert_eq!(
        table.header(),
        ["init", "source", "destination", "k", "time", "iterations", "conflicts", "hits"]
    );
    let inits = table
        .column("init")
        .map(|v| v.unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(inits, vec!["Random", "Greedy"]);
    assert_eq!(column(&table, "k"), vec![0.5, 1.0]);
    assert_eq!(column(&table, "time"), vec![0.75, 1.0]);
    assert_eq!(column(&table, "conflicts"), vec![0.5, 0.0]);
    assert_eq!(column(&table, "hits"), vec![2.0, 1.0]);
}

#[test]
fn test_group_summary_is_memoized() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let catalog = GraphCatalog::load(&ctx).unwrap();
    populate(&ctx);

    let path = group_summary(&ctx, &catalog, SweepFamily::Strategy, "dimacs").unwrap();
    let before = fs::read_to_string(&path).unwrap();
    fs::remove_file(ctx.graph_folder("dimacs", "myciel3.col").join("strategy.csv")).unwrap();
    group_summary(&ctx, &catalog, SweepFamily::Strategy, "dimacs").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_missing_group_and_family() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let catalog = GraphCatalog::load(&ctx).unwrap();
    populate(&ctx);

    let err = group_summary(&ctx, &catalog, SweepFamily::Strategy, "nothing").unwrap_err();
    assert!(err.is_not_found());
    let err = group_summary(&ctx, &catalog, SweepFamily::Meta, "dimacs").unwrap_err();
    assert!(err.is_not_found());
    let err = group_summary(&ctx, &catalog, SweepFamily::Moves, "dimacs").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_global_summary() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let catalog = GraphCatalog::load(&ctx).unwrap();
    populate(&ctx);

    let path = global_summary(&ctx, &catalog, SweepFamily::Strategy).unwrap();
    assert_eq!(path, global_table_path(&ctx, SweepFamily::Strategy));
    assert!(group_table_path(&ctx, SweepFamily::Strategy, "other").exists());
    let table = Table::read(&path).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.header().last().unwrap(), "hits");
    // dimacs hits 2 and 1 normalize to 1 and 0.5, other hits 1 and 1 stay as they are
    assert_eq!(column(&table, "hits"), vec![1.0, 0.75]);
}

#[test]
fn test_rank_report_skips_trivial_graphs() {
    let root = tempfile::tempdir().unwrap();
    let ctx = scratch_context(root.path());
    let catalog = GraphCatalog::load(&ctx).unwrap();
    populate(&ctx);

    let ranking = Ranking {
        key: "init".to_string(),
        filters: vec![Filter::Ne("iterations".to_string(), "0".to_string())],
        sort_by: vec!["k".to_string(), "time".to_string()],
        top: 1,
    };
    let table = rank_report(&ctx, &catalog, SweepFamily::Strategy, &ranking).unwrap();
    let rows = table
        .records()
        .iter()
        .map(|r| (r.get("init").unwrap().to_string(), r.get_f64("count").unwrap()))
        .collect::<Vec<_>>();
    // myciel3 is trivial, queen5_5 and tiny both rank Random first
    assert_eq!(rows, vec![("Random".to_string(), 2.0)]);
}
