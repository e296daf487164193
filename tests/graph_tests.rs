use production_schedule::{Dependency, Direction, GraphError, LinkType, Operation, OperationDag};

fn ops(ids: &[i32]) -> Vec<Operation> {
    ids.iter()
        .map(|&id| Operation::new(id, 1, format!("Op {id}"), 60))
        .collect()
}

fn fs(pred: i32, succ: i32) -> Dependency {
    Dependency::finish_to_start(pred, succ)
}

#[test]
fn dag_builds_edges_from_dependencies() {
    // 1 -> {2, 3} -> 4
    let dag = OperationDag::build(
        &ops(&[1, 2, 3, 4]),
        &[fs(1, 2), fs(1, 3), fs(2, 4), fs(3, 4)],
    )
    .unwrap();

    assert_eq!(dag.node_count(), 4);
    assert_eq!(dag.edge_count(), 4);
    assert_eq!(dag.predecessors(4), vec![2, 3]);
    assert_eq!(dag.successors(1), vec![2, 3]);
    assert!(dag.predecessors(1).is_empty());
}

#[test]
fn topological_order_breaks_ties_by_id() {
    let dag = OperationDag::build(
        &ops(&[4, 3, 2, 1]),
        &[fs(1, 2), fs(1, 3), fs(2, 4), fs(3, 4)],
    )
    .unwrap();

    assert_eq!(dag.topological_order(Direction::Forward), vec![1, 2, 3, 4]);
    assert_eq!(dag.topological_order(Direction::Backward), vec![4, 2, 3, 1]);
}

#[test]
fn independent_operations_come_out_in_id_order() {
    let dag = OperationDag::build(&ops(&[30, 10, 20]), &[]).unwrap();
    assert_eq!(dag.topological_order(Direction::Forward), vec![10, 20, 30]);
    assert_eq!(dag.topological_order(Direction::Backward), vec![10, 20, 30]);
}

#[test]
fn cycle_names_only_the_operations_on_it() {
    // 1 -> 2 -> 3 -> 1, and 3 -> 4 hanging off the cycle.
    let err = OperationDag::build(
        &ops(&[1, 2, 3, 4]),
        &[fs(1, 2), fs(2, 3), fs(3, 1), fs(3, 4)],
    )
    .unwrap_err();
    assert_eq!(err, GraphError::Cycle { operations: vec![1, 2, 3] });
}

#[test]
fn self_dependency_is_a_cycle() {
    let err = OperationDag::build(&ops(&[1, 2]), &[fs(1, 2), fs(2, 2)]).unwrap_err();
    assert_eq!(err, GraphError::Cycle { operations: vec![2] });
}

#[test]
fn unknown_operation_is_rejected() {
    let err = OperationDag::build(&ops(&[1, 2]), &[fs(1, 9)]).unwrap_err();
    assert_eq!(
        err,
        GraphError::UnknownOperation {
            operation_id: 9,
            predecessor: 1,
            successor: 9,
        }
    );
}

#[test]
fn duplicate_operation_is_rejected() {
    let err = OperationDag::build(&ops(&[1, 2, 1]), &[]).unwrap_err();
    assert_eq!(err, GraphError::DuplicateOperation { operation_id: 1 });
}

#[test]
fn repeated_dependency_collapses_to_one_edge() {
    let dag = OperationDag::build(&ops(&[1, 2]), &[fs(1, 2), fs(1, 2)]).unwrap();
    assert_eq!(dag.edge_count(), 1);
}

#[test]
fn non_finish_to_start_links_are_listed_as_degraded() {
    let dag = OperationDag::build(
        &ops(&[1, 2, 3]),
        &[
            fs(2, 3).with_link_type(LinkType::StartToStart),
            fs(1, 2),
            fs(1, 3).with_link_type(LinkType::FinishToFinish),
        ],
    )
    .unwrap();
    let degraded: Vec<(i32, i32, LinkType)> = dag
        .degraded_links()
        .into_iter()
        .map(|d| (d.predecessor, d.successor, d.link_type))
        .collect();
    assert_eq!(
        degraded,
        vec![
            (1, 3, LinkType::FinishToFinish),
            (2, 3, LinkType::StartToStart),
        ]
    );
}
