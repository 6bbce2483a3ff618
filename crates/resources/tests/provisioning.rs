use cambench_host::{HostError, NodeKind, NodePath, SimulatedHost, WorkspaceHost};
use cambench_resources::{LeafDescriptor, Placement, ResourceError, ResourceTree};

fn placement() -> Placement {
    Placement {
        container_id: "CAM".into(),
        sub_id: "T1".into(),
        sub_name: "Tab One".into(),
        group_id: "G1".into(),
        group_name: "Group One".into(),
        insert_after: None,
    }
}

fn host_with_workspace() -> SimulatedHost {
    let host = SimulatedHost::new();
    host.add_container("CAM", "Manufacture");
    host
}

fn child_ids(host: &SimulatedHost, path: &NodePath) -> Vec<String> {
    host.children(path)
        .unwrap()
        .into_iter()
        .map(|node| node.id)
        .collect()
}

#[test]
fn install_then_uninstall_scenario() {
    let host = host_with_workspace();
    let tree = ResourceTree::new(&host);
    let mut leaf = LeafDescriptor::new("C1", "Command One");
    leaf.promoted = true;

    let handle = tree.ensure_path(&placement(), &leaf).unwrap();
    assert_eq!(handle.path().to_string(), "CAM/T1/G1/C1");
    let found = tree.find_leaf("CAM", "T1", "G1", "C1").expect("leaf");
    assert_eq!(found, handle);
    let node = host.find_node(handle.path()).unwrap();
    assert_eq!(node.kind, NodeKind::Leaf);
    assert!(node.promoted);
    assert!(host.find_definition("C1").is_some());

    let report = tree.teardown_path("CAM", "T1", "G1", "C1");
    assert!(report.is_complete());
    assert!(report.definition_removed);
    assert_eq!(report.removed.len(), 3);
    assert!(child_ids(&host, &NodePath::root("CAM")).is_empty());
    assert!(host.find_node(&NodePath::root("CAM")).is_some());
    assert!(host.definition_ids().is_empty());
}

#[test]
fn ensure_path_is_idempotent() {
    let host = host_with_workspace();
    let tree = ResourceTree::new(&host);
    let leaf = LeafDescriptor::new("C1", "Command One");

    let first = tree.ensure_path(&placement(), &leaf).unwrap();
    let layout = host.render_tree();
    let second = tree.ensure_path(&placement(), &leaf).unwrap();

    assert_eq!(first, second);
    assert_eq!(host.render_tree(), layout);
    assert_eq!(child_ids(&host, &placement().group_path()), vec!["C1"]);
    assert_eq!(host.definition_ids(), vec!["C1"]);
}

#[test]
fn teardown_keeps_groups_still_in_use() {
    let host = host_with_workspace();
    let tree = ResourceTree::new(&host);
    tree.ensure_path(&placement(), &LeafDescriptor::new("C1", "One"))
        .unwrap();
    tree.ensure_path(&placement(), &LeafDescriptor::new("C2", "Two"))
        .unwrap();

    let report = tree.teardown_placement(&placement(), "C1");
    assert_eq!(report.removed, vec![placement().leaf_path("C1")]);
    assert_eq!(
        report.retained,
        vec![placement().group_path(), placement().sub_path()]
    );
    assert_eq!(child_ids(&host, &placement().group_path()), vec!["C2"]);

    tree.teardown_placement(&placement(), "C2");
    assert!(child_ids(&host, &NodePath::root("CAM")).is_empty());
}

#[test]
fn group_is_positioned_after_requested_sibling() {
    let host = host_with_workspace();
    let tree = ResourceTree::new(&host);
    let mut first = placement();
    first.group_id = "A".into();
    let mut last = placement();
    last.group_id = "C".into();
    tree.ensure_path(&first, &LeafDescriptor::new("CA", "A"))
        .unwrap();
    tree.ensure_path(&last, &LeafDescriptor::new("CC", "C"))
        .unwrap();

    let mut middle = placement();
    middle.group_id = "B".into();
    middle.insert_after = Some("A".into());
    tree.ensure_path(&middle, &LeafDescriptor::new("CB", "B"))
        .unwrap();

    assert_eq!(child_ids(&host, &placement().sub_path()), vec!["A", "B", "C"]);
}

#[test]
fn unknown_container_is_reported_and_nothing_is_created() {
    let host = SimulatedHost::new();
    let tree = ResourceTree::new(&host);
    let err = tree
        .ensure_path(&placement(), &LeafDescriptor::new("C1", "One"))
        .unwrap_err();
    assert!(matches!(err, ResourceError::UnknownContainer(ref id) if id == "CAM"));
    assert!(host.definition_ids().is_empty());
}

#[test]
fn refused_delete_is_tolerated_and_retry_finishes() {
    let host = host_with_workspace();
    let tree = ResourceTree::new(&host);
    tree.ensure_path(&placement(), &LeafDescriptor::new("C1", "One"))
        .unwrap();
    host.refuse_deletion(placement().group_path());

    let report = tree.teardown_placement(&placement(), "C1");
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].error,
        HostError::Refused(placement().group_path().to_string())
    );
    // The sub-container still holds the group, so it is kept.
    assert_eq!(report.retained, vec![placement().sub_path()]);
    assert!(host.find_node(&placement().group_path()).is_some());

    host.allow_deletion(&placement().group_path());
    let retry = tree.teardown_placement(&placement(), "C1");
    assert!(retry.is_complete());
    assert_eq!(
        retry.removed,
        vec![placement().group_path(), placement().sub_path()]
    );
}
