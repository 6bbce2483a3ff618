//! Idempotent provisioning and teardown of the menu-resource tree.
//! 選單資源樹的冪等建立與拆除。
//!
//! The tree has four levels: a host-owned container (workspace), a
//! sub-container (tab), a group (panel) and a leaf control (button) bound to a
//! command definition. Every ensure step reuses what already exists; teardown
//! removes the leaf and then reclaims ancestors that became empty.

use cambench_host::{CommandDefinition, HostError, NodeKind, NodePath, NodeSpec, WorkspaceHost};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Where a command's control lives.
/// 命令控制項在資源樹中的位置。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub container_id: String,
    pub sub_id: String,
    pub sub_name: String,
    pub group_id: String,
    pub group_name: String,
    /// Sibling group the group is placed after when it has to be created.
    pub insert_after: Option<String>,
}

impl Placement {
    pub fn container_path(&self) -> NodePath {
        NodePath::root(&self.container_id)
    }

    pub fn sub_path(&self) -> NodePath {
        self.container_path().child(&self.sub_id)
    }

    pub fn group_path(&self) -> NodePath {
        self.sub_path().child(&self.group_id)
    }

    pub fn leaf_path(&self, leaf_id: &str) -> NodePath {
        self.group_path().child(leaf_id)
    }
}

/// Identity of the leaf control and its backing command definition.
/// 葉節點控制項及其命令定義的識別資料。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafDescriptor {
    pub command_id: String,
    pub display_name: String,
    pub description: String,
    pub promoted: bool,
    pub resource_folder: Option<PathBuf>,
    pub tooltip_image: Option<PathBuf>,
}

impl LeafDescriptor {
    pub fn new(command_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            display_name: display_name.into(),
            description: String::new(),
            promoted: false,
            resource_folder: None,
            tooltip_image: None,
        }
    }

    fn definition(&self) -> CommandDefinition {
        CommandDefinition {
            id: self.command_id.clone(),
            name: self.display_name.clone(),
            description: self.description.clone(),
            resource_folder: self.resource_folder.clone(),
            tooltip_image: self.tooltip_image.clone(),
        }
    }
}

/// Provisioned leaf control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafHandle {
    path: NodePath,
}

impl LeafHandle {
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn command_id(&self) -> &str {
        self.path.id().unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("container '{0}' does not exist in the host workspace")]
    UnknownContainer(String),
    #[error("host rejected provisioning of '{path}'")]
    Host {
        path: String,
        #[source]
        error: HostError,
    },
}

/// Delete the host refused during teardown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeardownFailure {
    pub target: String,
    pub error: HostError,
}

/// Outcome of [`ResourceTree::teardown_path`].
/// 拆除作業的結果摘要。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Nodes deleted, in deletion order.
    pub removed: Vec<NodePath>,
    pub definition_removed: bool,
    /// Ancestors left in place because other children still use them.
    pub retained: Vec<NodePath>,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, target: impl Into<String>, error: HostError) {
        let target = target.into();
        warn!(%target, %error, "teardown step failed");
        self.failures.push(TeardownFailure { target, error });
    }
}

/// Resource-tree operations over a host workspace.
/// 以主機工作區為對象的資源樹操作。
pub struct ResourceTree<'a, H: WorkspaceHost + ?Sized> {
    host: &'a H,
}

impl<'a, H: WorkspaceHost + ?Sized> ResourceTree<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Ensures every level below the container exists and returns the leaf.
    /// Calling it again with the same arguments changes nothing.
    /// 確保容器以下各層皆存在並回傳葉節點；重複呼叫不會產生變化。
    pub fn ensure_path(
        &self,
        placement: &Placement,
        leaf: &LeafDescriptor,
    ) -> Result<LeafHandle, ResourceError> {
        let container = placement.container_path();
        if self.host.find_node(&container).is_none() {
            return Err(ResourceError::UnknownContainer(
                placement.container_id.clone(),
            ));
        }

        let sub = self.ensure_node(
            &container,
            NodeSpec::new(&placement.sub_id, &placement.sub_name, NodeKind::SubContainer),
        )?;
        let group = self.ensure_node(
            &sub,
            NodeSpec::new(&placement.group_id, &placement.group_name, NodeKind::Group)
                .after(placement.insert_after.clone()),
        )?;

        if self.host.find_definition(&leaf.command_id).is_none() {
            self.host
                .add_definition(leaf.definition())
                .map_err(|error| ResourceError::Host {
                    path: leaf.command_id.clone(),
                    error,
                })?;
            debug!(command = %leaf.command_id, "command definition created");
        }

        let path = self.ensure_node(
            &group,
            NodeSpec::new(&leaf.command_id, &leaf.display_name, NodeKind::Leaf),
        )?;
        self.host
            .set_promoted(&path, leaf.promoted)
            .map_err(|error| ResourceError::Host {
                path: path.to_string(),
                error,
            })?;
        Ok(LeafHandle { path })
    }

    /// Removes the leaf and its definition, then the group and the
    /// sub-container if each is left empty. The container is never touched.
    /// Failed deletes are recorded and the remaining steps still run, so a
    /// later call can finish the job.
    /// 移除葉節點與命令定義，再依序回收變空的群組與子容器；失敗會記錄並可重試。
    pub fn teardown_path(
        &self,
        container_id: &str,
        sub_id: &str,
        group_id: &str,
        leaf_id: &str,
    ) -> TeardownReport {
        let sub = NodePath::root(container_id).child(sub_id);
        let group = sub.child(group_id);
        let leaf = group.child(leaf_id);
        let mut report = TeardownReport::default();

        if self.host.find_node(&leaf).is_some() {
            match self.host.delete_node(&leaf) {
                Ok(()) => report.removed.push(leaf.clone()),
                Err(error) => report.fail(leaf.to_string(), error),
            }
        }
        if self.host.find_definition(leaf_id).is_some() {
            match self.host.delete_definition(leaf_id) {
                Ok(()) => report.definition_removed = true,
                Err(error) => report.fail(leaf_id, error),
            }
        }

        self.reclaim_if_empty(&group, &mut report);
        self.reclaim_if_empty(&sub, &mut report);
        debug!(
            leaf = %leaf,
            removed = report.removed.len(),
            failures = report.failures.len(),
            "teardown finished"
        );
        report
    }

    pub fn teardown_placement(&self, placement: &Placement, leaf_id: &str) -> TeardownReport {
        self.teardown_path(
            &placement.container_id,
            &placement.sub_id,
            &placement.group_id,
            leaf_id,
        )
    }

    pub fn find_leaf(
        &self,
        container_id: &str,
        sub_id: &str,
        group_id: &str,
        leaf_id: &str,
    ) -> Option<LeafHandle> {
        let path = NodePath::root(container_id)
            .child(sub_id)
            .child(group_id)
            .child(leaf_id);
        self.host
            .find_node(&path)
            .filter(|node| node.kind == NodeKind::Leaf)
            .map(|_| LeafHandle { path })
    }

    fn ensure_node(&self, parent: &NodePath, spec: NodeSpec) -> Result<NodePath, ResourceError> {
        let path = parent.child(&spec.id);
        if self.host.find_node(&path).is_some() {
            return Ok(path);
        }
        let kind = spec.kind;
        self.host
            .create_node(parent, spec)
            .map_err(|error| ResourceError::Host {
                path: path.to_string(),
                error,
            })?;
        debug!(%path, %kind, "resource node created");
        Ok(path)
    }

    fn reclaim_if_empty(&self, path: &NodePath, report: &mut TeardownReport) {
        if self.host.find_node(path).is_none() {
            return;
        }
        match self.host.children(path) {
            Ok(children) if children.is_empty() => match self.host.delete_node(path) {
                Ok(()) => report.removed.push(path.clone()),
                Err(error) => report.fail(path.to_string(), error),
            },
            Ok(_) => report.retained.push(path.clone()),
            Err(error) => report.fail(path.to_string(), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cambench_host::SimulatedHost;

    #[test]
    fn leaf_handle_reports_command_id() {
        let handle = LeafHandle {
            path: NodePath::root("CAM").child("T1").child("G1").child("C1"),
        };
        assert_eq!(handle.command_id(), "C1");
    }

    #[test]
    fn teardown_on_empty_workspace_is_a_no_op() {
        let host = SimulatedHost::new();
        host.add_container("CAM", "Manufacture");
        let report = ResourceTree::new(&host).teardown_path("CAM", "T1", "G1", "C1");
        assert_eq!(report, TeardownReport::default());
        assert!(report.is_complete());
    }

    #[test]
    fn placement_paths_nest() {
        let placement = Placement {
            container_id: "CAM".into(),
            sub_id: "T1".into(),
            sub_name: "Tab One".into(),
            group_id: "G1".into(),
            group_name: "Group One".into(),
            insert_after: None,
        };
        assert_eq!(placement.leaf_path("C1").to_string(), "CAM/T1/G1/C1");
        assert_eq!(placement.group_path().parent(), Some(placement.sub_path()));
    }
}
