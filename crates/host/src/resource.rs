use std::fmt;
use std::path::PathBuf;

/// Level of a node in the menu-resource hierarchy.
/// 選單資源階層中的節點層級。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Host-owned workspace; never deleted by the framework.
    Container,
    SubContainer,
    Group,
    /// Control bound to a command definition; has no children.
    Leaf,
}

impl NodeKind {
    /// Kind of the nodes this kind may contain.
    pub fn child_kind(self) -> Option<NodeKind> {
        match self {
            NodeKind::Container => Some(NodeKind::SubContainer),
            NodeKind::SubContainer => Some(NodeKind::Group),
            NodeKind::Group => Some(NodeKind::Leaf),
            NodeKind::Leaf => None,
        }
    }

    pub fn is_framework_owned(self) -> bool {
        !matches!(self, NodeKind::Container)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Container => "container",
            NodeKind::SubContainer => "sub-container",
            NodeKind::Group => "group",
            NodeKind::Leaf => "leaf",
        })
    }
}

/// Path of ids from the container down to a node.
/// 從容器到節點的識別碼路徑。
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn root(container_id: impl Into<String>) -> Self {
        Self(vec![container_id.into()])
    }

    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(id.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<NodePath> {
        match self.0.len() {
            0 | 1 => None,
            len => Some(Self(self.0[..len - 1].to_vec())),
        }
    }

    /// Id of the node the path points at.
    pub fn id(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Kind implied by depth (1 = container … 4 = leaf).
    pub fn kind(&self) -> Option<NodeKind> {
        match self.0.len() {
            1 => Some(NodeKind::Container),
            2 => Some(NodeKind::SubContainer),
            3 => Some(NodeKind::Group),
            4 => Some(NodeKind::Leaf),
            _ => None,
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Snapshot of one node as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceNode {
    pub id: String,
    pub display_name: String,
    pub parent_id: Option<String>,
    pub kind: NodeKind,
    /// Only meaningful for leaves.
    pub promoted: bool,
}

/// Creation request for a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: String,
    pub display_name: String,
    pub kind: NodeKind,
    pub insert_after: Option<String>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
            insert_after: None,
        }
    }

    pub fn after(mut self, sibling: Option<String>) -> Self {
        self.insert_after = sibling;
        self
    }
}

/// Host-side command definition a leaf control is bound to.
/// 葉節點控制項所綁定的主機命令定義。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub resource_folder: Option<PathBuf>,
    pub tooltip_image: Option<PathBuf>,
}
