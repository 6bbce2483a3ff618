//! Host application contract for CamBench extensions.
//! CamBench 擴充功能與主機應用程式之間的介面。
//!
//! The framework never talks to a concrete application object model. It only
//! needs the primitives below: a workspace registry holding the menu-resource
//! tree, an event subscription primitive, and a handful of session services.
//! [`SimulatedHost`] implements all of them in memory for the CLI and tests.
//! 框架只依賴下列基本操作：保存選單資源樹的工作區登錄、事件訂閱機制與少量工作階段服務。
//! [`SimulatedHost`] 以記憶體實作全部介面，供 CLI 與測試使用。

mod event;
mod resource;
pub mod simulated;

use std::path::PathBuf;
use thiserror::Error;

pub use event::{
    Callback, EventKind, EventSource, EventTarget, HostEvent, InputChange, InputSpec, InputValue,
    SelectionRef, SessionToken, SubscriptionHandle, TerminationReason, WeakCallback,
};
pub use resource::{CommandDefinition, NodeKind, NodePath, NodeSpec, ResourceNode};
pub use simulated::SimulatedHost;

/// Errors reported by a host implementation.
/// 主機實作回報的錯誤。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("node '{0}' not found")]
    NodeNotFound(NodePath),
    #[error("node '{0}' already exists")]
    DuplicateNode(NodePath),
    #[error("node '{0}' cannot hold a {1}")]
    InvalidParent(NodePath, NodeKind),
    #[error("node '{path}' still has {children} children")]
    NotEmpty { path: NodePath, children: usize },
    #[error("node '{0}' is owned by the host")]
    HostOwned(NodePath),
    #[error("command definition '{0}' not found")]
    UnknownDefinition(String),
    #[error("command definition '{0}' already exists")]
    DuplicateDefinition(String),
    #[error("subscription {0} is not registered")]
    UnknownSubscription(SubscriptionHandle),
    #[error("{0} is not open")]
    UnknownSession(SessionToken),
    #[error("host refused the operation on '{0}'")]
    Refused(String),
}

/// Workspace registry: lookup, creation and deletion of menu resources.
/// 工作區登錄：選單資源的查詢、建立與刪除。
pub trait WorkspaceHost {
    fn find_node(&self, path: &NodePath) -> Option<ResourceNode>;

    fn children(&self, path: &NodePath) -> Result<Vec<ResourceNode>, HostError>;

    /// Creates `spec` under `parent`. Leaves require an existing definition
    /// with the same id.
    fn create_node(&self, parent: &NodePath, spec: NodeSpec) -> Result<ResourceNode, HostError>;

    /// Deletes an empty, framework-owned node.
    fn delete_node(&self, path: &NodePath) -> Result<(), HostError>;

    fn set_promoted(&self, path: &NodePath, promoted: bool) -> Result<(), HostError>;

    fn find_definition(&self, id: &str) -> Option<CommandDefinition>;

    fn add_definition(&self, definition: CommandDefinition) -> Result<(), HostError>;

    fn delete_definition(&self, id: &str) -> Result<(), HostError>;
}

/// Event subscription primitive.
///
/// The host only keeps a weak reference to each callback, mirroring hosts whose
/// event objects do not keep the subscriber alive. Whoever subscribes must hold
/// the strong reference for as long as the subscription should stay live.
pub trait EventHost {
    fn subscribe(
        &self,
        source: &EventSource,
        callback: WeakCallback,
    ) -> Result<SubscriptionHandle, HostError>;

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), HostError>;
}

/// Full host surface used by command lifecycles.
pub trait Host: WorkspaceHost + EventHost {
    /// Modal message shown to the user (message box equivalent).
    fn notify_user(&self, message: &str);

    /// Folder picker; `None` when the user dismisses it.
    fn choose_folder(&self, _title: &str) -> Option<PathBuf> {
        None
    }

    /// Whether a previously picked entity still exists and is current.
    fn is_selection_valid(&self, _selection: &SelectionRef) -> bool {
        true
    }

    /// Shows the dialog inputs declared for a session.
    fn present_inputs(&self, _session: SessionToken, _inputs: &[InputSpec]) {}

    /// Mirrors a framework-side input update into the visible dialog.
    fn update_input(&self, _session: SessionToken, _id: &str, _value: &InputValue) {}
}
