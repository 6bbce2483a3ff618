//! In-memory host used by the CLI and by tests.
//! 供 CLI 與測試使用的記憶體內主機。
//!
//! Everything lives behind one `RefCell`; no borrow is held while a callback
//! runs, so handlers may subscribe, unsubscribe or edit resources re-entrantly.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::{
    CommandDefinition, EventHost, EventKind, EventSource, Host, HostError, HostEvent, InputChange,
    InputSpec, InputValue, NodeKind, NodePath, NodeSpec, ResourceNode, SelectionRef,
    SessionToken, SubscriptionHandle, TerminationReason, WeakCallback, WorkspaceHost,
};

struct SimNode {
    node: ResourceNode,
    children: Vec<SimNode>,
}

impl SimNode {
    fn new(node: ResourceNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }
}

struct Subscription {
    source: EventSource,
    callback: WeakCallback,
}

struct SimSession {
    command_id: String,
    inputs: Vec<InputSpec>,
}

#[derive(Default)]
struct SimState {
    containers: Vec<SimNode>,
    definitions: BTreeMap<String, CommandDefinition>,
    subscriptions: BTreeMap<SubscriptionHandle, Subscription>,
    sessions: BTreeMap<SessionToken, SimSession>,
    next_handle: u64,
    next_session: u64,
    refused_deletions: BTreeSet<NodePath>,
    stale_entities: BTreeSet<String>,
    folder_choice: Option<PathBuf>,
    notices: Vec<String>,
}

/// Headless host implementing the full [`Host`] contract.
/// 實作完整 [`Host`] 介面的無介面主機。
#[derive(Default)]
pub struct SimulatedHost {
    state: RefCell<SimState>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host-owned container (workspace). Existing ids are kept.
    /// 註冊主機擁有的容器（工作區）；已存在時保留原狀。
    pub fn add_container(&self, id: impl Into<String>, display_name: impl Into<String>) {
        let id = id.into();
        let mut state = self.state.borrow_mut();
        if state.containers.iter().any(|container| container.node.id == id) {
            return;
        }
        state.containers.push(SimNode::new(ResourceNode {
            id,
            display_name: display_name.into(),
            parent_id: None,
            kind: NodeKind::Container,
            promoted: false,
        }));
    }

    /// Makes the next delete of `path` fail, as a host might for locked UI.
    pub fn refuse_deletion(&self, path: NodePath) {
        self.state.borrow_mut().refused_deletions.insert(path);
    }

    pub fn allow_deletion(&self, path: &NodePath) {
        self.state.borrow_mut().refused_deletions.remove(path);
    }

    /// Invalidates an entity so selections pointing at it become stale.
    pub fn mark_stale(&self, entity_id: impl Into<String>) {
        self.state.borrow_mut().stale_entities.insert(entity_id.into());
    }

    /// Answer returned by the next folder pickers.
    pub fn set_folder_choice(&self, folder: Option<PathBuf>) {
        self.state.borrow_mut().folder_choice = folder;
    }

    /// Messages shown through [`Host::notify_user`].
    pub fn notices(&self) -> Vec<String> {
        self.state.borrow().notices.clone()
    }

    pub fn definition_ids(&self) -> Vec<String> {
        self.state.borrow().definitions.keys().cloned().collect()
    }

    /// Number of registered subscriptions, live or not.
    pub fn subscription_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Subscriptions on `source` whose callback can still be reached.
    pub fn live_subscribers(&self, source: &EventSource) -> usize {
        self.state
            .borrow()
            .subscriptions
            .values()
            .filter(|sub| &sub.source == source && sub.callback.strong_count() > 0)
            .count()
    }

    pub fn open_sessions(&self) -> Vec<SessionToken> {
        self.state.borrow().sessions.keys().copied().collect()
    }

    pub fn session_command(&self, session: SessionToken) -> Option<String> {
        self.state
            .borrow()
            .sessions
            .get(&session)
            .map(|sim| sim.command_id.clone())
    }

    /// Inputs currently shown in the dialog of `session`.
    pub fn session_inputs(&self, session: SessionToken) -> Option<Vec<InputSpec>> {
        self.state
            .borrow()
            .sessions
            .get(&session)
            .map(|sim| sim.inputs.clone())
    }

    /// Delivers `event` to every live subscriber of `source`, returning how many ran.
    /// 將事件傳遞給 `source` 的所有有效訂閱者，並回傳實際執行的數量。
    pub fn fire(&self, source: &EventSource, event: &mut HostEvent) -> usize {
        let targets: Vec<(SubscriptionHandle, WeakCallback)> = {
            let state = self.state.borrow();
            state
                .subscriptions
                .iter()
                .filter(|(_, sub)| &sub.source == source)
                .map(|(handle, sub)| (*handle, sub.callback.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (handle, weak) in targets {
            // An earlier handler in this dispatch may have unsubscribed this one.
            if !self.state.borrow().subscriptions.contains_key(&handle) {
                continue;
            }
            let Some(callback) = weak.upgrade() else {
                continue;
            };
            callback(&mut *event);
            delivered += 1;
        }
        debug!(%source, delivered, "dispatched host event");
        delivered
    }

    /// Simulates a click on the command's button: opens a dialog and fires "created".
    pub fn start_session(&self, command_id: &str) -> Result<SessionToken, HostError> {
        let session = {
            let mut state = self.state.borrow_mut();
            if !state.definitions.contains_key(command_id) {
                return Err(HostError::UnknownDefinition(command_id.to_string()));
            }
            state.next_session += 1;
            let token = SessionToken::new(state.next_session);
            state.sessions.insert(
                token,
                SimSession {
                    command_id: command_id.to_string(),
                    inputs: Vec::new(),
                },
            );
            token
        };
        let mut event = HostEvent::CommandCreated {
            command_id: command_id.to_string(),
            session,
        };
        self.fire(&EventSource::command_created(command_id), &mut event);
        Ok(session)
    }

    pub fn change_input(
        &self,
        session: SessionToken,
        change: InputChange,
    ) -> Result<usize, HostError> {
        {
            let mut state = self.state.borrow_mut();
            let sim = state
                .sessions
                .get_mut(&session)
                .ok_or(HostError::UnknownSession(session))?;
            if let Some(spec) = sim.inputs.iter_mut().find(|spec| spec.id == change.id) {
                spec.value = change.value.clone();
            }
        }
        let mut event = HostEvent::InputChanged { session, change };
        Ok(self.fire(
            &EventSource::session(session, EventKind::InputChanged),
            &mut event,
        ))
    }

    /// Asks subscribers whether the confirmation action should be enabled.
    pub fn validate(&self, session: SessionToken) -> Result<bool, HostError> {
        self.ensure_open(session)?;
        let mut event = HostEvent::ValidateInputs {
            session,
            inputs_valid: true,
        };
        self.fire(
            &EventSource::session(session, EventKind::ValidateInputs),
            &mut event,
        );
        match event {
            HostEvent::ValidateInputs { inputs_valid, .. } => Ok(inputs_valid),
            _ => Ok(false),
        }
    }

    pub fn execute(&self, session: SessionToken) -> Result<usize, HostError> {
        self.ensure_open(session)?;
        let mut event = HostEvent::Execute { session };
        Ok(self.fire(
            &EventSource::session(session, EventKind::Execute),
            &mut event,
        ))
    }

    /// Closes the dialog. No further events are accepted for `session`.
    pub fn destroy(
        &self,
        session: SessionToken,
        reason: TerminationReason,
    ) -> Result<usize, HostError> {
        self.ensure_open(session)?;
        let mut event = HostEvent::Destroy { session, reason };
        let delivered = self.fire(
            &EventSource::session(session, EventKind::Destroy),
            &mut event,
        );
        self.state.borrow_mut().sessions.remove(&session);
        Ok(delivered)
    }

    /// Indented dump of every container and its descendants.
    /// 以縮排列出所有容器及其子節點。
    pub fn render_tree(&self) -> String {
        let state = self.state.borrow();
        let mut out = String::new();
        for container in &state.containers {
            render_node(container, 0, &mut out);
        }
        out
    }

    fn ensure_open(&self, session: SessionToken) -> Result<(), HostError> {
        if self.state.borrow().sessions.contains_key(&session) {
            Ok(())
        } else {
            Err(HostError::UnknownSession(session))
        }
    }
}

fn render_node(node: &SimNode, depth: usize, out: &mut String) {
    let marker = if node.node.promoted { " *" } else { "" };
    let _ = writeln!(
        out,
        "{}{} [{}] \"{}\"{}",
        "  ".repeat(depth),
        node.node.id,
        node.node.kind,
        node.node.display_name,
        marker
    );
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

fn locate<'a>(nodes: &'a [SimNode], segments: &[String]) -> Option<&'a SimNode> {
    let (first, rest) = segments.split_first()?;
    let node = nodes.iter().find(|candidate| &candidate.node.id == first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        locate(&node.children, rest)
    }
}

fn locate_mut<'a>(nodes: &'a mut [SimNode], segments: &[String]) -> Option<&'a mut SimNode> {
    let (first, rest) = segments.split_first()?;
    let node = nodes
        .iter_mut()
        .find(|candidate| &candidate.node.id == first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        locate_mut(&mut node.children, rest)
    }
}

impl WorkspaceHost for SimulatedHost {
    fn find_node(&self, path: &NodePath) -> Option<ResourceNode> {
        let state = self.state.borrow();
        locate(&state.containers, path.segments()).map(|sim| sim.node.clone())
    }

    fn children(&self, path: &NodePath) -> Result<Vec<ResourceNode>, HostError> {
        let state = self.state.borrow();
        locate(&state.containers, path.segments())
            .map(|sim| sim.children.iter().map(|child| child.node.clone()).collect())
            .ok_or_else(|| HostError::NodeNotFound(path.clone()))
    }

    fn create_node(&self, parent: &NodePath, spec: NodeSpec) -> Result<ResourceNode, HostError> {
        let mut state = self.state.borrow_mut();
        if spec.kind == NodeKind::Leaf && !state.definitions.contains_key(&spec.id) {
            return Err(HostError::UnknownDefinition(spec.id));
        }
        let parent_node = locate_mut(&mut state.containers, parent.segments())
            .ok_or_else(|| HostError::NodeNotFound(parent.clone()))?;
        if parent_node.node.kind.child_kind() != Some(spec.kind) {
            return Err(HostError::InvalidParent(parent.clone(), spec.kind));
        }
        if parent_node
            .children
            .iter()
            .any(|child| child.node.id == spec.id)
        {
            return Err(HostError::DuplicateNode(parent.child(spec.id)));
        }

        let position = spec
            .insert_after
            .as_deref()
            .and_then(|after| {
                parent_node
                    .children
                    .iter()
                    .position(|child| child.node.id == after)
            })
            .map(|index| index + 1)
            .unwrap_or(parent_node.children.len());
        let node = ResourceNode {
            id: spec.id,
            display_name: spec.display_name,
            parent_id: Some(parent_node.node.id.clone()),
            kind: spec.kind,
            promoted: false,
        };
        parent_node
            .children
            .insert(position, SimNode::new(node.clone()));
        Ok(node)
    }

    fn delete_node(&self, path: &NodePath) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        let Some(parent_path) = path.parent() else {
            return Err(HostError::HostOwned(path.clone()));
        };
        if state.refused_deletions.contains(path) {
            return Err(HostError::Refused(path.to_string()));
        }
        let parent = locate_mut(&mut state.containers, parent_path.segments())
            .ok_or_else(|| HostError::NodeNotFound(path.clone()))?;
        let index = parent
            .children
            .iter()
            .position(|child| Some(child.node.id.as_str()) == path.id())
            .ok_or_else(|| HostError::NodeNotFound(path.clone()))?;
        let children = parent.children[index].children.len();
        if children > 0 {
            return Err(HostError::NotEmpty {
                path: path.clone(),
                children,
            });
        }
        parent.children.remove(index);
        Ok(())
    }

    fn set_promoted(&self, path: &NodePath, promoted: bool) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        let sim = locate_mut(&mut state.containers, path.segments())
            .ok_or_else(|| HostError::NodeNotFound(path.clone()))?;
        sim.node.promoted = promoted;
        Ok(())
    }

    fn find_definition(&self, id: &str) -> Option<CommandDefinition> {
        self.state.borrow().definitions.get(id).cloned()
    }

    fn add_definition(&self, definition: CommandDefinition) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.definitions.contains_key(&definition.id) {
            return Err(HostError::DuplicateDefinition(definition.id));
        }
        state.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    fn delete_definition(&self, id: &str) -> Result<(), HostError> {
        self.state
            .borrow_mut()
            .definitions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HostError::UnknownDefinition(id.to_string()))
    }
}

impl EventHost for SimulatedHost {
    fn subscribe(
        &self,
        source: &EventSource,
        callback: WeakCallback,
    ) -> Result<SubscriptionHandle, HostError> {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = SubscriptionHandle::new(state.next_handle);
        state.subscriptions.insert(
            handle,
            Subscription {
                source: source.clone(),
                callback,
            },
        );
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), HostError> {
        self.state
            .borrow_mut()
            .subscriptions
            .remove(&handle)
            .map(|_| ())
            .ok_or(HostError::UnknownSubscription(handle))
    }
}

impl Host for SimulatedHost {
    fn notify_user(&self, message: &str) {
        info!(message, "host notice");
        self.state.borrow_mut().notices.push(message.to_string());
    }

    fn choose_folder(&self, _title: &str) -> Option<PathBuf> {
        self.state.borrow().folder_choice.clone()
    }

    fn is_selection_valid(&self, selection: &SelectionRef) -> bool {
        !self
            .state
            .borrow()
            .stale_entities
            .contains(&selection.entity_id)
    }

    fn present_inputs(&self, session: SessionToken, inputs: &[InputSpec]) {
        if let Some(sim) = self.state.borrow_mut().sessions.get_mut(&session) {
            sim.inputs = inputs.to_vec();
        }
    }

    fn update_input(&self, session: SessionToken, id: &str, value: &InputValue) {
        let mut state = self.state.borrow_mut();
        let Some(sim) = state.sessions.get_mut(&session) else {
            return;
        };
        if let Some(spec) = sim.inputs.iter_mut().find(|spec| spec.id == id) {
            spec.value = value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Callback, EventTarget};
    use std::cell::Cell;
    use std::rc::Rc;

    fn definition(id: &str) -> CommandDefinition {
        CommandDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            resource_folder: None,
            tooltip_image: None,
        }
    }

    fn counting_callback(counter: &Rc<Cell<usize>>) -> Callback {
        let counter = Rc::clone(counter);
        Rc::new(move |_event: &mut HostEvent| counter.set(counter.get() + 1))
    }

    #[test]
    fn groups_honour_insert_after() {
        let host = SimulatedHost::new();
        host.add_container("CAM", "Manufacture");
        let tab = NodePath::root("CAM");
        host.create_node(&tab, NodeSpec::new("T1", "Tab", NodeKind::SubContainer))
            .unwrap();
        let tab = tab.child("T1");
        for id in ["A", "C"] {
            host.create_node(&tab, NodeSpec::new(id, id, NodeKind::Group))
                .unwrap();
        }
        host.create_node(
            &tab,
            NodeSpec::new("B", "B", NodeKind::Group).after(Some("A".into())),
        )
        .unwrap();
        host.create_node(
            &tab,
            NodeSpec::new("D", "D", NodeKind::Group).after(Some("missing".into())),
        )
        .unwrap();

        let order: Vec<_> = host
            .children(&tab)
            .unwrap()
            .into_iter()
            .map(|node| node.id)
            .collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn leaf_requires_definition_and_groups_refuse_deletion_when_full() {
        let host = SimulatedHost::new();
        host.add_container("CAM", "Manufacture");
        let root = NodePath::root("CAM");
        host.create_node(&root, NodeSpec::new("T1", "Tab", NodeKind::SubContainer))
            .unwrap();
        let tab = root.child("T1");
        host.create_node(&tab, NodeSpec::new("G1", "Group", NodeKind::Group))
            .unwrap();
        let group = tab.child("G1");

        let err = host
            .create_node(&group, NodeSpec::new("C1", "Cmd", NodeKind::Leaf))
            .unwrap_err();
        assert_eq!(err, HostError::UnknownDefinition("C1".into()));

        host.add_definition(definition("C1")).unwrap();
        host.create_node(&group, NodeSpec::new("C1", "Cmd", NodeKind::Leaf))
            .unwrap();
        assert!(matches!(
            host.delete_node(&group),
            Err(HostError::NotEmpty { children: 1, .. })
        ));
        assert_eq!(host.delete_node(&root), Err(HostError::HostOwned(root)));
    }

    #[test]
    fn dropped_and_unsubscribed_callbacks_never_fire() {
        let host = SimulatedHost::new();
        let counter = Rc::new(Cell::new(0));
        let source = EventSource {
            target: EventTarget::Definition("C1".into()),
            kind: EventKind::CommandCreated,
        };

        let kept = counting_callback(&counter);
        let handle = host.subscribe(&source, Rc::downgrade(&kept)).unwrap();
        let dropped = counting_callback(&counter);
        host.subscribe(&source, Rc::downgrade(&dropped)).unwrap();
        drop(dropped);

        let mut event = HostEvent::CommandCreated {
            command_id: "C1".into(),
            session: SessionToken::new(1),
        };
        assert_eq!(host.fire(&source, &mut event), 1);
        assert_eq!(counter.get(), 1);
        assert_eq!(host.live_subscribers(&source), 1);

        host.unsubscribe(handle).unwrap();
        assert_eq!(host.fire(&source, &mut event), 0);
        assert_eq!(counter.get(), 1);
        assert_eq!(
            host.unsubscribe(handle),
            Err(HostError::UnknownSubscription(handle))
        );
    }

    #[test]
    fn closed_sessions_reject_events() {
        let host = SimulatedHost::new();
        host.add_definition(definition("C1")).unwrap();
        let session = host.start_session("C1").unwrap();
        assert_eq!(host.session_command(session).as_deref(), Some("C1"));
        assert!(host.validate(session).unwrap());
        host.destroy(session, TerminationReason::Cancelled).unwrap();
        assert_eq!(
            host.execute(session),
            Err(HostError::UnknownSession(session))
        );
        assert!(host.open_sessions().is_empty());
    }
}
