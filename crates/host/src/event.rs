use std::fmt;
use std::rc::{Rc, Weak};

/// Callback invoked by the host when a subscribed event fires.
/// 主機在訂閱事件觸發時呼叫的回呼。
pub type Callback = Rc<dyn Fn(&mut HostEvent)>;

/// Non-owning form handed to the host; the subscriber keeps the strong reference.
/// 交給主機的非擁有參照；強參照由訂閱者保留。
pub type WeakCallback = Weak<dyn Fn(&mut HostEvent)>;

/// Opaque handle returned by [`crate::EventHost::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Host-assigned identifier of one open command dialog.
/// 主機指派給單一開啟中命令對話框的識別碼。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dialog#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    CommandCreated,
    InputChanged,
    ValidateInputs,
    Execute,
    Destroy,
}

impl EventKind {
    /// Events a session subscribes to once its dialog exists.
    pub const SESSION: [EventKind; 4] = [
        EventKind::Execute,
        EventKind::InputChanged,
        EventKind::ValidateInputs,
        EventKind::Destroy,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::CommandCreated => "created",
            EventKind::InputChanged => "input-changed",
            EventKind::ValidateInputs => "validate",
            EventKind::Execute => "execute",
            EventKind::Destroy => "destroy",
        })
    }
}

/// Object an event is raised on: a command definition or an open dialog.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTarget {
    Definition(String),
    Session(SessionToken),
}

/// Subscribable event source.
/// 可訂閱的事件來源。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventSource {
    pub target: EventTarget,
    pub kind: EventKind,
}

impl EventSource {
    /// The "created" event of a command definition (button click).
    pub fn command_created(command_id: impl Into<String>) -> Self {
        Self {
            target: EventTarget::Definition(command_id.into()),
            kind: EventKind::CommandCreated,
        }
    }

    pub fn session(session: SessionToken, kind: EventKind) -> Self {
        Self {
            target: EventTarget::Session(session),
            kind,
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            EventTarget::Definition(id) => write!(f, "{id}.{}", self.kind),
            EventTarget::Session(token) => write!(f, "{token}.{}", self.kind),
        }
    }
}

/// Reference to a host entity picked through a selection input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRef {
    pub entity_id: String,
    pub label: String,
}

impl SelectionRef {
    pub fn new(entity_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            label: label.into(),
        }
    }
}

/// Value carried by a dialog input.
/// 對話框輸入元件所攜帶的值。
#[derive(Clone, Debug, PartialEq)]
pub enum InputValue {
    Text(String),
    Toggle(bool),
    /// Length in centimetres (host internal unit).
    Distance(f64),
    Selection(Option<SelectionRef>),
}

impl InputValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_toggle(&self) -> Option<bool> {
        match self {
            InputValue::Toggle(value) => Some(*value),
            _ => None,
        }
    }
}

/// Declaration of one dialog input.
#[derive(Clone, Debug, PartialEq)]
pub struct InputSpec {
    pub id: String,
    pub label: String,
    pub value: InputValue,
    pub read_only: bool,
}

impl InputSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, value: InputValue) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// A single input edit reported by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct InputChange {
    pub id: String,
    pub value: InputValue,
}

impl InputChange {
    pub fn new(id: impl Into<String>, value: InputValue) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationReason {
    Completed,
    Cancelled,
}

/// Event payload delivered to subscribers.
/// 傳遞給訂閱者的事件內容。
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    CommandCreated {
        command_id: String,
        session: SessionToken,
    },
    InputChanged {
        session: SessionToken,
        change: InputChange,
    },
    /// Handlers clear `inputs_valid` to disable the confirmation action.
    ValidateInputs {
        session: SessionToken,
        inputs_valid: bool,
    },
    Execute {
        session: SessionToken,
    },
    Destroy {
        session: SessionToken,
        reason: TerminationReason,
    },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::CommandCreated { .. } => EventKind::CommandCreated,
            HostEvent::InputChanged { .. } => EventKind::InputChanged,
            HostEvent::ValidateInputs { .. } => EventKind::ValidateInputs,
            HostEvent::Execute { .. } => EventKind::Execute,
            HostEvent::Destroy { .. } => EventKind::Destroy,
        }
    }

    pub fn session(&self) -> SessionToken {
        match self {
            HostEvent::CommandCreated { session, .. }
            | HostEvent::InputChanged { session, .. }
            | HostEvent::ValidateInputs { session, .. }
            | HostEvent::Execute { session }
            | HostEvent::Destroy { session, .. } => *session,
        }
    }
}
