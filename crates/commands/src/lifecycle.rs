//! State machine driving one command from install to uninstall.
//! 驅動單一命令從安裝到解除安裝的狀態機。

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use cambench_events::{HandlerRegistry, InstanceId, Scope, SessionId};
use cambench_host::{
    EventKind, EventSource, Host, HostEvent, InputChange, InputValue, SessionToken,
    TerminationReason,
};
use cambench_resources::{ResourceTree, TeardownReport};
use cambench_settings::SettingsStore;
use tracing::{debug, error, info, warn};

use crate::behavior::{CommandBehavior, CommandError, SessionContext};
use crate::descriptor::CommandDescriptor;
use crate::LifecycleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninstalled,
    Installed,
    SessionActive,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Uninstalled => "uninstalled",
            LifecycleState::Installed => "installed",
            LifecycleState::SessionActive => "session-active",
        })
    }
}

/// One interactive invocation, from "created" to "destroy".
/// 單次互動執行，從「建立」到「銷毀」。
struct CommandSession {
    id: SessionId,
    token: SessionToken,
    inputs: BTreeMap<String, InputValue>,
    settings: Option<SettingsStore>,
    executed: bool,
    validation_error: Option<String>,
    last_error: Option<String>,
}

impl CommandSession {
    fn context<'s>(&'s mut self, host: &'s dyn Host) -> SessionContext<'s> {
        SessionContext::new(host, self.token, &mut self.inputs, self.settings.as_mut())
    }
}

/// Read-only view of the active session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub token: SessionToken,
    pub inputs: BTreeMap<String, InputValue>,
    pub executed: bool,
    pub validation_error: Option<String>,
    pub last_error: Option<String>,
}

/// How the last session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub executed: bool,
    pub bindings_released: usize,
    pub reason: TerminationReason,
}

struct Inner<B: CommandBehavior> {
    this: Weak<RefCell<Inner<B>>>,
    descriptor: CommandDescriptor,
    behavior: B,
    host: Rc<dyn Host>,
    registry: HandlerRegistry<dyn Host>,
    instance: Option<InstanceId>,
    /// Set while a previous uninstall left resources behind.
    teardown_pending: bool,
    session: Option<CommandSession>,
    last_summary: Option<SessionSummary>,
}

/// Registration, sessions and teardown of one command.
///
/// Host callbacks only hold a `Weak` back-reference, so dropping the lifecycle
/// drops its handlers. An event that arrives while the lifecycle is already
/// borrowed (a handler re-entering itself) is logged and dropped.
/// 單一命令的註冊、工作階段與拆除。主機回呼僅持有弱參照。
pub struct CommandLifecycle<B: CommandBehavior> {
    id: String,
    inner: Rc<RefCell<Inner<B>>>,
}

impl<B: CommandBehavior> CommandLifecycle<B> {
    pub fn new(descriptor: CommandDescriptor, behavior: B, host: Rc<dyn Host>) -> Self {
        let id = descriptor.id.clone();
        let registry = HandlerRegistry::new(Rc::clone(&host));
        let inner = Rc::new_cyclic(|this| {
            RefCell::new(Inner {
                this: this.clone(),
                descriptor,
                behavior,
                host,
                registry,
                instance: None,
                teardown_pending: false,
                session: None,
                last_summary: None,
            })
        });
        Self { id, inner }
    }

    pub fn command_id(&self) -> &str {
        &self.id
    }

    pub fn descriptor(&self) -> CommandDescriptor {
        self.inner.borrow().descriptor.clone()
    }

    pub fn state(&self) -> LifecycleState {
        let inner = self.inner.borrow();
        match (&inner.instance, &inner.session) {
            (None, _) => LifecycleState::Uninstalled,
            (Some(_), None) => LifecycleState::Installed,
            (Some(_), Some(_)) => LifecycleState::SessionActive,
        }
    }

    /// Provisions the control and listens for its "created" event. Installing
    /// an installed command does nothing.
    /// 建立控制項並訂閱其「建立」事件；已安裝時不做任何事。
    pub fn install(&self) -> Result<(), LifecycleError> {
        let mut guard = self
            .inner
            .try_borrow_mut()
            .map_err(|_| LifecycleError::Busy(self.id.clone()))?;
        let inner = &mut *guard;
        let command = inner.descriptor.id.clone();
        if inner.instance.is_some() {
            debug!(%command, "install skipped; already installed");
            return Ok(());
        }

        ResourceTree::new(&*inner.host)
            .ensure_path(&inner.descriptor.placement, &inner.descriptor.leaf())
            .map_err(|source| LifecycleError::Provision {
                command: command.clone(),
                source,
            })?;

        let instance = InstanceId::new();
        let weak = inner.this.clone();
        let bound = inner.registry.subscribe(
            Scope::Instance(instance),
            EventSource::command_created(&command),
            move |event| dispatch(&weak, event),
        );
        if let Err(source) = bound {
            let report = ResourceTree::new(&*inner.host)
                .teardown_placement(&inner.descriptor.placement, &command);
            inner.teardown_pending = !report.is_complete();
            return Err(LifecycleError::Subscribe { command, source });
        }

        inner.instance = Some(instance);
        inner.teardown_pending = false;
        info!(%command, %instance, "command installed");
        Ok(())
    }

    /// Ends any active session, releases the instance handlers and removes the
    /// control. A teardown that left resources behind is retried by the next
    /// call; otherwise uninstalling an uninstalled command returns an empty report.
    /// 結束進行中的工作階段、釋放實例處理常式並移除控制項；未完成的拆除會在下次呼叫時重試。
    pub fn uninstall(&self) -> Result<TeardownReport, LifecycleError> {
        let mut guard = self
            .inner
            .try_borrow_mut()
            .map_err(|_| LifecycleError::Busy(self.id.clone()))?;
        let inner = &mut *guard;
        let command = inner.descriptor.id.clone();
        match inner.instance.take() {
            Some(instance) => {
                if inner.session.is_some() {
                    warn!(%command, "uninstalling with an open session; forcing destroy");
                    inner.finish_session(TerminationReason::Cancelled);
                }
                inner.registry.release_scope(Scope::Instance(instance));
            }
            None if inner.teardown_pending => {
                debug!(%command, "retrying unfinished teardown");
            }
            None => return Ok(TeardownReport::default()),
        }

        let report = ResourceTree::new(&*inner.host)
            .teardown_placement(&inner.descriptor.placement, &command);
        inner.teardown_pending = !report.is_complete();
        if inner.teardown_pending {
            let failures = report.failures.len();
            warn!(%command, failures, "command uninstalled with leftovers");
        } else {
            info!(%command, "command uninstalled");
        }
        Ok(report)
    }

    pub fn active_session(&self) -> Option<SessionSnapshot> {
        self.inner
            .borrow()
            .session
            .as_ref()
            .map(|session| SessionSnapshot {
                id: session.id,
                token: session.token,
                inputs: session.inputs.clone(),
                executed: session.executed,
                validation_error: session.validation_error.clone(),
                last_error: session.last_error.clone(),
            })
    }

    pub fn last_session(&self) -> Option<SessionSummary> {
        self.inner.borrow().last_summary.clone()
    }

    /// Handlers currently retained for this command across all scopes.
    pub fn live_bindings(&self) -> usize {
        self.inner.borrow().registry.total_bindings()
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        f(&self.inner.borrow().behavior)
    }
}

fn dispatch<B: CommandBehavior>(this: &Weak<RefCell<Inner<B>>>, event: &mut HostEvent) {
    let Some(inner) = this.upgrade() else {
        return;
    };
    let Ok(mut inner) = inner.try_borrow_mut() else {
        warn!(kind = %event.kind(), session = %event.session(), "re-entrant event dropped");
        return;
    };
    inner.handle(event);
}

impl<B: CommandBehavior> Inner<B> {
    fn handle(&mut self, event: &mut HostEvent) {
        match event {
            HostEvent::CommandCreated { session, .. } => self.on_created(*session),
            HostEvent::InputChanged { session, change } => {
                self.on_input_changed(*session, change.clone())
            }
            HostEvent::ValidateInputs {
                session,
                inputs_valid,
            } => {
                if !self.on_validate(*session) {
                    *inputs_valid = false;
                }
            }
            HostEvent::Execute { session } => self.on_execute(*session),
            HostEvent::Destroy { session, reason } => self.on_destroy(*session, *reason),
        }
    }

    fn is_current(&self, token: SessionToken) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.token == token)
    }

    fn on_created(&mut self, token: SessionToken) {
        let command = self.descriptor.id.clone();
        if self.instance.is_none() {
            return;
        }
        if let Some(active) = &self.session {
            warn!(%command, active = %active.token, ignored = %token, "session already active");
            return;
        }

        let id = SessionId::new();
        let scope = Scope::Session(id);
        for kind in EventKind::SESSION {
            let weak = self.this.clone();
            let bound = self.registry.subscribe(
                scope,
                EventSource::session(token, kind),
                move |event| dispatch(&weak, event),
            );
            if let Err(err) = bound {
                error!(%command, %token, error = %err, "session handlers could not be bound");
                self.registry.release_scope(scope);
                return;
            }
        }

        let settings = match &self.descriptor.settings {
            Some(spec) => match SettingsStore::load(&spec.path, spec.defaults.clone()) {
                Ok(store) => Some(store),
                Err(err) => {
                    error!(%command, error = %err, "settings could not be loaded");
                    let notice = format!("Settings could not be loaded: {err}");
                    self.host.notify_user(&notice);
                    None
                }
            },
            None => None,
        };

        let mut session = CommandSession {
            id,
            token,
            inputs: BTreeMap::new(),
            settings,
            executed: false,
            validation_error: None,
            last_error: None,
        };
        let built = self
            .behavior
            .build_inputs(&mut session.context(&*self.host));
        match built {
            Ok(specs) => {
                for spec in &specs {
                    session.inputs.insert(spec.id.clone(), spec.value.clone());
                }
                self.host.present_inputs(token, &specs);
                debug!(%command, session = %id, inputs = specs.len(), "session active");
                self.session = Some(session);
            }
            Err(err) => {
                error!(%command, session = %id, error = %err, "dialog inputs could not be built");
                self.host
                    .notify_user(&format!("{}: {err}", self.descriptor.display_name));
                let released = self.registry.release_scope(scope);
                self.last_summary = Some(SessionSummary {
                    id,
                    executed: false,
                    bindings_released: released,
                    reason: TerminationReason::Cancelled,
                });
            }
        }
    }

    fn on_input_changed(&mut self, token: SessionToken, change: InputChange) {
        let host = Rc::clone(&self.host);
        let Some(session) = self.session.as_mut().filter(|s| s.token == token) else {
            debug!(%token, "input change for an inactive session ignored");
            return;
        };
        let id = change.id.clone();
        let value = change.value.clone();
        let input = match B::Input::try_from(change) {
            Ok(input) => input,
            Err(err) => {
                debug!(input = %id, error = %err, "input change ignored");
                return;
            }
        };
        session.inputs.insert(id.clone(), value);
        let result = self
            .behavior
            .input_changed(input, &mut session.context(&*host));
        if let Err(err) = result {
            warn!(input = %id, error = %err, "input change rejected");
            if matches!(err, CommandError::StaleHandle(_)) {
                host.notify_user(&err.to_string());
            }
            session.validation_error = Some(err.to_string());
        }
    }

    fn on_validate(&mut self, token: SessionToken) -> bool {
        let host = Rc::clone(&self.host);
        let Some(session) = self.session.as_mut().filter(|s| s.token == token) else {
            return false;
        };
        let outcome = {
            let ctx = session.context(&*host);
            ctx.check_selections()
                .and_then(|()| self.behavior.validate(&ctx))
        };
        match outcome {
            Ok(()) => {
                session.validation_error = None;
                true
            }
            Err(err) => {
                let message = err.to_string();
                // Validation runs on every edit; notify once per distinct problem.
                if matches!(err, CommandError::StaleHandle(_))
                    && session.validation_error.as_deref() != Some(message.as_str())
                {
                    host.notify_user(&message);
                }
                debug!(%token, error = %message, "inputs invalid");
                session.validation_error = Some(message);
                false
            }
        }
    }

    fn on_execute(&mut self, token: SessionToken) {
        let command = self.descriptor.id.clone();
        let host = Rc::clone(&self.host);
        let Some(session) = self.session.as_mut().filter(|s| s.token == token) else {
            debug!(%command, %token, "execute for an inactive session ignored");
            return;
        };
        if session.executed {
            warn!(%command, session = %session.id, "execute already completed; ignored");
            return;
        }

        let outcome = {
            let mut ctx = session.context(&*host);
            match ctx.check_selections() {
                Ok(()) => self.behavior.execute(&mut ctx),
                Err(err) => Err(err),
            }
        };
        match outcome {
            Ok(()) => {
                session.executed = true;
                session.last_error = None;
                info!(%command, session = %session.id, "command executed");
            }
            Err(err) => {
                error!(
                    %command,
                    session = %session.id,
                    error = %err,
                    "execute failed; session stays open"
                );
                host.notify_user(&err.to_string());
                session.last_error = Some(err.to_string());
            }
        }
    }

    fn on_destroy(&mut self, token: SessionToken, reason: TerminationReason) {
        if !self.is_current(token) {
            debug!(%token, "destroy for an inactive session ignored");
            return;
        }
        self.finish_session(reason);
    }

    fn finish_session(&mut self, reason: TerminationReason) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.behavior.session_ended(reason);
        let released = self.registry.release_scope(Scope::Session(session.id));
        debug!(
            command = %self.descriptor.id,
            session = %session.id,
            released,
            ?reason,
            "session closed"
        );
        self.last_summary = Some(SessionSummary {
            id: session.id,
            executed: session.executed,
            bindings_released: released,
            reason,
        });
    }
}
