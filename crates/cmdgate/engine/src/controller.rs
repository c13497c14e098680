//! Controller — owns a command table and runs the dispatch pipeline.
//!
//! ```text
//! run ─► trim ─► split name ─► resolve ─► suspended? ─► authority
//!     ─► executor bound? ─► tokenize/coerce ─► count bounds
//!     ─► audit ─► execute ─► post
//! ```
//!
//! Any stage may stop the pipeline; the failure is handed to the fail hook of
//! the listener (or of the controller) and its kind is returned. No registry
//! or table borrow is held while a hook runs, so hooks may dispatch nested
//! commands and edit registrations.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use cmdgate_types::{
    ArgValue, ControllerId, DispatchError, EngineConfig, EngineError, EngineResult, ErrorKind,
    InvokerId, ListenerId, RunResult, Status,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::command::{is_valid_name, Command, CommandTable};
use crate::context::{Context, Guard};
use crate::hooks::{
    guarded, AuthRequest, Authenticator, Failure, FailureHandler, HookResult, Hooks, Invocation,
};
use crate::listener::{shape_arguments, CommandInfo, Listener};
use crate::registry::ListenerRegistry;
use crate::spec::ArgSpec;
use crate::tokenizer::parse_arguments;

/// Copy of everything the pipeline needs from a listener, taken once so
/// hooks can edit the listener while it is being dispatched.
struct Plan {
    listener: ListenerId,
    name: String,
    spec: ArgSpec,
    min_args: usize,
    max_args: usize,
    authority: i32,
    protected: bool,
    suspended: bool,
    associative: bool,
    tags: Vec<Option<String>>,
    hooks: Hooks,
}

impl Plan {
    fn of(listener: ListenerId, l: &Listener) -> Self {
        Self {
            listener,
            name: l.name().to_string(),
            spec: l.spec().clone(),
            min_args: l.min_args(),
            max_args: l.max_args(),
            authority: l.authority(),
            protected: l.is_protected(),
            suspended: l.is_suspended(),
            associative: l.is_associative(),
            tags: l.tags().to_vec(),
            hooks: l.hooks().clone(),
        }
    }
}

pub struct Controller {
    id: ControllerId,
    registry: ListenerRegistry,
    config: EngineConfig,
    table: Rc<RefCell<CommandTable>>,
    current: RefCell<Option<Context>>,
    on_auth: RefCell<Option<Rc<dyn Authenticator>>>,
    on_fail: RefCell<Option<Rc<dyn FailureHandler>>>,
}

impl Controller {
    pub fn new(registry: ListenerRegistry, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let table = Rc::new(RefCell::new(CommandTable::new()));
        let id = registry.register_table(&table);
        debug!(controller = %id, max_args = config.max_args, "controller created");
        Ok(Self {
            id,
            registry,
            config,
            table,
            current: RefCell::new(None),
            on_auth: RefCell::new(None),
            on_fail: RefCell::new(None),
        })
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatch one command line on behalf of `invoker`.
    ///
    /// Never panics outward: hook errors and panics become failure kinds.
    pub fn run(&self, invoker: InvokerId, line: &str) -> RunResult {
        let guard = Guard::install(
            &self.current,
            Context::new(invoker, self.config.buffer_capacity),
        );
        debug!(
            context = %guard.current(),
            invoker = %invoker,
            nested = guard.previous().is_some(),
            "dispatch started"
        );

        let mut fail_hook = None;
        let result = match self.exec(invoker, line, &mut fail_hook) {
            Ok(status) => Ok(status),
            Err(failure) => Err(self.report(invoker, fail_hook, failure)),
        };
        drop(guard);
        result
    }

    fn exec(
        &self,
        invoker: InvokerId,
        line: &str,
        fail_hook: &mut Option<Rc<dyn FailureHandler>>,
    ) -> Result<Status, DispatchError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(DispatchError::new(
                ErrorKind::EmptyCommand,
                "no command was given",
            ));
        }

        let (name, text) = match line.split_once(char::is_whitespace) {
            Some((name, text)) => (name, text.trim_start()),
            None => (line, ""),
        };
        if !is_valid_name(name) {
            return Err(DispatchError::new(
                ErrorKind::InvalidCommand,
                format!("{name:?} is not a valid command name"),
            )
            .with_detail(json!({ "command": name })));
        }
        self.context_mut()?.set_command(name, text);

        let unknown = || {
            DispatchError::new(ErrorKind::UnknownCommand, format!("unknown command {name:?}"))
                .with_detail(json!({ "command": name }))
        };
        let id = self
            .table
            .borrow()
            .find(name)
            .map(Command::listener)
            .ok_or_else(unknown)?;
        let plan = self
            .registry
            .with(id, |l| Plan::of(id, l))
            .map_err(|_| unknown())?;
        fail_hook.clone_from(&plan.hooks.fail);
        debug!(command = name, listener = %id, "command resolved");

        if plan.suspended {
            return Err(DispatchError::new(
                ErrorKind::CommandSuspended,
                format!("command {name:?} is suspended"),
            ));
        }

        if !self.authorize(&plan, invoker) {
            warn!(
                command = name,
                invoker = %invoker,
                authority = plan.authority,
                "invoker denied"
            );
            return Err(DispatchError::new(
                ErrorKind::InsufficientAuth,
                format!("not allowed to use {name:?}"),
            )
            .with_detail(json!({ "authority": plan.authority })));
        }

        let Some(executor) = plan.hooks.execute.clone() else {
            return Err(DispatchError::new(
                ErrorKind::MissingExecuter,
                format!("command {name:?} has nothing to execute"),
            ));
        };

        let values = {
            let mut context = self.context_mut()?;
            let values = parse_arguments(
                text,
                &plan.spec,
                context.buffer_mut(),
                self.config.arg_limit(),
            )?;
            context.set_args(values.clone());
            values
        };
        debug!(command = name, count = values.len(), "arguments parsed");

        let count = values.len();
        if count < plan.min_args {
            return Err(DispatchError::new(
                ErrorKind::IncompleteArgs,
                format!("{name:?} needs at least {} arguments, got {count}", plan.min_args),
            )
            .with_detail(json!({ "min": plan.min_args, "got": count })));
        }
        if count > plan.max_args {
            return Err(DispatchError::new(
                ErrorKind::ExtraneousArgs,
                format!("{name:?} takes at most {} arguments, got {count}", plan.max_args),
            )
            .with_detail(json!({ "max": plan.max_args, "got": count })));
        }

        let args = shape_arguments(values, plan.associative, &plan.tags);
        let call = Invocation {
            controller: self,
            listener: id,
            invoker,
            command: name,
            args: &args,
        };

        if let Some(auditor) = &plan.hooks.audit {
            match guarded(|| auditor.audit(&call)) {
                Ok(status) if status.is_rejection() => {
                    return Err(DispatchError::new(
                        ErrorKind::ExecutionAborted,
                        format!("audit rejected {name:?}"),
                    )
                    .with_detail(json!({ "status": status.code() })));
                }
                Ok(_) => debug!(command = name, "audit passed"),
                Err(fault) => {
                    return Err(DispatchError::new(
                        ErrorKind::ExecutionFailed,
                        format!("audit hook failed: {fault}"),
                    ));
                }
            }
        }

        let status = guarded(|| executor.execute(&call)).map_err(|fault| {
            DispatchError::new(
                ErrorKind::ExecutionFailed,
                format!("execute hook failed: {fault}"),
            )
        })?;
        if status.is_rejection() {
            return Err(DispatchError::new(
                ErrorKind::ExecutionAborted,
                format!("{name:?} aborted"),
            )
            .with_detail(json!({ "status": status.code() })));
        }

        if let Some(post) = &plan.hooks.post {
            guarded(|| post.post(&call, status)).map_err(|fault| {
                DispatchError::new(
                    ErrorKind::PostProcessingFailed,
                    format!("post hook failed: {fault}"),
                )
            })?;
        }

        info!(command = name, invoker = %invoker, status = ?status, "command executed");
        Ok(status)
    }

    fn authorize(&self, plan: &Plan, invoker: InvokerId) -> bool {
        if !plan.protected {
            return true;
        }
        let hook = plan
            .hooks
            .authenticate
            .clone()
            .or_else(|| self.on_auth.borrow().clone());
        let Some(hook) = hook else {
            return plan.authority < 0;
        };

        let request = AuthRequest {
            listener: plan.listener,
            invoker,
            command: &plan.name,
            authority: plan.authority,
        };
        match guarded(|| hook.authenticate(&request)) {
            Ok(allowed) => allowed,
            Err(fault) => {
                warn!(command = %plan.name, error = %fault, "authenticate hook failed");
                false
            }
        }
    }

    /// Route a failure through the fail channel and settle the final kind.
    fn report(
        &self,
        invoker: InvokerId,
        fail_hook: Option<Rc<dyn FailureHandler>>,
        failure: DispatchError,
    ) -> ErrorKind {
        let kind = failure.kind;
        debug!(kind = %kind, code = kind.code(), message = %failure.message, "dispatch failed");

        let handler = fail_hook.or_else(|| self.on_fail.borrow().clone());
        let Some(handler) = handler else {
            return kind;
        };

        let command = self.current_command().unwrap_or_default();
        let report = Failure {
            controller: self,
            invoker,
            command: &command,
            error: &failure,
        };
        match guarded(|| handler.on_failure(&report)) {
            Ok(()) => kind,
            Err(fault) => {
                error!(
                    kind = %kind,
                    command = %command,
                    error = %fault,
                    "fail hook faulted, failure unresolved"
                );
                ErrorKind::UnresolvedFailure
            }
        }
    }

    fn context_mut(&self) -> Result<RefMut<'_, Context>, DispatchError> {
        RefMut::filter_map(self.current.borrow_mut(), Option::as_mut).map_err(|_| {
            DispatchError::new(ErrorKind::UnresolvedFailure, "no active invocation context")
        })
    }

    fn context(&self) -> Option<Ref<'_, Context>> {
        Ref::filter_map(self.current.borrow(), Option::as_ref).ok()
    }

    /// Whether `invoker` may use the listener, as the authority gate would
    /// decide right now.
    pub fn auth_check(&self, id: ListenerId, invoker: InvokerId) -> EngineResult<bool> {
        let plan = self.registry.with(id, |l| Plan::of(id, l))?;
        Ok(self.authorize(&plan, invoker))
    }

    /// Bind a listener's name to it in this controller.
    ///
    /// A listener attached elsewhere is moved here. Attaching a listener
    /// that is already bound here is a no-op.
    pub fn attach(&self, id: ListenerId) -> EngineResult<()> {
        let name = self.registry.with(id, |l| l.name().to_string())?;
        if let Some(existing) = self.table.borrow().find(&name) {
            if existing.listener() == id {
                return Ok(());
            }
            return Err(EngineError::DuplicateCommand(name));
        }

        if let Some(previous) = self.registry.set_controller(id, Some(self.id))? {
            if let Some(table) = self.registry.table_of(previous) {
                table.borrow_mut().remove_listener(id);
            }
        }
        self.table.borrow_mut().push(Command::new(name.as_str(), id));
        info!(controller = %self.id, listener = %id, command = %name, "command attached");
        Ok(())
    }

    /// Unbind a command by name. Returns `false` if nothing was bound.
    pub fn detach(&self, name: &str) -> bool {
        let removed = self.table.borrow_mut().remove_name(name);
        match removed {
            Some(command) => {
                self.release_binding(command.listener());
                true
            }
            None => false,
        }
    }

    /// Unbind a listener. Returns `false` if it was not bound here.
    pub fn detach_listener(&self, id: ListenerId) -> bool {
        let removed = self.table.borrow_mut().remove_listener(id);
        match removed {
            Some(command) => {
                self.release_binding(command.listener());
                true
            }
            None => false,
        }
    }

    fn release_binding(&self, id: ListenerId) {
        if let Err(err) = self.registry.set_controller(id, None) {
            debug!(listener = %id, error = %err, "detached listener no longer registered");
        }
        debug!(controller = %self.id, listener = %id, "command detached");
    }

    /// Order commands by name for enumeration.
    pub fn sort(&self) {
        self.table.borrow_mut().sort();
    }

    /// Detach every command. The listeners stay registered.
    pub fn clear(&self) {
        let commands = self.table.borrow_mut().drain();
        for command in &commands {
            self.release_binding(command.listener());
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<ListenerId> {
        self.table.borrow().find(name).map(Command::listener)
    }

    pub fn attached(&self, id: ListenerId) -> bool {
        self.table.borrow().find_listener(id).is_some()
    }

    pub fn count(&self) -> usize {
        self.table.borrow().len()
    }

    /// Visit every bound command. The callback sees a snapshot and may
    /// attach or detach freely.
    pub fn foreach_command(&self, mut f: impl FnMut(&Command)) {
        let snapshot: Vec<Command> = self.table.borrow().iter().cloned().collect();
        for command in &snapshot {
            f(command);
        }
    }

    /// Summaries of every bound command, in table order.
    pub fn commands(&self) -> Vec<CommandInfo> {
        let snapshot: Vec<ListenerId> = self.table.borrow().iter().map(Command::listener).collect();
        snapshot
            .into_iter()
            .filter_map(|id| self.registry.with(id, Listener::describe).ok())
            .collect()
    }

    /// Command summaries as a JSON array.
    pub fn commands_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self.commands())
    }

    /// Command summaries as a JSON object keyed by command name.
    pub fn commands_table(&self) -> serde_json::Result<Value> {
        let mut table = Map::new();
        for info in self.commands() {
            let name = info.name.clone();
            table.insert(name, serde_json::to_value(info)?);
        }
        Ok(Value::Object(table))
    }

    /// Fallback authenticator for protected listeners without their own.
    pub fn set_on_auth<F>(&self, hook: F)
    where
        F: Fn(&AuthRequest<'_>) -> HookResult<bool> + 'static,
    {
        self.set_authenticator(Rc::new(hook));
    }

    pub fn set_authenticator(&self, hook: Rc<dyn Authenticator>) {
        *self.on_auth.borrow_mut() = Some(hook);
    }

    pub fn clear_on_auth(&self) {
        self.on_auth.borrow_mut().take();
    }

    /// Fallback failure handler for listeners without their own.
    pub fn set_on_fail<F>(&self, hook: F)
    where
        F: Fn(&Failure<'_>) -> HookResult<()> + 'static,
    {
        self.set_failure_handler(Rc::new(hook));
    }

    pub fn set_failure_handler(&self, hook: Rc<dyn FailureHandler>) {
        *self.on_fail.borrow_mut() = Some(hook);
    }

    pub fn clear_on_fail(&self) {
        self.on_fail.borrow_mut().take();
    }

    /// Snapshot of the innermost active invocation, if one is running.
    pub fn current_context(&self) -> Option<Context> {
        self.context().map(|c| c.clone())
    }

    pub fn current_invoker(&self) -> Option<InvokerId> {
        self.context().map(|c| c.invoker())
    }

    pub fn current_command(&self) -> Option<String> {
        self.context().map(|c| c.command().to_string())
    }

    pub fn current_text(&self) -> Option<String> {
        self.context().map(|c| c.text().to_string())
    }

    pub fn current_arguments(&self) -> Option<Vec<ArgValue>> {
        self.context().map(|c| c.args().to_vec())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        // Dropping the table ends every binding; listeners stay registered.
        self.table.borrow_mut().drain();
        self.registry.unregister_table(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn controller() -> Controller {
        Controller::new(ListenerRegistry::new(), EngineConfig::default()).unwrap()
    }

    fn add(controller: &Controller, builder: crate::listener::ListenerBuilder) -> ListenerId {
        let listener = builder.build(controller.config()).unwrap();
        let id = controller.registry().insert(listener);
        controller.attach(id).unwrap();
        id
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            max_args: 1,
            ..EngineConfig::default()
        };
        assert!(Controller::new(ListenerRegistry::new(), config).is_err());
    }

    #[test]
    fn empty_and_invalid_lines() {
        let c = controller();
        assert_eq!(c.run(InvokerId(1), "   "), Err(ErrorKind::EmptyCommand));
        assert_eq!(c.run(InvokerId(1), "\"quoted\" x"), Err(ErrorKind::InvalidCommand));
        assert_eq!(c.run(InvokerId(1), "nothing"), Err(ErrorKind::UnknownCommand));
    }

    #[test]
    fn suspended_commands_stop_before_authority() {
        let c = controller();
        let asked = Rc::new(Cell::new(false));
        let seen = asked.clone();
        add(
            &c,
            Listener::builder("frozen")
                .suspended(true)
                .protected(true)
                .on_authenticate(move |_| {
                    seen.set(true);
                    Ok(true)
                })
                .on_execute(|_| Ok(Status::Done)),
        );
        assert_eq!(c.run(InvokerId(1), "frozen"), Err(ErrorKind::CommandSuspended));
        assert!(!asked.get());
    }

    #[test]
    fn protected_without_hooks_uses_authority_sign() {
        let c = controller();
        let open = add(
            &c,
            Listener::builder("open")
                .protected(true)
                .authority(-1)
                .on_execute(|_| Ok(Status::Done)),
        );
        let closed = add(
            &c,
            Listener::builder("closed")
                .protected(true)
                .authority(3)
                .on_execute(|_| Ok(Status::Done)),
        );
        assert_eq!(c.run(InvokerId(1), "open"), Ok(Status::Done));
        assert_eq!(c.run(InvokerId(1), "closed"), Err(ErrorKind::InsufficientAuth));
        assert!(c.auth_check(open, InvokerId(1)).unwrap());
        assert!(!c.auth_check(closed, InvokerId(1)).unwrap());

        c.set_on_auth(|req| Ok(req.invoker == InvokerId(9)));
        assert_eq!(c.run(InvokerId(9), "closed"), Ok(Status::Done));
        assert_eq!(c.run(InvokerId(1), "open"), Err(ErrorKind::InsufficientAuth));
    }

    #[test]
    fn faulting_authenticator_denies() {
        let c = controller();
        add(
            &c,
            Listener::builder("x")
                .protected(true)
                .on_authenticate(|_| Err(anyhow::anyhow!("backend down")))
                .on_execute(|_| Ok(Status::Done)),
        );
        assert_eq!(c.run(InvokerId(1), "x"), Err(ErrorKind::InsufficientAuth));
    }

    #[test]
    fn missing_executer() {
        let c = controller();
        add(&c, Listener::builder("noop"));
        assert_eq!(c.run(InvokerId(1), "noop"), Err(ErrorKind::MissingExecuter));
    }

    #[test]
    fn execute_outcomes() {
        let c = controller();
        add(&c, Listener::builder("err").on_execute(|_| Err(anyhow::anyhow!("bad"))));
        add(&c, Listener::builder("boom").on_execute(|_| panic!("boom")));
        add(&c, Listener::builder("neg").on_execute(|_| Ok(Status::Code(-2))));
        add(&c, Listener::builder("pos").on_execute(|_| Ok(Status::Code(4))));

        assert_eq!(c.run(InvokerId(1), "err"), Err(ErrorKind::ExecutionFailed));
        assert_eq!(c.run(InvokerId(1), "boom"), Err(ErrorKind::ExecutionFailed));
        assert_eq!(c.run(InvokerId(1), "neg"), Err(ErrorKind::ExecutionAborted));
        assert_eq!(c.run(InvokerId(1), "pos"), Ok(Status::Code(4)));
        assert!(c.current_context().is_none());
    }

    #[test]
    fn attach_moves_between_controllers() {
        let registry = ListenerRegistry::new();
        let first = Controller::new(registry.clone(), EngineConfig::default()).unwrap();
        let second = Controller::new(registry.clone(), EngineConfig::default()).unwrap();
        let id = registry.insert(
            Listener::builder("kick")
                .build(&EngineConfig::default())
                .unwrap(),
        );

        first.attach(id).unwrap();
        second.attach(id).unwrap();
        assert!(!first.attached(id));
        assert!(second.attached(id));
        assert_eq!(registry.with(id, Listener::controller).unwrap(), Some(second.id()));
        assert_eq!(first.count(), 0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let c = controller();
        add(&c, Listener::builder("kick"));
        let other = c
            .registry()
            .insert(Listener::builder("kick").build(c.config()).unwrap());
        assert_eq!(
            c.attach(other).unwrap_err(),
            EngineError::DuplicateCommand("kick".into())
        );
        assert!(!c.attached(other));
    }

    #[test]
    fn dropped_controller_unbinds_listeners() {
        let registry = ListenerRegistry::new();
        let id = {
            let c = Controller::new(registry.clone(), EngineConfig::default()).unwrap();
            add(&c, Listener::builder("kick"))
        };
        assert!(!registry.with(id, Listener::is_attached).unwrap());
    }

    #[test]
    fn commands_table_is_keyed_by_name() {
        let c = controller();
        add(&c, Listener::builder("kick").spec("i").help("kick a player"));
        add(&c, Listener::builder("ban"));
        let table = c.commands_table().unwrap();
        assert_eq!(table["kick"]["help"], "kick a player");
        assert_eq!(table["ban"]["attached"], true);

        c.sort();
        let list = c.commands_json().unwrap();
        assert_eq!(list[0]["name"], "ban");
        assert_eq!(list[1]["name"], "kick");
    }
}
