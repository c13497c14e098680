//! Registered command definitions and their builder.

use std::rc::Rc;

use cmdgate_types::{
    ArgFlags, ArgValue, Arguments, ControllerId, EngineConfig, EngineError, EngineResult, Status,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::is_valid_name;
use crate::hooks::{
    AuthRequest, Auditor, Authenticator, Executor, Failure, FailureHandler, HookResult, Hooks,
    Invocation, PostProcessor,
};
use crate::spec::ArgSpec;

/// A command definition: argument spec, count bounds, authority and hooks.
///
/// Invariant: `min_args <= max_args <= spec.len() - 1`. Setters that would
/// break it fail without touching either bound.
#[derive(Debug)]
pub struct Listener {
    name: String,
    spec: ArgSpec,
    tags: Vec<Option<String>>,
    min_args: usize,
    max_args: usize,
    authority: i32,
    protected: bool,
    suspended: bool,
    associative: bool,
    help: String,
    info: String,
    data: Value,
    hooks: Hooks,
    controller: Option<ControllerId>,
}

impl Listener {
    pub fn builder(name: impl Into<String>) -> ListenerBuilder {
        ListenerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ArgSpec {
        &self.spec
    }

    /// Recompile the argument spec; the old one stays on failure.
    pub fn set_spec(&mut self, source: &str) -> EngineResult<()> {
        self.spec = ArgSpec::compile(source, self.spec.len())?;
        Ok(())
    }

    pub fn arg_check(&self, slot: usize, requested: ArgFlags) -> bool {
        self.spec.check(slot, requested)
    }

    fn arg_limit(&self) -> usize {
        self.spec.len().saturating_sub(1)
    }

    /// Tag of every slot, `None` where unnamed.
    pub fn tags(&self) -> &[Option<String>] {
        &self.tags
    }

    pub fn tag(&self, index: usize) -> Option<&str> {
        self.tags.get(index).and_then(|t| t.as_deref())
    }

    /// Name an argument slot. An empty tag clears it.
    pub fn set_tag(&mut self, index: usize, tag: impl Into<String>) -> EngineResult<()> {
        let limit = self.tags.len();
        let slot = self
            .tags
            .get_mut(index)
            .ok_or(EngineError::ArgIndexOutOfRange { index, limit })?;
        let tag = tag.into();
        *slot = (!tag.is_empty()).then_some(tag);
        Ok(())
    }

    /// Replace all tags, starting at slot 0.
    pub fn set_tags<I, S>(&mut self, tags: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        if tags.len() > self.tags.len() {
            return Err(EngineError::ArgIndexOutOfRange {
                index: tags.len() - 1,
                limit: self.tags.len(),
            });
        }
        let mut fresh = vec![None; self.tags.len()];
        for (slot, tag) in fresh.iter_mut().zip(tags) {
            *slot = (!tag.is_empty()).then_some(tag);
        }
        self.tags = fresh;
        Ok(())
    }

    pub fn min_args(&self) -> usize {
        self.min_args
    }

    pub fn max_args(&self) -> usize {
        self.max_args
    }

    pub fn set_min_args(&mut self, min: usize) -> EngineResult<()> {
        if min > self.max_args {
            return Err(EngineError::MinAboveMax {
                min,
                max: self.max_args,
            });
        }
        self.min_args = min;
        Ok(())
    }

    pub fn set_max_args(&mut self, max: usize) -> EngineResult<()> {
        let limit = self.arg_limit();
        if max > limit {
            return Err(EngineError::ArgIndexOutOfRange { index: max, limit });
        }
        if max < self.min_args {
            return Err(EngineError::MaxBelowMin {
                min: self.min_args,
                max,
            });
        }
        self.max_args = max;
        Ok(())
    }

    /// Set both bounds at once, for moves the single setters would reject
    /// half-way.
    pub fn set_arg_bounds(&mut self, min: usize, max: usize) -> EngineResult<()> {
        let limit = self.arg_limit();
        if max > limit {
            return Err(EngineError::ArgIndexOutOfRange { index: max, limit });
        }
        if min > max {
            return Err(EngineError::MinAboveMax { min, max });
        }
        self.min_args = min;
        self.max_args = max;
        Ok(())
    }

    pub fn authority(&self) -> i32 {
        self.authority
    }

    pub fn set_authority(&mut self, authority: i32) {
        self.authority = authority;
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    pub fn is_associative(&self) -> bool {
        self.associative
    }

    pub fn set_associative(&mut self, associative: bool) {
        self.associative = associative;
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn set_help(&mut self, help: impl Into<String>) {
        self.help = help.into();
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn set_info(&mut self, info: impl Into<String>) {
        self.info = info.into();
    }

    /// Opaque user data attached by the embedding environment.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn on_execute<F>(&mut self, hook: F)
    where
        F: Fn(&Invocation<'_>) -> HookResult + 'static,
    {
        self.hooks.execute = Some(Rc::new(hook));
    }

    pub fn on_authenticate<F>(&mut self, hook: F)
    where
        F: Fn(&AuthRequest<'_>) -> HookResult<bool> + 'static,
    {
        self.hooks.authenticate = Some(Rc::new(hook));
    }

    pub fn on_audit<F>(&mut self, hook: F)
    where
        F: Fn(&Invocation<'_>) -> HookResult + 'static,
    {
        self.hooks.audit = Some(Rc::new(hook));
    }

    pub fn on_post<F>(&mut self, hook: F)
    where
        F: Fn(&Invocation<'_>, Status) -> HookResult<()> + 'static,
    {
        self.hooks.post = Some(Rc::new(hook));
    }

    pub fn on_fail<F>(&mut self, hook: F)
    where
        F: Fn(&Failure<'_>) -> HookResult<()> + 'static,
    {
        self.hooks.fail = Some(Rc::new(hook));
    }

    /// Controller this listener is attached to, if any.
    pub fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    pub fn is_attached(&self) -> bool {
        self.controller.is_some()
    }

    /// Drop hooks and user data, breaking any cycle through them.
    pub fn release(&mut self) {
        self.hooks.clear();
        self.data = Value::Null;
    }

    /// One-line usage, e.g. `kick <id:integer> [reason:string]`.
    ///
    /// Required slots use angle brackets, optional ones square brackets.
    pub fn usage(&self) -> String {
        let tagged = self.tags.iter().rposition(Option::is_some).map_or(0, |i| i + 1);
        let shown = self
            .spec
            .declared()
            .max(self.min_args)
            .max(tagged)
            .min(self.max_args);

        let mut line = self.name.clone();
        for index in 0..shown {
            let flags = self.spec.slot(index);
            let label = self
                .tag(index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("arg{index}"));
            let (open, close) = if index < self.min_args {
                ('<', '>')
            } else {
                ('[', ']')
            };
            line.push_str(&format!(" {open}{label}:{}{close}", flags.describe()));
            if flags.contains(ArgFlags::GREEDY) {
                return line;
            }
        }
        if shown < self.max_args {
            line.push_str(" ...");
        }
        line
    }

    /// Serializable summary for enumeration and help generation.
    pub fn describe(&self) -> CommandInfo {
        CommandInfo {
            name: self.name.clone(),
            spec: self.spec.source().to_string(),
            tags: self.tags[..self.spec.declared().max(self.max_args).min(self.tags.len())]
                .to_vec(),
            min_args: self.min_args,
            max_args: self.max_args,
            authority: self.authority,
            protected: self.protected,
            suspended: self.suspended,
            associative: self.associative,
            attached: self.is_attached(),
            help: self.help.clone(),
            info: self.info.clone(),
            usage: self.usage(),
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_controller(&mut self, controller: Option<ControllerId>) {
        self.controller = controller;
    }
}

/// Shape parsed values for delivery: positional, or keyed by tag (falling
/// back to the slot index) for associative listeners.
pub(crate) fn shape_arguments(
    values: Vec<ArgValue>,
    associative: bool,
    tags: &[Option<String>],
) -> Arguments {
    if !associative {
        return Arguments::Positional(values);
    }
    Arguments::Associative(
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let key = tags
                    .get(index)
                    .and_then(Option::clone)
                    .unwrap_or_else(|| index.to_string());
                (key, value)
            })
            .collect(),
    )
}

/// Listener summary as exposed to enumeration callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: String,
    pub spec: String,
    pub tags: Vec<Option<String>>,
    pub min_args: usize,
    pub max_args: usize,
    pub authority: i32,
    pub protected: bool,
    pub suspended: bool,
    pub associative: bool,
    pub attached: bool,
    pub help: String,
    pub info: String,
    pub usage: String,
}

/// Builder for [`Listener`]. All validation happens in [`build`](Self::build).
pub struct ListenerBuilder {
    name: String,
    spec: String,
    tags: Vec<String>,
    min_args: usize,
    max_args: Option<usize>,
    authority: Option<i32>,
    protected: bool,
    suspended: bool,
    associative: bool,
    help: String,
    info: String,
    data: Value,
    hooks: Hooks,
}

impl ListenerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: String::new(),
            tags: Vec::new(),
            min_args: 0,
            max_args: None,
            authority: None,
            protected: false,
            suspended: false,
            associative: false,
            help: String::new(),
            info: String::new(),
            data: Value::Null,
            hooks: Hooks::default(),
        }
    }

    pub fn spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = spec.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_args(mut self, min: usize) -> Self {
        self.min_args = min;
        self
    }

    /// Defaults to the engine's argument limit.
    pub fn max_args(mut self, max: usize) -> Self {
        self.max_args = Some(max);
        self
    }

    /// Defaults to [`EngineConfig::default_authority`].
    pub fn authority(mut self, authority: i32) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    pub fn suspended(mut self, suspended: bool) -> Self {
        self.suspended = suspended;
        self
    }

    pub fn associative(mut self, associative: bool) -> Self {
        self.associative = associative;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn on_execute<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> HookResult + 'static,
    {
        self.hooks.execute = Some(Rc::new(hook));
        self
    }

    pub fn on_authenticate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AuthRequest<'_>) -> HookResult<bool> + 'static,
    {
        self.hooks.authenticate = Some(Rc::new(hook));
        self
    }

    pub fn on_audit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> HookResult + 'static,
    {
        self.hooks.audit = Some(Rc::new(hook));
        self
    }

    pub fn on_post<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation<'_>, Status) -> HookResult<()> + 'static,
    {
        self.hooks.post = Some(Rc::new(hook));
        self
    }

    pub fn on_fail<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Failure<'_>) -> HookResult<()> + 'static,
    {
        self.hooks.fail = Some(Rc::new(hook));
        self
    }

    pub fn executor(mut self, executor: Rc<dyn Executor>) -> Self {
        self.hooks.execute = Some(executor);
        self
    }

    pub fn authenticator(mut self, authenticator: Rc<dyn Authenticator>) -> Self {
        self.hooks.authenticate = Some(authenticator);
        self
    }

    pub fn auditor(mut self, auditor: Rc<dyn Auditor>) -> Self {
        self.hooks.audit = Some(auditor);
        self
    }

    pub fn post_processor(mut self, post: Rc<dyn PostProcessor>) -> Self {
        self.hooks.post = Some(post);
        self
    }

    pub fn failure_handler(mut self, handler: Rc<dyn FailureHandler>) -> Self {
        self.hooks.fail = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate everything and produce an unattached listener.
    pub fn build(self, config: &EngineConfig) -> EngineResult<Listener> {
        if !is_valid_name(&self.name) {
            return Err(EngineError::InvalidName(self.name));
        }

        let spec = ArgSpec::compile(&self.spec, config.max_args)?;
        let limit = config.arg_limit();
        let max_args = self.max_args.unwrap_or(limit);
        if max_args > limit {
            return Err(EngineError::ArgIndexOutOfRange {
                index: max_args,
                limit,
            });
        }
        if self.min_args > max_args {
            return Err(EngineError::MinAboveMax {
                min: self.min_args,
                max: max_args,
            });
        }

        let mut listener = Listener {
            name: self.name,
            spec,
            tags: vec![None; config.max_args],
            min_args: self.min_args,
            max_args,
            authority: self.authority.unwrap_or(config.default_authority),
            protected: self.protected,
            suspended: self.suspended,
            associative: self.associative,
            help: self.help,
            info: self.info,
            data: self.data,
            hooks: self.hooks,
            controller: None,
        };
        listener.set_tags(self.tags)?;
        Ok(listener)
    }
}
