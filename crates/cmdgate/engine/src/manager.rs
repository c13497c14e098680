//! Embedding-facing facade over one controller.

use std::ops::Deref;
use std::rc::Rc;

use cmdgate_types::{EngineConfig, EngineResult, InvokerId, ListenerId, RunResult};
use tracing::info;

use crate::controller::Controller;
use crate::listener::{Listener, ListenerBuilder};
use crate::registry::ListenerRegistry;

/// Cheaply clonable handle to a controller.
///
/// Hooks that capture a `Manager` form a cycle with it; break it with
/// [`ListenerRegistry::release_all`] on teardown, or per listener with
/// [`Listener::release`] through [`ListenerRegistry::update`].
#[derive(Clone)]
pub struct Manager {
    controller: Rc<Controller>,
}

impl Manager {
    pub fn new(registry: ListenerRegistry, config: EngineConfig) -> EngineResult<Self> {
        Ok(Self {
            controller: Rc::new(Controller::new(registry, config)?),
        })
    }

    /// A manager with a private registry and default config.
    pub fn standalone() -> EngineResult<Self> {
        Self::new(ListenerRegistry::new(), EngineConfig::default())
    }

    /// Validate, register and attach a listener in one step.
    ///
    /// On a name clash nothing stays registered.
    pub fn create(&self, builder: ListenerBuilder) -> EngineResult<ListenerId> {
        let listener = builder.build(self.controller.config())?;
        let registry = self.controller.registry();
        let id = registry.insert(listener);
        if let Err(err) = self.controller.attach(id) {
            registry.remove(id)?;
            return Err(err);
        }
        info!(listener = %id, commands = self.controller.count(), "listener created");
        Ok(id)
    }

    /// Unregister a listener, detaching it first.
    pub fn remove(&self, id: ListenerId) -> EngineResult<Listener> {
        self.controller.registry().remove(id)
    }

    /// Read a listener.
    pub fn with<R>(&self, id: ListenerId, f: impl FnOnce(&Listener) -> R) -> EngineResult<R> {
        self.controller.registry().with(id, f)
    }

    /// Mutate a listener in place.
    pub fn update<R>(&self, id: ListenerId, f: impl FnOnce(&mut Listener) -> R) -> EngineResult<R> {
        self.controller.registry().update(id, f)
    }

    pub fn rename(&self, id: ListenerId, name: &str) -> EngineResult<()> {
        self.controller.registry().rename(id, name)
    }

    pub fn run(&self, invoker: impl Into<InvokerId>, line: &str) -> RunResult {
        self.controller.run(invoker.into(), line)
    }

    pub fn controller(&self) -> &Rc<Controller> {
        &self.controller
    }
}

impl Deref for Manager {
    type Target = Controller;

    fn deref(&self) -> &Controller {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdgate_types::{EngineError, ErrorKind, Status};

    #[test]
    fn create_failure_leaves_nothing_registered() {
        let manager = Manager::standalone().unwrap();
        manager
            .create(Listener::builder("kick").on_execute(|_| Ok(Status::Done)))
            .unwrap();

        let err = manager.create(Listener::builder("kick")).unwrap_err();
        assert_eq!(err, EngineError::DuplicateCommand("kick".into()));
        assert_eq!(manager.registry().len(), 1);

        assert!(manager.create(Listener::builder("bad").spec("x")).is_err());
        assert_eq!(manager.registry().len(), 1);
    }

    #[test]
    fn remove_detaches_the_command() {
        let manager = Manager::standalone().unwrap();
        let id = manager
            .create(Listener::builder("kick").on_execute(|_| Ok(Status::Done)))
            .unwrap();
        assert_eq!(manager.run(1u64, "kick"), Ok(Status::Done));

        let listener = manager.remove(id).unwrap();
        assert_eq!(listener.name(), "kick");
        assert_eq!(manager.count(), 0);
        assert_eq!(manager.run(1u64, "kick"), Err(ErrorKind::UnknownCommand));
    }

    #[test]
    fn rename_keeps_attachment() {
        let manager = Manager::standalone().unwrap();
        let id = manager
            .create(Listener::builder("kick").on_execute(|_| Ok(Status::Done)))
            .unwrap();
        manager.rename(id, "boot").unwrap();
        assert!(manager.attached(id));
        assert_eq!(manager.find_by_name("boot"), Some(id));
        assert_eq!(manager.run(1u64, "boot"), Ok(Status::Done));
        assert_eq!(manager.run(1u64, "kick"), Err(ErrorKind::UnknownCommand));
    }
}
