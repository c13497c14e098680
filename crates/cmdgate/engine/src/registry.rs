//! Listener registry.
//!
//! Every listener lives in one generation-checked slot table, linked into an
//! index-based doubly linked list (newest first) for the whole of its life.
//! The registry also knows which controller table each attached listener is
//! bound to, so rename, attach-elsewhere and removal keep exactly one table
//! in sync.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use cmdgate_types::{ControllerId, EngineError, EngineResult, ListenerId};
use tracing::debug;

use crate::command::{is_valid_name, CommandTable};
use crate::listener::Listener;

#[derive(Debug)]
struct Entry {
    listener: Listener,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug, Default)]
struct RegistryState {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<u32>,
    len: usize,
    tables: HashMap<ControllerId, Weak<RefCell<CommandTable>>>,
    next_controller: u64,
}

impl RegistryState {
    fn entry(&self, id: ListenerId) -> EngineResult<&Entry> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(EngineError::StaleListener(id))
    }

    fn entry_mut(&mut self, id: ListenerId) -> EngineResult<&mut Entry> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(EngineError::StaleListener(id))
    }

    fn table(&self, controller: ControllerId) -> Option<Rc<RefCell<CommandTable>>> {
        self.tables.get(&controller).and_then(Weak::upgrade)
    }

    fn set_prev(&mut self, index: u32, prev: Option<u32>) {
        if let Some(entry) = self.slots[index as usize].entry.as_mut() {
            entry.prev = prev;
        }
    }

    fn set_next(&mut self, index: u32, next: Option<u32>) {
        if let Some(entry) = self.slots[index as usize].entry.as_mut() {
            entry.next = next;
        }
    }

    fn id_at(&self, index: u32) -> ListenerId {
        ListenerId::new(index, self.slots[index as usize].generation)
    }
}

/// Shared handle to the listener registry. Clones refer to the same state.
///
/// Closures passed to [`with`](Self::with) and [`update`](Self::update) must
/// not call back into the registry.
#[derive(Clone, Debug, Default)]
pub struct ListenerRegistry {
    inner: Rc<RefCell<RegistryState>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a listener and link it at the head of the list.
    pub fn insert(&self, mut listener: Listener) -> ListenerId {
        listener.set_controller(None);
        let mut state = self.inner.borrow_mut();
        let head = state.head;
        let entry = Entry {
            listener,
            prev: None,
            next: head,
        };

        let index = match state.free.pop() {
            Some(index) => {
                state.slots[index as usize].entry = Some(entry);
                index
            }
            None => {
                state.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                (state.slots.len() - 1) as u32
            }
        };

        if let Some(old) = head {
            state.set_prev(old, Some(index));
        }
        state.head = Some(index);
        state.len += 1;
        state.id_at(index)
    }

    /// Unlink a listener, detaching it from its controller first.
    ///
    /// The handle goes stale; the listener is handed back unattached.
    pub fn remove(&self, id: ListenerId) -> EngineResult<Listener> {
        let mut state = self.inner.borrow_mut();
        let controller = state.entry(id)?.listener.controller();
        if let Some(table) = controller.and_then(|c| state.table(c)) {
            table.borrow_mut().remove_listener(id);
        }

        let index = id.index();
        let slot = &mut state.slots[index as usize];
        let Some(entry) = slot.entry.take() else {
            return Err(EngineError::StaleListener(id));
        };
        slot.generation = slot.generation.wrapping_add(1);

        match entry.prev {
            Some(prev) => state.set_next(prev, entry.next),
            None => state.head = entry.next,
        }
        if let Some(next) = entry.next {
            state.set_prev(next, entry.prev);
        }
        state.free.push(index);
        state.len -= 1;

        let mut listener = entry.listener;
        listener.set_controller(None);
        debug!(listener = %id, name = listener.name(), "listener removed");
        Ok(listener)
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.inner.borrow().entry(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a listener.
    pub fn with<R>(&self, id: ListenerId, f: impl FnOnce(&Listener) -> R) -> EngineResult<R> {
        let state = self.inner.borrow();
        Ok(f(&state.entry(id)?.listener))
    }

    /// Mutate a listener. Renames go through [`rename`](Self::rename).
    ///
    /// Hooks replaced or released by `f` are dropped after the registry
    /// borrow ends, so their destructors may touch the registry.
    pub fn update<R>(&self, id: ListenerId, f: impl FnOnce(&mut Listener) -> R) -> EngineResult<R> {
        let (result, displaced) = {
            let mut state = self.inner.borrow_mut();
            let listener = &mut state.entry_mut(id)?.listener;
            let displaced = listener.hooks().clone();
            (f(listener), displaced)
        };
        drop(displaced);
        Ok(result)
    }

    /// Rename a listener, re-keying its command if it is attached.
    pub fn rename(&self, id: ListenerId, name: &str) -> EngineResult<()> {
        if !is_valid_name(name) {
            return Err(EngineError::InvalidName(name.to_string()));
        }

        let mut state = self.inner.borrow_mut();
        let controller = state.entry(id)?.listener.controller();
        if let Some(table) = controller.and_then(|c| state.table(c)) {
            let mut table = table.borrow_mut();
            if table.find(name).is_some_and(|c| c.listener() != id) {
                return Err(EngineError::DuplicateCommand(name.to_string()));
            }
            table.rename(id, name);
        }

        state.entry_mut(id)?.listener.set_name(name.to_string());
        Ok(())
    }

    /// Live handles, newest first.
    pub fn ids(&self) -> Vec<ListenerId> {
        let state = self.inner.borrow();
        let mut ids = Vec::with_capacity(state.len);
        let mut cursor = state.head;
        while let Some(index) = cursor {
            ids.push(state.id_at(index));
            cursor = state.slots[index as usize]
                .entry
                .as_ref()
                .and_then(|entry| entry.next);
        }
        ids
    }

    /// Drop the hooks and user data of every listener. Returns how many
    /// listeners were visited.
    ///
    /// The released hooks are dropped after the registry borrow ends, so
    /// their destructors may touch the registry.
    pub fn release_all(&self) -> usize {
        let mut released = Vec::new();
        let count = {
            let mut state = self.inner.borrow_mut();
            let mut cursor = state.head;
            let mut count = 0;
            while let Some(index) = cursor {
                let Some(entry) = state.slots[index as usize].entry.as_mut() else {
                    break;
                };
                released.push((
                    std::mem::take(entry.listener.hooks_mut()),
                    entry.listener.data().clone(),
                ));
                entry.listener.release();
                cursor = entry.next;
                count += 1;
            }
            count
        };
        drop(released);
        debug!(count, "released all listeners");
        count
    }

    pub(crate) fn register_table(&self, table: &Rc<RefCell<CommandTable>>) -> ControllerId {
        let mut state = self.inner.borrow_mut();
        state.next_controller += 1;
        let id = ControllerId(state.next_controller);
        state.tables.insert(id, Rc::downgrade(table));
        id
    }

    /// Forget a controller table and mark its listeners unattached.
    pub(crate) fn unregister_table(&self, controller: ControllerId) {
        let mut state = self.inner.borrow_mut();
        state.tables.remove(&controller);
        for slot in &mut state.slots {
            if let Some(entry) = slot.entry.as_mut() {
                if entry.listener.controller() == Some(controller) {
                    entry.listener.set_controller(None);
                }
            }
        }
    }

    /// Record the owning controller; returns the previous one.
    pub(crate) fn set_controller(
        &self,
        id: ListenerId,
        controller: Option<ControllerId>,
    ) -> EngineResult<Option<ControllerId>> {
        let mut state = self.inner.borrow_mut();
        let listener = &mut state.entry_mut(id)?.listener;
        let previous = listener.controller();
        listener.set_controller(controller);
        Ok(previous)
    }

    pub(crate) fn table_of(&self, controller: ControllerId) -> Option<Rc<RefCell<CommandTable>>> {
        self.inner.borrow().table(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use cmdgate_types::{EngineConfig, Status};

    fn listener(name: &str) -> Listener {
        Listener::builder(name)
            .build(&EngineConfig::default())
            .unwrap()
    }

    fn names(registry: &ListenerRegistry) -> Vec<String> {
        registry
            .ids()
            .into_iter()
            .map(|id| registry.with(id, |l| l.name().to_string()).unwrap())
            .collect()
    }

    #[test]
    fn insert_links_newest_first() {
        let registry = ListenerRegistry::new();
        registry.insert(listener("a"));
        registry.insert(listener("b"));
        registry.insert(listener("c"));
        assert_eq!(names(&registry), vec!["c", "b", "a"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unlink_patches_neighbours_and_head() {
        let registry = ListenerRegistry::new();
        let a = registry.insert(listener("a"));
        let b = registry.insert(listener("b"));
        let c = registry.insert(listener("c"));
        let d = registry.insert(listener("d"));

        registry.remove(b).unwrap();
        assert_eq!(names(&registry), vec!["d", "c", "a"]);

        registry.remove(d).unwrap();
        assert_eq!(names(&registry), vec!["c", "a"]);

        registry.remove(a).unwrap();
        assert_eq!(names(&registry), vec!["c"]);

        registry.remove(c).unwrap();
        assert!(registry.ids().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn removed_handles_go_stale() {
        let registry = ListenerRegistry::new();
        let old = registry.insert(listener("old"));
        registry.remove(old).unwrap();

        let new = registry.insert(listener("new"));
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());

        assert!(!registry.contains(old));
        assert_eq!(
            registry.with(old, |_| ()).unwrap_err(),
            EngineError::StaleListener(old)
        );
        assert!(registry.remove(old).is_err());
        assert_eq!(names(&registry), vec!["new"]);
    }

    #[test]
    fn remove_detaches_from_owning_table() {
        let registry = ListenerRegistry::new();
        let table = Rc::new(RefCell::new(CommandTable::new()));
        let controller = registry.register_table(&table);

        let id = registry.insert(listener("kick"));
        table.borrow_mut().push(Command::new("kick", id));
        registry.set_controller(id, Some(controller)).unwrap();

        let removed = registry.remove(id).unwrap();
        assert!(!removed.is_attached());
        assert!(table.borrow().is_empty());
    }

    #[test]
    fn rename_rekeys_attached_command() {
        let registry = ListenerRegistry::new();
        let table = Rc::new(RefCell::new(CommandTable::new()));
        let controller = registry.register_table(&table);

        let kick = registry.insert(listener("kick"));
        let ban = registry.insert(listener("ban"));
        for (id, name) in [(kick, "kick"), (ban, "ban")] {
            table.borrow_mut().push(Command::new(name, id));
            registry.set_controller(id, Some(controller)).unwrap();
        }

        registry.rename(kick, "boot").unwrap();
        assert_eq!(table.borrow().find("boot").map(Command::listener), Some(kick));
        assert!(table.borrow().find("kick").is_none());
        assert!(registry.with(kick, Listener::is_attached).unwrap());

        assert_eq!(
            registry.rename(kick, "ban").unwrap_err(),
            EngineError::DuplicateCommand("ban".into())
        );
        assert_eq!(
            registry.rename(kick, "bad name").unwrap_err(),
            EngineError::InvalidName("bad name".into())
        );
    }

    #[test]
    fn unregistered_table_releases_its_listeners() {
        let registry = ListenerRegistry::new();
        let table = Rc::new(RefCell::new(CommandTable::new()));
        let controller = registry.register_table(&table);
        let id = registry.insert(listener("kick"));
        registry.set_controller(id, Some(controller)).unwrap();

        registry.unregister_table(controller);
        assert!(registry.table_of(controller).is_none());
        assert_eq!(registry.with(id, Listener::controller).unwrap(), None);
    }

    #[test]
    fn release_all_clears_every_listener() {
        let registry = ListenerRegistry::new();
        for name in ["a", "b"] {
            let l = Listener::builder(name)
                .data(serde_json::json!(1))
                .on_execute(|_| Ok(Status::Done))
                .build(&EngineConfig::default())
                .unwrap();
            registry.insert(l);
        }

        assert_eq!(registry.release_all(), 2);
        for id in registry.ids() {
            registry
                .with(id, |l| {
                    assert!(l.hooks().is_empty());
                    assert!(l.data().is_null());
                })
                .unwrap();
        }
    }
}
