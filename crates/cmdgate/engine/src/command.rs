//! Command records: the `(hash, name, listener)` bindings a controller
//! dispatches on.

use cmdgate_types::ListenerId;

/// 64-bit name hash: the first eight bytes of the BLAKE3 digest.
pub fn name_hash(name: &str) -> u64 {
    let hash = blake3::hash(name.as_bytes());
    let bytes = hash.as_bytes();
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

/// Whether `name` can be registered and typed as a command name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && c != '"' && c != '\'')
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    hash: u64,
    name: String,
    listener: ListenerId,
}

impl Command {
    pub fn new(name: impl Into<String>, listener: ListenerId) -> Self {
        let name = name.into();
        Self {
            hash: name_hash(&name),
            name,
            listener,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_hash(name: impl Into<String>, hash: u64, listener: ListenerId) -> Self {
        Self {
            hash,
            name: name.into(),
            listener,
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }
}

/// Flat sequence of commands owned by one controller.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Vec<Command>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a name: hash first, exact name to break collisions.
    pub fn find(&self, name: &str) -> Option<&Command> {
        let hash = name_hash(name);
        self.commands
            .iter()
            .find(|c| c.hash == hash && c.name == name)
    }

    pub fn find_listener(&self, listener: ListenerId) -> Option<&Command> {
        self.commands.iter().find(|c| c.listener == listener)
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn remove_name(&mut self, name: &str) -> Option<Command> {
        let hash = name_hash(name);
        let pos = self
            .commands
            .iter()
            .position(|c| c.hash == hash && c.name == name)?;
        Some(self.commands.remove(pos))
    }

    pub fn remove_listener(&mut self, listener: ListenerId) -> Option<Command> {
        let pos = self.commands.iter().position(|c| c.listener == listener)?;
        Some(self.commands.remove(pos))
    }

    /// Re-key the record of `listener` under a new name.
    pub fn rename(&mut self, listener: ListenerId, name: &str) -> bool {
        match self.commands.iter_mut().find(|c| c.listener == listener) {
            Some(command) => {
                command.hash = name_hash(name);
                command.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Order by name. Enumeration only; lookups are unaffected.
    pub fn sort(&mut self) {
        self.commands.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lid(index: u32) -> ListenerId {
        ListenerId::new(index, 0)
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(name_hash("kick"), name_hash("kick"));
        assert_ne!(name_hash("kick"), name_hash("ban"));
    }

    #[test]
    fn names_must_be_single_words() {
        assert!(is_valid_name("kick"));
        assert!(is_valid_name("set-skin_2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("two words"));
        assert!(!is_valid_name("tab\there"));
        assert!(!is_valid_name("quo\"te"));
    }

    #[test]
    fn hash_collision_falls_back_to_exact_name() {
        let mut table = CommandTable::new();
        let shared = name_hash("beta");
        table.push(Command::with_hash("alpha", shared, lid(1)));
        table.push(Command::new("beta", lid(2)));

        assert_eq!(table.find("beta").map(Command::listener), Some(lid(2)));
        assert!(table.find("gamma").is_none());
    }

    #[test]
    fn sort_orders_by_name_without_changing_lookup() {
        let mut table = CommandTable::new();
        table.push(Command::new("zeta", lid(1)));
        table.push(Command::new("alpha", lid(2)));
        table.sort();

        let names: Vec<&str> = table.iter().map(Command::name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(table.find("zeta").map(Command::listener), Some(lid(1)));
    }

    #[test]
    fn remove_is_a_no_op_when_missing() {
        let mut table = CommandTable::new();
        table.push(Command::new("kick", lid(1)));
        assert!(table.remove_name("ban").is_none());
        assert!(table.remove_listener(lid(9)).is_none());
        assert_eq!(table.len(), 1);
        assert!(table.remove_name("kick").is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn rename_rekeys_the_record() {
        let mut table = CommandTable::new();
        table.push(Command::new("old", lid(1)));
        assert!(table.rename(lid(1), "new"));
        assert!(table.find("old").is_none());
        assert_eq!(table.find("new").map(Command::hash), Some(name_hash("new")));
    }
}
