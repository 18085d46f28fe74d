//! [`Slot`] – an ordered, named list of interchangeable implementations with
//! one active entry.

/// A capability slot.
///
/// A slot is never empty and its selection always indexes a registered
/// entry, so [`Slot::current`] and [`Slot::current_name`] cannot fail.
#[derive(Debug, Clone)]
pub struct Slot<T> {
    entries: Vec<(String, T)>,
    selected: usize,
}

impl<T> Slot<T> {
    /// Create a slot whose first (and default) entry is `item`.
    pub fn new(name: impl Into<String>, item: T) -> Self {
        Self {
            entries: vec![(name.into(), item)],
            selected: 0,
        }
    }

    /// Append an entry.  An existing entry with the same name is replaced in
    /// place and keeps its position.
    pub fn register(&mut self, name: impl Into<String>, item: T) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = item,
            None => self.entries.push((name, item)),
        }
    }

    /// Names of every entry in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Make the entry registered under `name` active.
    ///
    /// Unknown names leave the selection untouched; the return value only
    /// reports whether anything matched.
    pub fn select(&mut self, name: &str) -> bool {
        match self.entries.iter().position(|(n, _)| n == name) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    /// The active implementation.
    pub fn current(&self) -> &T {
        &self.entries[self.selected].1
    }

    /// Name of the active implementation.
    pub fn current_name(&self) -> &str {
        &self.entries[self.selected].0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Slot<u32> {
        let mut slot = Slot::new("a", 1);
        slot.register("b", 2);
        slot.register("c", 3);
        slot
    }

    #[test]
    fn first_entry_is_default() {
        let slot = sample();
        assert_eq!(*slot.current(), 1);
        assert_eq!(slot.current_name(), "a");
    }

    #[test]
    fn names_keep_registration_order() {
        assert_eq!(sample().names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn select_every_registered_name() {
        let mut slot = sample();
        for (name, value) in [("c", 3), ("a", 1), ("b", 2)] {
            assert!(slot.select(name));
            assert_eq!(*slot.current(), value);
            assert_eq!(slot.current_name(), name);
        }
    }

    #[test]
    fn select_unknown_name_is_noop() {
        let mut slot = sample();
        slot.select("b");
        assert!(!slot.select("nonexistent"));
        assert_eq!(*slot.current(), 2);
        assert_eq!(slot.current_name(), "b");
    }

    #[test]
    fn re_registering_replaces_in_place() {
        let mut slot = sample();
        slot.register("a", 10);
        assert_eq!(slot.names(), vec!["a", "b", "c"]);
        assert_eq!(*slot.current(), 10);
    }
}
