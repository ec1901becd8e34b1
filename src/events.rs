//! Event binding registry
//!
//! Id event adalah index ke `Vec` callback: dialokasikan berurutan dari nol,
//! tidak pernah dipakai ulang dan tidak pernah dihapus selama session hidup.
//! Binding ulang elemen yang sama saat redraw tetap menambah id baru.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::session::Session;

/// Callback yang dipanggil saat renderer mengirim event dengan id-nya.
///
/// Menerima session supaya bisa update text cell atau inflate ulang tree.
pub type Callback = Rc<RefCell<dyn FnMut(&mut Session) -> Result<()>>>;

/// Bungkus closure menjadi `Callback`
pub fn callback<F>(f: F) -> Callback
where
    F: FnMut(&mut Session) -> Result<()> + 'static,
{
    Rc::new(RefCell::new(f))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry milik satu session, hanya bertambah.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: Vec<Callback>,
}

impl CallbackRegistry {
    pub fn register(&mut self, callback: Callback) -> EventId {
        let id = EventId(self.callbacks.len() as u64);
        self.callbacks.push(callback);
        id
    }

    /// Id yang tidak dikenal menghasilkan `None`, bukan error.
    pub fn get(&self, id: EventId) -> Option<Callback> {
        let index = usize::try_from(id.0).ok()?;
        self.callbacks.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_and_never_reused() {
        let mut registry = CallbackRegistry::default();
        let noop = callback(|_| Ok(()));

        let ids: Vec<_> = (0..5).map(|_| registry.register(noop.clone())).collect();
        assert_eq!(ids, (0..5).map(EventId).collect::<Vec<_>>());

        // Callback yang identik tetap dapat id baru
        assert_eq!(registry.register(noop), EventId(5));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let mut registry = CallbackRegistry::default();
        registry.register(callback(|_| Ok(())));

        assert!(registry.get(EventId(0)).is_some());
        assert!(registry.get(EventId(1)).is_none());
        assert!(registry.get(EventId(u64::MAX)).is_none());
    }
}
