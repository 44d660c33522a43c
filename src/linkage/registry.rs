//! Class-to-arena registry
//!
//! Arenas are keyed by the identity of the class that owns them and hold only a weak
//! back-reference, so a class going away makes its entry stale. Stale entries are
//! expunged on every access and by [`sweep`]; dropping the holder reclaims the pages.

use crate::arena::CodeArena;
use crate::logging;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::{Arc, Weak};

/// Global registry (concurrent map keyed by class identity)
static REGISTRY: Lazy<DashMap<usize, PageHolder>> = Lazy::new(|| DashMap::with_capacity(64));

/// Arenas attached to one class
struct PageHolder {
    owner: Weak<dyn Any + Send + Sync>,
    arenas: Vec<CodeArena>,
}

impl PageHolder {
    #[inline]
    fn is_live(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

/// Identity of a class handle
#[inline]
pub fn identity<T: ?Sized>(class: &Arc<T>) -> usize {
    Arc::as_ptr(class) as *const () as usize
}

/// Keep `arena` alive for as long as `class` is
pub(crate) fn register<T: Any + Send + Sync>(class: &Arc<T>, arena: CodeArena) {
    sweep();

    let key = identity(class);
    let weak: Weak<T> = Arc::downgrade(class);
    let owner: Weak<dyn Any + Send + Sync> = weak;
    REGISTRY
        .entry(key)
        .or_insert_with(|| PageHolder { owner, arenas: Vec::new() })
        .arenas
        .push(arena);
}

/// Drop every entry whose class is gone; returns how many were expunged
pub fn sweep() -> usize {
    let before = REGISTRY.len();
    REGISTRY.retain(|_, holder| holder.is_live());
    let remaining = REGISTRY.len();
    let expunged = before.saturating_sub(remaining);

    if expunged > 0 {
        logging::log_registry_swept(expunged, remaining);
    }
    expunged
}

/// Whether `class` currently owns any arena
pub fn is_registered<T: ?Sized>(class: &Arc<T>) -> bool {
    sweep();
    REGISTRY.contains_key(&identity(class))
}

/// Number of arenas attached to `class`
pub fn arena_count<T: ?Sized>(class: &Arc<T>) -> usize {
    sweep();
    REGISTRY.get(&identity(class)).map(|h| h.arenas.len()).unwrap_or(0)
}

/// Whether `addr` lies in any registered arena
pub fn owns_address(addr: usize) -> bool {
    sweep();
    REGISTRY
        .iter()
        .any(|entry| entry.value().arenas.iter().any(|a| a.contains(addr as *const u8)))
}

/// Live entries
pub fn len() -> usize {
    sweep();
    REGISTRY.len()
}

pub fn is_empty() -> bool {
    len() == 0
}
