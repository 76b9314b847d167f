//! Reference-counted ownership of native resources.
//!
//! A [`ResourceHandle`] starts with one reference, owned by the host wrapper.
//! That reference can be dropped through two triggers, [`ResourceHandle::destroy`]
//! (explicit) and [`ResourceHandle::finalize`] (garbage collection). Whichever
//! runs first unbinds the wrapper; the other becomes a no-op. Additional
//! references come from [`ResourceHandle::retain`]. The native value is dropped
//! exactly once, on the transition of the count from 1 to 0.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Outcome of dropping one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Nothing happened: the reference had already been given up.
    Ignored,
    /// Other references keep the resource alive.
    Retained { remaining: usize },
    /// The native value was dropped.
    Freed,
}

struct Inner<T> {
    kind: &'static str,
    refs: AtomicUsize,
    bound: AtomicBool,
    slot: RwLock<Option<T>>,
}

impl<T> Inner<T> {
    fn read(&self) -> RwLockReadGuard<'_, Option<T>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<T>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn empty_slot_error(&self) -> Error {
        if self.refs.load(Ordering::Acquire) == 0 {
            Error::Released
        } else {
            Error::NotLoaded
        }
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let slot = self.read();
        match slot.as_ref() {
            Some(value) => Ok(f(value)),
            None => Err(self.empty_slot_error()),
        }
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut slot = self.write();
        match slot.as_mut() {
            Some(value) => Ok(f(value)),
            None => Err(self.empty_slot_error()),
        }
    }

    fn release(&self) -> Release {
        match self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Err(_) => Release::Ignored,
            Ok(1) => {
                // Take the value out under the lock, drop it after.
                let value = self.write().take();
                let populated = value.is_some();
                drop(value);
                debug!(kind = self.kind, populated, "freed native resource");
                Release::Freed
            }
            Ok(prev) => Release::Retained {
                remaining: prev - 1,
            },
        }
    }
}

/// Shared, reference-counted slot holding one native resource.
///
/// Clones share the same record; cloning does not add a reference.
pub struct ResourceHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ResourceHandle<T> {
    /// A bound handle with one reference and an empty slot.
    pub fn new(kind: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                refs: AtomicUsize::new(1),
                bound: AtomicBool::new(true),
                slot: RwLock::new(None),
            }),
        }
    }

    /// Store the native value. The slot can be filled only once.
    pub fn populate(&self, value: T) -> Result<()> {
        let mut slot = self.inner.write();
        if self.inner.refs.load(Ordering::Acquire) == 0 {
            return Err(Error::Released);
        }
        if slot.is_some() {
            return Err(Error::AlreadyLoaded);
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn is_populated(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Whether the host wrapper still owns its reference.
    pub fn is_bound(&self) -> bool {
        self.inner.bound.load(Ordering::Acquire)
    }

    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Run `f` against the native value under a shared lock.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.inner.with(f)
    }

    /// Run `f` against the native value under the exclusive lock.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.inner.with_mut(f)
    }

    /// Take an additional reference. Fails once the count has reached zero.
    pub fn retain(&self) -> Result<Retained<T>> {
        self.inner
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n == 0 {
                    None
                } else {
                    n.checked_add(1)
                }
            })
            .map_err(|_| Error::Released)?;
        Ok(Retained {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Explicit teardown by the host.
    pub fn destroy(&self) -> Release {
        self.unbind("destroy")
    }

    /// Teardown by the host's garbage collector.
    pub fn finalize(&self) -> Release {
        self.unbind("finalize")
    }

    fn unbind(&self, trigger: &'static str) -> Release {
        if !self.inner.bound.swap(false, Ordering::AcqRel) {
            trace!(kind = self.inner.kind, trigger, "wrapper already unbound");
            return Release::Ignored;
        }
        let outcome = self.inner.release();
        debug!(kind = self.inner.kind, trigger, ?outcome, "wrapper unbound");
        outcome
    }
}

/// A counted reference taken with [`ResourceHandle::retain`], released on drop.
pub struct Retained<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Retained<T> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.inner.with(f)
    }
}

impl<T> Drop for Retained<T> {
    fn drop(&mut self) {
        self.inner.release();
    }
}
