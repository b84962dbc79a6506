//! Typed metadata attached to types and their members.
//!
//! The store has two slots per `(target, key)`:
//!
//! - a **single** slot written by [`set`](MetadataStore::set), where each write
//!   replaces the previous value;
//! - an **array** slot written by [`append`](MetadataStore::append) and
//!   [`concat`](MetadataStore::concat), which only ever grows.
//!
//! Class-level and member-level entries are independent. Reads never fail:
//! a missing single slot is `None`, a missing array slot is empty.
//!
//! Values are cloned out on read, so stored types are expected to be cheap to
//! clone (`Arc`s, small enums, strings).

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::LazyLock;

use parking_lot::{ReentrantMutex, RwLock};

/// A typed metadata key.
pub struct MetadataKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MetadataKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for MetadataKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MetadataKey<T> {}

impl<T> fmt::Debug for MetadataKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetadataKey({})", self.name)
    }
}

/// What a metadata entry is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Class(TypeId),
    Member(TypeId, &'static str),
}

impl Target {
    pub fn class<T: 'static>() -> Self {
        Self::Class(TypeId::of::<T>())
    }

    pub fn member<T: 'static>(name: &'static str) -> Self {
        Self::Member(TypeId::of::<T>(), name)
    }

    /// The type owning this target.
    pub fn owner(&self) -> TypeId {
        match self {
            Self::Class(id) | Self::Member(id, _) => *id,
        }
    }
}

type Slot = (Target, &'static str);
type Stored = Box<dyn Any + Send + Sync>;

/// Metadata storage.
#[derive(Default)]
pub struct MetadataStore {
    single: RwLock<HashMap<Slot, Stored>>,
    arrays: RwLock<HashMap<Slot, Stored>>,
    described: ReentrantMutex<RefCell<HashSet<TypeId>>>,
}

static GLOBAL: LazyLock<MetadataStore> = LazyLock::new(MetadataStore::default);

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store.
    pub fn global() -> &'static MetadataStore {
        &GLOBAL
    }

    /// Writes the single slot, replacing any previous value.
    pub fn set<T>(&self, key: MetadataKey<T>, target: Target, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.single
            .write()
            .insert((target, key.name), Box::new(value));
    }

    /// Pushes one value onto the array slot.
    pub fn append<T>(&self, key: MetadataKey<T>, target: Target, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.concat(key, target, [value]);
    }

    /// Pushes every value onto the array slot, in order.
    pub fn concat<T, I>(&self, key: MetadataKey<T>, target: Target, values: I)
    where
        T: Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let mut arrays = self.arrays.write();
        let entry = arrays
            .entry((target, key.name))
            .or_insert_with(|| Box::new(Vec::<T>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<T>>() {
            list.extend(values);
        } else {
            *entry = Box::new(values.into_iter().collect::<Vec<T>>());
        }
    }

    /// Reads the single slot.
    pub fn get<T>(&self, key: MetadataKey<T>, target: Target) -> Option<T>
    where
        T: Clone + 'static,
    {
        self.single
            .read()
            .get(&(target, key.name))
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Reads the array slot; empty when nothing was appended.
    pub fn get_array<T>(&self, key: MetadataKey<T>, target: Target) -> Vec<T>
    where
        T: Clone + 'static,
    {
        self.arrays
            .read()
            .get(&(target, key.name))
            .and_then(|v| v.downcast_ref::<Vec<T>>())
            .cloned()
            .unwrap_or_default()
    }

    /// Runs `describe` the first time `type_id` is seen, and returns whether
    /// it ran.
    ///
    /// Concurrent callers for any type wait until the running description
    /// has finished, so nobody observes half-written metadata. Nested calls
    /// from the same thread are allowed.
    pub fn describe_once(&self, type_id: TypeId, describe: impl FnOnce()) -> bool {
        let described = self.described.lock();
        if !described.borrow_mut().insert(type_id) {
            return false;
        }
        describe();
        true
    }
}
