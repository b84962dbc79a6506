//! Typed reads over the metadata store.

use std::any::TypeId;

use tether_core::{MetadataKey, MetadataStore, Target};

use crate::keys::MEMBERS;

/// Read-side helper over a [`MetadataStore`].
#[derive(Clone, Copy)]
pub struct MetadataFetcher {
    store: &'static MetadataStore,
}

impl Default for MetadataFetcher {
    fn default() -> Self {
        Self::new(MetadataStore::global())
    }
}

impl MetadataFetcher {
    pub fn new(store: &'static MetadataStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'static MetadataStore {
        self.store
    }

    pub fn class_metadata<T: Clone + 'static>(&self, key: MetadataKey<T>, class: TypeId) -> Option<T> {
        self.store.get(key, Target::Class(class))
    }

    pub fn class_array<T: Clone + 'static>(&self, key: MetadataKey<T>, class: TypeId) -> Vec<T> {
        self.store.get_array(key, Target::Class(class))
    }

    pub fn member_metadata<T: Clone + 'static>(
        &self,
        key: MetadataKey<T>,
        class: TypeId,
        member: &'static str,
    ) -> Option<T> {
        self.store.get(key, Target::Member(class, member))
    }

    pub fn member_array<T: Clone + 'static>(
        &self,
        key: MetadataKey<T>,
        class: TypeId,
        member: &'static str,
    ) -> Vec<T> {
        self.store.get_array(key, Target::Member(class, member))
    }

    /// Class-level entries followed by member-level entries.
    pub fn property_array<T: Clone + 'static>(
        &self,
        key: MetadataKey<T>,
        class: TypeId,
        member: &'static str,
    ) -> Vec<T> {
        let mut values = self.class_array(key, class);
        values.extend(self.member_array(key, class, member));
        values
    }

    /// Registration points of `class`, in declaration order.
    pub fn members(&self, class: TypeId) -> Vec<&'static str> {
        self.class_array(MEMBERS, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Owner;

    const TAGS: MetadataKey<&'static str> = MetadataKey::new("test:tags");

    #[test]
    fn test_property_array_is_class_first() {
        let store: &'static MetadataStore = Box::leak(Box::new(MetadataStore::new()));
        let fetcher = MetadataFetcher::new(store);
        store.append(TAGS, Target::member::<Owner>("run"), "method");
        store.append(TAGS, Target::class::<Owner>(), "class");

        let class = TypeId::of::<Owner>();
        assert_eq!(fetcher.property_array(TAGS, class, "run"), vec!["class", "method"]);
        assert_eq!(fetcher.property_array(TAGS, class, "other"), vec!["class"]);
        assert!(fetcher.members(class).is_empty());
    }
}
