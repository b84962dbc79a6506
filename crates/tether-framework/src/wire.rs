//! Reactive capability wiring.
//!
//! A [`ServiceWire`] field on a provider mirrors a named capability slot of
//! the provider's resolved context. It holds no value of its own: every
//! `get` reads the slot as it is right now, and every `set` writes through.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tether_core::{Context, Instance, ServiceArc};

/// A live handle to capability slot `name` of a context.
pub struct ServiceWire<S> {
    slot: RwLock<Option<(Context, String)>>,
    _marker: PhantomData<fn() -> S>,
}

impl<S> Default for ServiceWire<S> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(None),
            _marker: PhantomData,
        }
    }
}

impl<S> fmt::Debug for ServiceWire<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWire")
            .field("service", &self.slot.read().as_ref().map(|(_, name)| name.clone()))
            .finish()
    }
}

impl<S: Send + Sync + 'static> ServiceWire<S> {
    /// An unbound wire. Reads return `None` until it is bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the wire at slot `name` of `ctx`, replacing any earlier binding.
    pub fn bind(&self, ctx: Context, name: impl Into<String>) {
        *self.slot.write() = Some((ctx, name.into()));
    }

    pub fn is_bound(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Name of the bound capability.
    pub fn name(&self) -> Option<String> {
        self.slot.read().as_ref().map(|(_, name)| name.clone())
    }

    /// Reads the current slot value.
    pub fn get(&self) -> Option<Arc<S>> {
        let slot = self.slot.read();
        let (ctx, name) = slot.as_ref()?;
        ctx.service_as::<S>(name)
    }

    /// Writes the slot; `None` clears it. Returns `false` while unbound.
    ///
    /// Assigning a value notifies the slot's `service/<name>` listeners.
    pub async fn set(&self, value: Option<Arc<S>>) -> bool {
        let Some((ctx, name)) = self.slot.read().clone() else {
            return false;
        };
        ctx.set_service(&name, value.map(|v| v as ServiceArc)).await;
        true
    }
}

/// Binds a wire field of an instance to a context.
pub type WireBinder = Arc<dyn Fn(&Instance, &Context, &str) -> bool + Send + Sync>;

/// A declared wire field.
#[derive(Clone)]
pub struct WireBinding {
    pub property: &'static str,
    pub service: String,
    pub bind: WireBinder,
}

impl fmt::Debug for WireBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireBinding")
            .field("property", &self.property)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl WireBinding {
    /// A binding for the field of `T` returned by `accessor`.
    pub fn new<T, S>(
        property: &'static str,
        service: impl Into<String>,
        accessor: fn(&T) -> &ServiceWire<S>,
    ) -> Self
    where
        T: Send + Sync + 'static,
        S: Send + Sync + 'static,
    {
        Self {
            property,
            service: service.into(),
            bind: Arc::new(move |instance: &Instance, ctx: &Context, name: &str| {
                let Some(this) = instance.downcast_ref::<T>() else {
                    return false;
                };
                accessor(this).bind(ctx.clone(), name);
                true
            }),
        }
    }

    /// The same field reached from a `T` through `project`.
    pub fn project<T, B>(&self, project: fn(&Arc<T>) -> Arc<B>) -> Self
    where
        T: Any + Send + Sync,
        B: Any + Send + Sync,
    {
        let bind = self.bind.clone();
        Self {
            property: self.property,
            service: self.service.clone(),
            bind: Arc::new(move |instance: &Instance, ctx: &Context, name: &str| {
                let Ok(this) = instance.clone().downcast::<T>() else {
                    return false;
                };
                let base: Instance = project(&this);
                bind(&base, ctx, name)
            }),
        }
    }

    /// Binds this field on `instance` to slot `self.service` of `ctx`.
    pub fn apply(&self, instance: &Instance, ctx: &Context) -> bool {
        (self.bind)(instance, ctx, &self.service)
    }
}
