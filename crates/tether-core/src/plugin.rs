//! Plugins installed on a [`Context`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::Context;
use crate::error::BoxError;

/// A unit of behaviour installed on a context with options.
///
/// `apply` receives the context the plugin was installed on; everything the
/// plugin registers through it inherits that context's filter.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, ctx: Context, options: Value) -> Result<(), BoxError>;
}

type ApplyFn = dyn Fn(Context, Value) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

struct FnPlugin {
    name: String,
    apply: Box<ApplyFn>,
}

#[async_trait]
impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, ctx: Context, options: Value) -> Result<(), BoxError> {
        (self.apply)(ctx, options).await
    }
}

/// Builds a plugin from a closure.
pub fn plugin_fn<F>(name: impl Into<String>, apply: F) -> Arc<dyn Plugin>
where
    F: Fn(Context, Value) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync + 'static,
{
    Arc::new(FnPlugin {
        name: name.into(),
        apply: Box::new(apply),
    })
}
