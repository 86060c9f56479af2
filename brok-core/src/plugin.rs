// Plugin trait for extending a server

use crate::{Error, Server};
use serde_json::Value;

/// An extension installed into a [`Server`] with options.
///
/// `register` runs once, before any request is served. Returning an error
/// aborts the registration and leaves the plugin unrecorded.
pub trait Plugin: Send + Sync {
    /// Unique plugin name
    fn name(&self) -> &'static str;

    /// Plugin version, usually `env!("CARGO_PKG_VERSION")`
    fn version(&self) -> &'static str;

    /// Install routes, middleware or codings into the server
    fn register(&self, server: &mut Server, options: Value) -> Result<(), Error>;
}

/// A plugin recorded by the server after successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
}
