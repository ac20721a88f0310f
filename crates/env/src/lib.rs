//! Live module environments for editor-hosted build tooling.
//!
//! An [`Environment`] loads named modules on demand through an external
//! [`ModuleLoader`], caches each result for its lifetime, and coalesces
//! concurrent requests for the same module into one load. Every module it
//! loads is also watched: the host's source-changed event and a slow backstop
//! poll both compare the editor-held text against the last text seen, and a
//! divergence is broadcast once through [`Environment::on_dependency_changed`].
//!
//! The environment only reports staleness. It never evicts cached results,
//! and it does not cancel loads that are still running when it is torn down.
//!
//! # Teardown
//!
//! [`Environment::destroy`] runs once: the registered shutdown hook first,
//! then the liveness switch is revoked, then every host subscription is
//! disconnected and every poller cancelled, and finally the change signal is
//! closed. Afterwards `watch` is a no-op and `load` fails with
//! [`EnvError::Destroyed`].

mod config;
mod detector;
mod environment;
mod error;
mod flight;
mod host;
mod injection;
mod lifecycle;
mod signal;
mod store;

pub use config::EnvConfig;
pub use environment::{Environment, EnvironmentId};
pub use error::{ConfigError, EnvError, Result};
pub use host::{BoxError, ModuleKey, ModuleLoader, OnDisconnect, SourceChangedFn, SourceHost, SourceSubscription};
pub use injection::{InjectedValue, InjectionTable, SharedState};
pub use lifecycle::ShutdownHook;
pub use signal::SignalConnection;
