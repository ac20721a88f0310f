//! Error types for module loading.

use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;

use crate::EnvironmentId;
use crate::host::BoxError;

/// Errors surfaced by [`Environment::load`](crate::Environment::load).
///
/// Cloneable so one failed load can be handed to every caller attached to it.
#[derive(Debug, Clone, Error)]
pub enum EnvError {
	/// The environment was torn down before the load was requested.
	#[error("environment {env} has been destroyed")]
	Destroyed {
		/// Identity of the destroyed environment.
		env: EnvironmentId,
	},

	/// The external loader reported a failure.
	#[error("failed to load module {module}: {source}")]
	Load {
		/// Debug rendering of the module identity.
		module: String,
		/// The loader's error.
		source: Arc<dyn std::error::Error + Send + Sync + 'static>,
	},

	/// The external loader panicked.
	#[error("loader panicked while loading module {module}")]
	Panicked {
		/// Debug rendering of the module identity.
		module: String,
	},

	/// The load task was torn down by its runtime before it settled.
	#[error("load of module {module} was aborted: {reason}")]
	Aborted {
		/// Debug rendering of the module identity.
		module: String,
		/// Runtime-provided reason.
		reason: String,
	},
}

impl EnvError {
	pub(crate) fn load(module: &impl Debug, source: BoxError) -> Self {
		Self::Load {
			module: format!("{module:?}"),
			source: Arc::from(source),
		}
	}

	pub(crate) fn panicked(module: &impl Debug) -> Self {
		Self::Panicked {
			module: format!("{module:?}"),
		}
	}

	pub(crate) fn aborted(module: &impl Debug, reason: impl ToString) -> Self {
		Self::Aborted {
			module: format!("{module:?}"),
			reason: reason.to_string(),
		}
	}

	/// Returns true for failures that leave the module retryable.
	pub fn is_load_failure(&self) -> bool {
		!matches!(self, Self::Destroyed { .. })
	}
}

/// Result type for environment operations.
pub type Result<T> = std::result::Result<T, EnvError>;

/// Errors that can occur when reading an [`EnvConfig`](crate::EnvConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
	/// TOML syntax or schema error.
	#[error("invalid environment config: {0}")]
	Parse(#[from] toml::de::Error),

	/// `poll-interval-ms` was zero.
	#[error("poll-interval-ms must be greater than zero")]
	InvalidPollInterval,
}
