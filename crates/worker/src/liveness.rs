use tokio_util::sync::CancellationToken;

/// Revocable liveness switch shared by an owner and its background work.
///
/// Once revoked, a liveness switch never becomes live again. Children are
/// revoked together with their parent, while revoking a child leaves the
/// parent untouched.
#[derive(Debug, Clone, Default)]
pub struct Liveness {
	cancel: CancellationToken,
}

impl Liveness {
	/// Creates a live switch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true until [`Self::revoke`] is called on this switch or an ancestor.
	pub fn is_live(&self) -> bool {
		!self.cancel.is_cancelled()
	}

	/// Clears the switch. Idempotent.
	pub fn revoke(&self) {
		self.cancel.cancel();
	}

	/// Resolves once the switch has been revoked.
	pub async fn revoked(&self) {
		self.cancel.cancelled().await;
	}

	/// Creates a child switch scoped to this one.
	pub fn child(&self) -> Self {
		Self {
			cancel: self.cancel.child_token(),
		}
	}
}
