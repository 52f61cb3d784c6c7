//! Per-call cancellation context: an optional deadline and an optional cancellation token.

// crates.io
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, error::CancelReason};

/// Deadline and cancellation signal carried through every suspension point of a call.
///
/// The default context never ends on its own; the transport tightens it with its total retry
/// budget.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
	deadline: Option<Instant>,
	cancel: Option<CancellationToken>,
}
impl RequestContext {
	/// Creates a context with neither deadline nor cancellation token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets an absolute deadline.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Sets a deadline relative to now.
	pub fn with_timeout(self, timeout: Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Attaches a cancellation token; cancelling it unblocks every suspension point.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancel = Some(token);

		self
	}

	/// Returns the deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Returns the time left before the deadline; `None` means unbounded.
	pub fn remaining(&self) -> Option<Duration> {
		self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
	}

	/// Returns why the context already ended, if it did.
	pub fn ended(&self) -> Option<CancelReason> {
		if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
			return Some(CancelReason::Cancelled);
		}
		if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			return Some(CancelReason::Deadline);
		}

		None
	}

	/// Returns a context whose deadline is the earlier of the current one and `now + budget`.
	pub fn tightened(&self, budget: Duration) -> Self {
		let candidate = Instant::now() + budget;
		let deadline = match self.deadline {
			Some(existing) if existing <= candidate => existing,
			_ => candidate,
		};

		Self { deadline: Some(deadline), cancel: self.cancel.clone() }
	}

	/// Resolves once the context ends; pending forever for an unbounded context.
	pub async fn done(&self) -> CancelReason {
		let deadline = async {
			match self.deadline {
				Some(deadline) => time::sleep_until(deadline).await,
				None => std::future::pending::<()>().await,
			}
		};
		let cancelled = async {
			match &self.cancel {
				Some(token) => token.cancelled().await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			_ = cancelled => CancelReason::Cancelled,
			_ = deadline => CancelReason::Deadline,
		}
	}

	/// Drives `fut` to completion unless the context ends first.
	pub async fn run<Fut>(&self, fut: Fut) -> Result<Fut::Output, CancelReason>
	where
		Fut: Future,
	{
		tokio::select! {
			biased;
			reason = self.done() => Err(reason),
			output = fut => Ok(output),
		}
	}

	/// Sleeps for `duration` unless the context would end first.
	///
	/// Returns `false` without sleeping when the remaining time cannot cover `duration`.
	pub async fn sleep_within(&self, duration: Duration) -> bool {
		if duration.is_zero() {
			return true;
		}
		if self.remaining().is_some_and(|remaining| remaining < duration) {
			return false;
		}

		self.run(time::sleep(duration)).await.is_ok()
	}
}
