//! Bounded-slot admission control for in-flight requests.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use tokio::sync::Semaphore;
// self
use crate::{_prelude::*, context::RequestContext, error::CancelReason};

/// Counting semaphore limiting how many requests are in flight at once.
///
/// Capacity `0` disables limiting. Slots are handed out as [`SlotPermit`] guards that release
/// on drop; [`ConcurrencyLimiter::release`] is also public and ignores releases beyond what is
/// currently held.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
	semaphore: Option<Semaphore>,
	capacity: usize,
	held: AtomicUsize,
	strict: bool,
}
impl ConcurrencyLimiter {
	/// Recommended capacity for Jamf Pro instances.
	pub const DEFAULT_CAPACITY: usize = 5;

	/// Creates a limiter with `capacity` slots (`0` = unlimited).
	pub fn new(capacity: usize) -> Self {
		Self {
			semaphore: (capacity > 0).then(|| Semaphore::new(capacity)),
			capacity,
			held: AtomicUsize::new(0),
			strict: false,
		}
	}

	/// Creates a limiter that logs a warning whenever a release finds nothing held.
	pub fn strict(capacity: usize) -> Self {
		Self { strict: true, ..Self::new(capacity) }
	}

	/// Returns the configured capacity (`0` = unlimited).
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Returns how many slots are currently held.
	pub fn in_flight(&self) -> usize {
		self.held.load(Ordering::Acquire)
	}

	/// Waits for a free slot, or returns why `ctx` ended first without consuming a slot.
	pub async fn acquire(&self, ctx: &RequestContext) -> Result<SlotPermit<'_>, CancelReason> {
		if let Some(reason) = ctx.ended() {
			return Err(reason);
		}

		let Some(semaphore) = &self.semaphore else {
			return Ok(SlotPermit { limiter: self, active: false });
		};
		let permit = ctx
			.run(semaphore.acquire())
			.await?
			// The semaphore is owned by the limiter and never closed.
			.map_err(|_| CancelReason::Cancelled)?;

		permit.forget();
		self.held.fetch_add(1, Ordering::AcqRel);

		Ok(SlotPermit { limiter: self, active: true })
	}

	/// Attempts to take a slot without waiting.
	pub fn try_acquire(&self) -> Option<SlotPermit<'_>> {
		let Some(semaphore) = &self.semaphore else {
			return Some(SlotPermit { limiter: self, active: false });
		};
		let permit = semaphore.try_acquire().ok()?;

		permit.forget();
		self.held.fetch_add(1, Ordering::AcqRel);

		Some(SlotPermit { limiter: self, active: true })
	}

	/// Returns one slot to the pool. Never blocks; does nothing when no slot is held.
	pub fn release(&self) {
		let Some(semaphore) = &self.semaphore else {
			return;
		};
		let released = self
			.held
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| held.checked_sub(1))
			.is_ok();

		if released {
			semaphore.add_permits(1);
		} else if self.strict {
			tracing::warn!(capacity = self.capacity, "Concurrency slot released while none held.");
		}
	}
}
impl Default for ConcurrencyLimiter {
	fn default() -> Self {
		Self::new(Self::DEFAULT_CAPACITY)
	}
}

/// RAII guard for one concurrency slot; releases on drop.
#[must_use = "dropping the permit releases the slot immediately"]
pub struct SlotPermit<'a> {
	limiter: &'a ConcurrencyLimiter,
	active: bool,
}
impl Debug for SlotPermit<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SlotPermit").field("active", &self.active).finish()
	}
}
impl Drop for SlotPermit<'_> {
	fn drop(&mut self) {
		if self.active {
			self.limiter.release();
		}
	}
}
