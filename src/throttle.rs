//! Latency-driven self-throttling.
//!
//! The API publishes no rate-limit headers, so the only back-pressure signal is how long the
//! server takes to answer. [`AdaptiveRateController`] keeps an exponential moving average of
//! observed latencies and suggests a pause whenever one response is markedly slower than the
//! baseline.

// self
use crate::_prelude::*;

/// Exponential-moving-average throttle shared by every in-flight call of one transport.
#[derive(Debug)]
pub struct AdaptiveRateController {
	ema: Mutex<Option<Duration>>,
	ceiling: Duration,
}
impl AdaptiveRateController {
	/// Smoothing factor numerator (alpha = 1/5 = 0.2).
	const ALPHA_NUM: u128 = 1;
	/// Smoothing factor denominator.
	const ALPHA_DEN: u128 = 5;
	/// Default upper bound for a suggested delay.
	pub const DEFAULT_CEILING: Duration = Duration::from_secs(5);

	/// Creates a controller whose suggestions never exceed `ceiling`.
	pub fn new(ceiling: Duration) -> Self {
		Self { ema: Mutex::new(None), ceiling }
	}

	/// Returns the ceiling applied to suggested delays.
	pub fn ceiling(&self) -> Duration {
		self.ceiling
	}

	/// Folds `observed` into the average and returns the pause to take before the next request.
	///
	/// The first observation only seeds the average. Afterwards the updated average is the
	/// baseline: anything up to twice the baseline suggests no pause, anything slower suggests
	/// the excess over the baseline, capped at the ceiling.
	pub fn record(&self, observed: Duration) -> Duration {
		let mut ema = self.ema.lock();
		let Some(previous) = *ema else {
			*ema = Some(observed);

			return Duration::ZERO;
		};
		let blended = (Self::ALPHA_NUM * observed.as_nanos()
			+ (Self::ALPHA_DEN - Self::ALPHA_NUM) * previous.as_nanos())
			/ Self::ALPHA_DEN;
		let current = nanos(blended);

		*ema = Some(current);

		if observed <= current.saturating_mul(2) {
			Duration::ZERO
		} else {
			observed.saturating_sub(current).min(self.ceiling)
		}
	}

	/// Returns the current average, or `None` before the first observation.
	pub fn estimate(&self) -> Option<Duration> {
		*self.ema.lock()
	}

	/// Forgets every observation.
	pub fn reset(&self) {
		*self.ema.lock() = None;
	}
}
impl Default for AdaptiveRateController {
	fn default() -> Self {
		Self::new(Self::DEFAULT_CEILING)
	}
}

fn nanos(value: u128) -> Duration {
	let secs = value / 1_000_000_000;
	let sub = (value % 1_000_000_000) as u32;

	Duration::new(u64::try_from(secs).unwrap_or(u64::MAX), sub)
}
