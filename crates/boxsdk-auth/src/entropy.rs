//! Time and randomness sources for assertion building.
//!
//! Both are traits so that tests can pin the issuance time and the `jti`
//! draws. The defaults read the wall clock and the operating system's
//! CSPRNG.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cryptographically secure random source.
pub trait SecureRandom: Send + Sync {
    /// A uniformly drawn integer in `low..=high`.
    fn range_inclusive(&self, low: usize, high: usize) -> usize;

    /// A uniformly drawn float in `[0, 1)`.
    fn unit_f64(&self) -> f64;
}

/// Random source backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn range_inclusive(&self, low: usize, high: usize) -> usize {
        OsRng.gen_range(low..=high)
    }

    fn unit_f64(&self) -> f64 {
        OsRng.gen::<f64>()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{FixedClock, ScriptedRandom};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use std::collections::VecDeque;

    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;

    use super::{Clock, SecureRandom};

    /// A clock that always returns the same instant.
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// A random source that replays scripted draws and records how it was
    /// called.
    ///
    /// Panics if more floats are drawn than were scripted.
    #[derive(Debug, Default)]
    pub struct ScriptedRandom {
        length: usize,
        floats: Mutex<VecDeque<f64>>,
        range_calls: Mutex<Vec<(usize, usize)>>,
        float_calls: Mutex<usize>,
    }

    impl ScriptedRandom {
        /// Script a `jti` of `length` characters drawn from `floats`.
        #[must_use]
        pub fn new(length: usize, floats: Vec<f64>) -> Self {
            Self {
                length,
                floats: Mutex::new(floats.into()),
                range_calls: Mutex::new(Vec::new()),
                float_calls: Mutex::new(0),
            }
        }

        /// Script `count` exchanges of a `length`-character `jti`, each drawn
        /// from `floats`.
        #[must_use]
        pub fn repeating(length: usize, floats: &[f64], count: usize) -> Self {
            let all = floats
                .iter()
                .copied()
                .cycle()
                .take(floats.len() * count)
                .collect();
            Self::new(length, all)
        }

        /// Arguments of every `range_inclusive` call so far.
        #[must_use]
        pub fn range_calls(&self) -> Vec<(usize, usize)> {
            self.range_calls.lock().clone()
        }

        /// Number of `unit_f64` draws so far.
        #[must_use]
        pub fn float_calls(&self) -> usize {
            *self.float_calls.lock()
        }
    }

    impl SecureRandom for ScriptedRandom {
        fn range_inclusive(&self, low: usize, high: usize) -> usize {
            self.range_calls.lock().push((low, high));
            self.length
        }

        fn unit_f64(&self) -> f64 {
            *self.float_calls.lock() += 1;
            self.floats
                .lock()
                .pop_front()
                .expect("ScriptedRandom ran out of scripted floats")
        }
    }
}
