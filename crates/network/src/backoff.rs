// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Provides a bounded linear backoff used for managing reconnection delays in the
//! realtime client.
//!
//! The delay before attempt `k` is `base_delay * k`. Once the configured number of
//! attempts has been handed out the backoff is exhausted and yields no further delays
//! until it is reset.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct LinearBackoff {
    /// The delay unit multiplied by the attempt number.
    base_delay: Duration,
    /// The maximum number of attempts before the backoff is exhausted.
    max_attempts: u32,
    /// The number of attempts handed out since the last reset.
    attempt: u32,
}

impl LinearBackoff {
    /// Creates a new [`LinearBackoff`] instance.
    #[must_use]
    pub const fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempt: 0,
        }
    }

    /// Returns the delay before the next attempt and advances the attempt counter.
    ///
    /// Returns `None` once `max_attempts` delays have been handed out; the counter is
    /// left unchanged in that case.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(self.base_delay.saturating_mul(self.attempt))
    }

    /// Reset the backoff to its initial state.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Returns the number of attempts handed out since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns true if no further attempts are available.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_linear_growth_until_exhausted() {
        let mut backoff = LinearBackoff::new(Duration::from_secs(1), 5);

        let delays: Vec<Duration> = std::iter::from_fn(|| backoff.next_delay()).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(4),
                Duration::from_secs(5),
            ]
        );
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.attempt(), 5);
    }

    #[rstest]
    fn test_exhausted_does_not_advance() {
        let mut backoff = LinearBackoff::new(Duration::from_millis(100), 1);

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempt(), 1);
    }

    #[rstest]
    fn test_reset() {
        let mut backoff = LinearBackoff::new(Duration::from_millis(250), 3);

        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
        backoff.reset();

        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(250)));
    }

    #[rstest]
    fn test_zero_attempts_is_exhausted() {
        let mut backoff = LinearBackoff::new(Duration::from_secs(1), 0);

        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }
}
