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

//! Property-based tests for linear backoff.
//!
//! These tests verify invariants that should hold regardless of specific parameter
//! combinations:
//! - The delay before attempt k is exactly k times the base delay
//! - No delay is produced once the attempt bound is reached
//! - Reset restores the initial schedule

use std::time::Duration;

use proptest::prelude::*;
use psichat_network::backoff::LinearBackoff;
use rstest::rstest;

/// Generate valid backoff parameters.
fn backoff_params_strategy() -> impl Strategy<Value = (Duration, u32)> {
    (
        1u64..=10_000u64, // base_ms: 1ms to 10s
        0u32..=20u32,     // max_attempts
    )
        .prop_map(|(base_ms, max_attempts)| (Duration::from_millis(base_ms), max_attempts))
}

proptest! {
    /// Property: The k-th delay equals k times the base delay.
    #[rstest]
    fn backoff_grows_linearly((base, max_attempts) in backoff_params_strategy()) {
        let mut backoff = LinearBackoff::new(base, max_attempts);

        for k in 1..=max_attempts {
            prop_assert_eq!(backoff.next_delay(), Some(base * k));
            prop_assert_eq!(backoff.attempt(), k);
        }
    }

    /// Property: Exhausted backoff never yields another delay and does not advance.
    #[rstest]
    fn backoff_is_bounded(
        (base, max_attempts) in backoff_params_strategy(),
        extra_calls in 1usize..=10
    ) {
        let mut backoff = LinearBackoff::new(base, max_attempts);
        let produced = std::iter::from_fn(|| backoff.next_delay()).count();

        prop_assert_eq!(produced, max_attempts as usize);
        prop_assert!(backoff.is_exhausted());

        for _ in 0..extra_calls {
            prop_assert_eq!(backoff.next_delay(), None);
        }
        prop_assert_eq!(backoff.attempt(), max_attempts);
    }

    /// Property: Reset restores the schedule from the first attempt.
    #[rstest]
    fn backoff_reset_restarts_schedule(
        (base, max_attempts) in backoff_params_strategy(),
        taken in 0u32..=20u32
    ) {
        let mut backoff = LinearBackoff::new(base, max_attempts);
        for _ in 0..taken {
            backoff.next_delay();
        }

        backoff.reset();

        prop_assert_eq!(backoff.attempt(), 0);
        if max_attempts > 0 {
            prop_assert_eq!(backoff.next_delay(), Some(base));
        } else {
            prop_assert_eq!(backoff.next_delay(), None);
        }
    }

    /// Property: The sum of all delays is base * n(n+1)/2.
    #[rstest]
    fn backoff_total_wait((base, max_attempts) in backoff_params_strategy()) {
        let mut backoff = LinearBackoff::new(base, max_attempts);
        let total: Duration = std::iter::from_fn(|| backoff.next_delay()).sum();
        let n = max_attempts;

        prop_assert_eq!(total, base * (n * (n + 1) / 2));
    }
}

#[rstest]
fn test_default_schedule_is_one_to_five_seconds() {
    let mut backoff = LinearBackoff::new(Duration::from_secs(1), 5);
    let delays: Vec<u64> = std::iter::from_fn(|| backoff.next_delay())
        .map(|d| d.as_secs())
        .collect();

    assert_eq!(delays, vec![1, 2, 3, 4, 5]);
}
