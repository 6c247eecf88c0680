use std::time::Duration;

use tokio::time::Instant;

use crate::proto::{Subscription, SubscriptionMode};

struct SampleEntry {
    subscription: Subscription,
    interval: Duration,
    last_fired: Instant,
}

/// Tracks when each SAMPLE subscription of a session last fired.
///
/// Polled by the streaming loop on a fixed cadence, so intervals shorter
/// than that cadence are served at the cadence.
pub struct Sampler {
    entries: Vec<SampleEntry>,
}

impl Sampler {
    pub fn new(subscriptions: &[Subscription]) -> Self {
        Self::seeded_at(subscriptions, Instant::now())
    }

    /// Only SAMPLE subscriptions are tracked, the other modes never fire.
    pub fn seeded_at(subscriptions: &[Subscription], now: Instant) -> Self {
        let entries = subscriptions
            .iter()
            .filter(|sub| sub.mode() == SubscriptionMode::Sample)
            .map(|sub| SampleEntry {
                subscription: sub.clone(),
                interval: Duration::from_nanos(sub.sample_interval),
                last_fired: now,
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn tick(&mut self) -> Vec<&Subscription> {
        self.tick_at(Instant::now())
    }

    /// The subscriptions whose interval has passed, in registration order.
    /// Each one returned starts a fresh interval from `now`.
    pub fn tick_at(&mut self, now: Instant) -> Vec<&Subscription> {
        self.entries
            .iter_mut()
            .filter_map(|entry| {
                let elapsed = now.saturating_duration_since(entry.last_fired);
                if elapsed > entry.interval {
                    entry.last_fired = now;
                    Some(&entry.subscription)
                } else {
                    None
                }
            })
            .collect()
    }
}
