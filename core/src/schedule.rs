// Debounce / burst / periodic scheduling
//
// The controller only decides *when* fetches are due. It never sleeps itself;
// the store driver asks for the next deadline and sleeps until then.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// What caused a fetch to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireReason {
    Debounce,
    Burst(String),
    Periodic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceMode {
    /// A pending timer is left alone by later registrations
    #[default]
    FirstWins,
    /// Every registration pushes the deadline out again
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebouncePolicy {
    pub delay: Duration,
    pub mode: DebounceMode,
}

/// Per-class burst thresholds sharing one fire delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstPolicy {
    /// (burst class, threshold); fires once the counter exceeds the threshold
    pub rules: Vec<(String, u32)>,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicPolicy {
    /// First tick offset after activation; `None` waits a full period
    pub initial_delay: Option<Duration>,
    pub period: Duration,
}

impl PeriodicPolicy {
    pub fn first_tick_after(&self) -> Duration {
        self.initial_delay.unwrap_or(self.period)
    }
}

/// Full coalescing policy of a store; every part is optional and they coexist
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulePolicy {
    pub debounce: Option<DebouncePolicy>,
    pub burst: Option<BurstPolicy>,
    pub periodic: Option<PeriodicPolicy>,
    /// Delay applied by `Store::request_refresh`
    pub refresh_delay: Duration,
}

impl SchedulePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(DebouncePolicy {
            delay,
            mode: DebounceMode::FirstWins,
        });
        self
    }

    pub fn debounce_mode(mut self, mode: DebounceMode) -> Self {
        if let Some(d) = self.debounce.as_mut() {
            d.mode = mode;
        }
        self
    }

    pub fn burst(mut self, class: &str, threshold: u32, delay: Duration) -> Self {
        let policy = self.burst.get_or_insert_with(|| BurstPolicy {
            rules: Vec::new(),
            delay,
        });
        policy.delay = delay;
        policy.rules.retain(|(c, _)| c != class);
        policy.rules.push((class.to_string(), threshold));
        self
    }

    pub fn periodic(mut self, initial_delay: Option<Duration>, period: Duration) -> Self {
        self.periodic = Some(PeriodicPolicy {
            initial_delay,
            period,
        });
        self
    }

    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }
}

/// Scheduling state machine for one store
#[derive(Debug)]
pub struct Controller {
    policy: SchedulePolicy,
    debounce_deadline: Option<Instant>,
    burst_counters: HashMap<String, u32>,
    // One-shot timers from bursts and manual refreshes
    pending: Vec<(Instant, FireReason)>,
    next_tick: Option<Instant>,
}

impl Controller {
    pub fn new(policy: SchedulePolicy) -> Self {
        Self {
            policy,
            debounce_deadline: None,
            burst_counters: HashMap::new(),
            pending: Vec::new(),
            next_tick: None,
        }
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    /// Arm the periodic timer; called when the store activates
    pub fn activate(&mut self, now: Instant) {
        self.next_tick = self
            .policy
            .periodic
            .as_ref()
            .map(|p| now + p.first_tick_after());
    }

    /// Forget every pending timer; called on teardown
    pub fn deactivate(&mut self) {
        self.debounce_deadline = None;
        self.pending.clear();
        self.next_tick = None;
        self.burst_counters.clear();
    }

    pub fn is_armed(&self) -> bool {
        self.next_deadline().is_some()
    }

    fn arm_debounce(&mut self, now: Instant) {
        if let Some(d) = &self.policy.debounce {
            match d.mode {
                DebounceMode::FirstWins => {
                    if self.debounce_deadline.is_none() {
                        self.debounce_deadline = Some(now + d.delay);
                    }
                }
                DebounceMode::Reset => self.debounce_deadline = Some(now + d.delay),
            }
        }
    }

    /// Key removed from the ledger; only the debounce reacts
    pub fn on_removal(&mut self, now: Instant) {
        self.arm_debounce(now);
    }

    /// Record a registration of a key belonging to `class`, repeat
    /// registrations of a held key included
    pub fn on_registration(&mut self, class: Option<&str>, now: Instant) {
        self.arm_debounce(now);

        let (Some(burst), Some(class)) = (&self.policy.burst, class) else {
            return;
        };
        let Some(threshold) = burst
            .rules
            .iter()
            .find(|(c, _)| c == class)
            .map(|(_, t)| *t)
        else {
            return;
        };
        let counter = self.burst_counters.entry(class.to_string()).or_insert(0);
        *counter += 1;
        if *counter > threshold {
            *counter = 0;
            self.pending
                .push((now + burst.delay, FireReason::Burst(class.to_string())));
        }
    }

    /// Schedule a one-off fetch after the refresh delay
    pub fn on_refresh_request(&mut self, now: Instant) {
        self.pending
            .push((now + self.policy.refresh_delay, FireReason::Manual));
    }

    pub fn burst_count(&self, class: &str) -> u32 {
        self.burst_counters.get(class).copied().unwrap_or(0)
    }

    /// Earliest instant at which something is due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .map(|(at, _)| *at)
            .chain(self.debounce_deadline)
            .chain(self.next_tick)
            .min()
    }

    /// Pop every timer due at `now`; periodic timers re-arm themselves
    pub fn take_due(&mut self, now: Instant) -> Vec<FireReason> {
        let mut due = Vec::new();

        if self.debounce_deadline.is_some_and(|at| at <= now) {
            self.debounce_deadline = None;
            due.push(FireReason::Debounce);
        }

        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].0 <= now {
                due.push(self.pending.swap_remove(i).1);
            } else {
                i += 1;
            }
        }

        if let (Some(at), Some(p)) = (self.next_tick, &self.policy.periodic) {
            if at <= now {
                // Skip missed ticks rather than bursting to catch up.
                // A zero period fires once.
                self.next_tick = (!p.period.is_zero()).then(|| {
                    let mut next = at + p.period;
                    while next <= now {
                        next += p.period;
                    }
                    next
                });
                due.push(FireReason::Periodic);
            }
        }

        due
    }
}
