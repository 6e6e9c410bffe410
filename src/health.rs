use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    /// Consecutive failed cycles reached the threshold.
    Escalate { failures: u32 },
    /// First clean cycle after an escalation.
    Recover { failures: u32 },
}

/// Counts consecutive cycles with at least one failed target.
///
/// Escalates exactly once per failure streak and recovers on the first clean
/// cycle after that.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    threshold: u32,
    consecutive_failures: u32,
    escalated: bool,
}

impl HealthMonitor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: 0,
            escalated: false,
        }
    }

    pub fn record_cycle(&mut self, had_error: bool) -> Option<HealthEvent> {
        if had_error {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            if !self.escalated && self.consecutive_failures >= self.threshold {
                self.escalated = true;
                return Some(HealthEvent::Escalate {
                    failures: self.consecutive_failures,
                });
            }
            return None;
        }

        let failures = std::mem::take(&mut self.consecutive_failures);
        if std::mem::take(&mut self.escalated) {
            Some(HealthEvent::Recover { failures })
        } else {
            None
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }
}

/// Snapshot for the `/health` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub uptime: Duration,
    pub consecutive_failures: u32,
    pub escalated: bool,
    pub tracked: usize,
    pub in_stock: usize,
    pub live_alerts: usize,
}

impl HealthReport {
    pub fn to_message(&self) -> String {
        let secs = self.uptime.as_secs();
        let status = if self.escalated {
            "🔴 degraded"
        } else if self.consecutive_failures > 0 {
            "🟡 recent failures"
        } else {
            "🟢 healthy"
        };

        format!(
            "<b>Watcher health</b>\n\
             Status: {}\n\
             Uptime: {}h {}m\n\
             Consecutive failed cycles: {}\n\
             Tracked items: {} ({} in stock)\n\
             Live restock alerts: {}",
            status,
            secs / 3600,
            (secs % 3600) / 60,
            self.consecutive_failures,
            self.tracked,
            self.in_stock,
            self.live_alerts,
        )
    }
}
