//! Per command-type execution timings.

use std::collections::BTreeMap;
use std::time::Duration;

use scenebridge_protocol::CommandName;
use serde::Serialize;

/// Aggregate timings for one command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStats {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl CommandStats {
    fn first(elapsed: Duration) -> Self {
        Self {
            count: 1,
            total: elapsed,
            min: elapsed,
            max: elapsed,
        }
    }

    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total = self.total.saturating_add(elapsed);
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    /// Number of executions.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of execution times.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Fastest execution.
    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Slowest execution.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Mean execution time.
    #[must_use]
    pub fn average(&self) -> Duration {
        u32::try_from(self.count)
            .ok()
            .filter(|count| *count > 0)
            .map_or(Duration::ZERO, |count| self.total / count)
    }

    /// Summary in milliseconds.
    #[must_use]
    pub fn report(&self) -> StatsReport {
        StatsReport {
            count: self.count,
            total_time_ms: millis(self.total),
            min_time_ms: millis(self.min),
            max_time_ms: millis(self.max),
            average_time_ms: millis(self.average()),
        }
    }
}

/// Serialisable form of [`CommandStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Number of executions.
    pub count: u64,
    /// Sum of execution times.
    pub total_time_ms: f64,
    /// Fastest execution.
    pub min_time_ms: f64,
    /// Slowest execution.
    pub max_time_ms: f64,
    /// Mean execution time.
    pub average_time_ms: f64,
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Timing table keyed by command name.
///
/// Lives on the host thread with the rest of the engine state; direct
/// dispatches, batch elements and async operations all record here.
#[derive(Debug, Clone, Default)]
pub struct CommandMetrics {
    commands: BTreeMap<String, CommandStats>,
}

impl CommandMetrics {
    /// Records one execution.
    pub fn record(&mut self, command_type: &str, elapsed: Duration) {
        match self.commands.get_mut(command_type) {
            Some(stats) => stats.add(elapsed),
            None => {
                self.commands
                    .insert(command_type.to_owned(), CommandStats::first(elapsed));
            }
        }
    }

    /// Timings for one command type.
    ///
    /// A name that is not recorded verbatim is matched ignoring ASCII case,
    /// with a bare action read as belonging to the default domain.
    #[must_use]
    pub fn get(&self, command_type: &str) -> Option<&CommandStats> {
        if let Some(stats) = self.commands.get(command_type) {
            return Some(stats);
        }
        let wanted = CommandName::parse(command_type).ok()?.to_string();
        self.commands
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&wanted))
            .map(|(_, stats)| stats)
    }

    /// Every command type with its timings, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CommandStats)> {
        self.commands
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
    }

    /// Total executions across all command types.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.commands.values().map(CommandStats::count).sum()
    }

    /// Forgets every timing.
    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_count_min_max_and_average() {
        let mut metrics = CommandMetrics::default();
        for millis in [1, 2, 3, 4, 5] {
            metrics.record("scene.Create", Duration::from_millis(millis));
        }
        let stats = metrics.get("scene.Create").expect("stats");
        assert_eq!(stats.count(), 5);
        assert_eq!(stats.min(), Duration::from_millis(1));
        assert_eq!(stats.max(), Duration::from_millis(5));
        assert_eq!(stats.average(), Duration::from_millis(3));
        assert_eq!(stats.total(), Duration::from_millis(15));
    }

    #[test]
    fn keeps_command_types_apart() {
        let mut metrics = CommandMetrics::default();
        metrics.record("a.One", Duration::from_millis(2));
        metrics.record("b.Two", Duration::from_millis(4));
        metrics.record("a.One", Duration::from_millis(6));

        let names: Vec<&str> = metrics.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["a.One", "b.Two"]);
        assert_eq!(metrics.total_count(), 3);

        metrics.reset();
        assert_eq!(metrics.total_count(), 0);
    }

    #[test]
    fn lookups_accept_any_spelling_of_a_name() {
        let mut metrics = CommandMetrics::default();
        metrics.record("core.ping", Duration::from_millis(1));
        for spelling in ["core.ping", "ping", "CORE.Ping", " core . ping "] {
            assert_eq!(metrics.get(spelling).map(CommandStats::count), Some(1), "{spelling}");
        }
        assert!(metrics.get("core.pong").is_none());
    }

    #[test]
    fn reports_in_milliseconds() {
        let mut metrics = CommandMetrics::default();
        metrics.record("core.ping", Duration::from_millis(10));
        let report = metrics.get("core.ping").expect("stats").report();
        assert_eq!(report.count, 1);
        assert!((report.average_time_ms - 10.0).abs() < 1e-6);
    }
}
