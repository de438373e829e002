use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
struct StageTime {
    n: usize,
    total: Duration,
    last: Duration,
}

/// Profiling sink collecting per-stage durations across calls.
///
/// Attached to a detector with [`crate::Detector::enable_profile`]; the
/// detector only ever writes to it.
#[derive(Debug, Default, Clone)]
pub struct TimeStamp {
    stages: BTreeMap<String, StageTime>,
}

impl TimeStamp {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record(&mut self, stage: &str, x: Duration) {
        let entry = self.stages.entry(stage.to_string()).or_default();
        entry.n += 1;
        entry.total += x;
        entry.last = x;
    }

    pub fn count(&self, stage: &str) -> usize {
        self.stages.get(stage).map_or(0, |s| s.n)
    }

    pub fn total(&self, stage: &str) -> Duration {
        self.stages.get(stage).map_or(Duration::ZERO, |s| s.total)
    }

    pub fn last(&self, stage: &str) -> Duration {
        self.stages.get(stage).map_or(Duration::ZERO, |s| s.last)
    }

    pub fn avg(&self, stage: &str) -> Duration {
        match self.stages.get(stage) {
            Some(s) if s.n > 0 => s.total / s.n as u32,
            _ => Duration::ZERO,
        }
    }

    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.stages.clear();
    }

    /// One line per stage: `name: n calls, total, avg`.
    pub fn summary(&self) -> String {
        self.stages
            .iter()
            .map(|(name, s)| {
                format!("{name}: {} calls | total {:.2?} | avg {:.2?}", s.n, s.total, self.avg(name))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
