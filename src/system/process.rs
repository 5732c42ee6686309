use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// One process as observed during a single scan.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub resident_memory_bytes: u64,
    /// Share of total physical memory, against the scan-wide total.
    pub memory_percent: f64,
    pub uptime: Duration,
}

impl ProcessSample {
    pub fn resident_memory_mb(&self) -> f64 {
        self.resident_memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// How the CPU and memory thresholds combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPolicy {
    /// Retained when either threshold is met.
    #[default]
    Any,
    /// Retained only when both thresholds are met.
    All,
}

impl FromStr for FilterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" | "or" => Ok(FilterPolicy::Any),
            "all" | "and" => Ok(FilterPolicy::All),
            other => Err(format!("unknown filter policy `{other}` (expected any|all)")),
        }
    }
}

impl fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPolicy::Any => f.write_str("any"),
            FilterPolicy::All => f.write_str("all"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivityFilter {
    pub min_cpu_percent: f64,
    pub min_memory_percent: f64,
    pub policy: FilterPolicy,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        ActivityFilter {
            min_cpu_percent: 1.0,
            min_memory_percent: 1.0,
            policy: FilterPolicy::Any,
        }
    }
}

impl ActivityFilter {
    pub fn retains(&self, sample: &ProcessSample) -> bool {
        let busy_cpu = sample.cpu_percent >= self.min_cpu_percent;
        let busy_memory = sample.memory_percent >= self.min_memory_percent;
        match self.policy {
            FilterPolicy::Any => busy_cpu || busy_memory,
            FilterPolicy::All => busy_cpu && busy_memory,
        }
    }
}

/// The two top-N lists produced by one scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rankings {
    pub by_cpu: Vec<ProcessSample>,
    pub by_memory: Vec<ProcessSample>,
}

impl Rankings {
    /// Rank `retained` (in encounter order) by CPU and by memory share.
    pub fn from_retained(retained: &[ProcessSample], top_n: usize) -> Self {
        Rankings {
            by_cpu: rank_top(retained, top_n, |s| s.cpu_percent),
            by_memory: rank_top(retained, top_n, |s| s.memory_percent),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_cpu.is_empty() && self.by_memory.is_empty()
    }
}

/// Up to `n` samples, descending on `key`. The sort is stable so ties keep
/// their input order.
pub fn rank_top<F>(samples: &[ProcessSample], n: usize, key: F) -> Vec<ProcessSample>
where
    F: Fn(&ProcessSample) -> f64,
{
    let mut ranked = samples.to_vec();
    ranked.sort_by(|a, b| key(b).total_cmp(&key(a)));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pid: u32, cpu: f64, mem: f64) -> ProcessSample {
        ProcessSample {
            pid,
            name: format!("proc{pid}"),
            cpu_percent: cpu,
            resident_memory_bytes: 1024 * 1024,
            memory_percent: mem,
            uptime: Duration::from_secs(60),
        }
    }

    #[test]
    fn any_policy_needs_one_threshold() {
        let filter = ActivityFilter::default();
        assert!(filter.retains(&sample(1, 1.0, 0.0)));
        assert!(filter.retains(&sample(2, 0.0, 1.0)));
        assert!(!filter.retains(&sample(3, 0.99, 0.99)));
    }

    #[test]
    fn all_policy_needs_both_thresholds() {
        let filter = ActivityFilter {
            policy: FilterPolicy::All,
            ..ActivityFilter::default()
        };
        assert!(!filter.retains(&sample(1, 50.0, 0.5)));
        assert!(filter.retains(&sample(2, 1.0, 1.0)));
    }

    #[test]
    fn short_lists_are_not_padded() {
        let retained = vec![sample(1, 3.0, 2.0), sample(2, 7.0, 1.0)];
        let rankings = Rankings::from_retained(&retained, 5);
        assert_eq!(rankings.by_cpu.len(), 2);
        assert_eq!(rankings.by_cpu[0].pid, 2);
        assert_eq!(rankings.by_memory[0].pid, 1);
    }

    #[test]
    fn ties_keep_encounter_order() {
        let retained = vec![
            sample(30, 5.0, 1.0),
            sample(10, 9.0, 1.0),
            sample(20, 5.0, 1.0),
        ];
        let ranked = rank_top(&retained, 5, |s| s.cpu_percent);
        let pids: Vec<u32> = ranked.iter().map(|s| s.pid).collect();
        assert_eq!(pids, vec![10, 30, 20]);
    }

    #[test]
    fn policy_parses_from_cli_words() {
        assert_eq!("ANY".parse::<FilterPolicy>().unwrap(), FilterPolicy::Any);
        assert_eq!("and".parse::<FilterPolicy>().unwrap(), FilterPolicy::All);
        assert!("most".parse::<FilterPolicy>().is_err());
    }

    #[test]
    fn resident_memory_in_mebibytes() {
        let mut s = sample(1, 0.0, 0.0);
        s.resident_memory_bytes = 3 * 1024 * 1024 / 2;
        assert!((s.resident_memory_mb() - 1.5).abs() < f64::EPSILON);
    }
}
