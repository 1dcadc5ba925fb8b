use std::path::PathBuf;

/// Configuration for process-based job execution.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Working directory for spawned processes. `None` inherits the
    /// orchestrator's working directory.
    pub working_dir: Option<PathBuf>,
    /// Maximum bytes of stdout/stderr retained per job. Output beyond the
    /// cap is truncated, not buffered.
    pub output_limit_bytes: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            output_limit_bytes: 1024 * 1024,
        }
    }
}

/// Configuration for one fleet instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Host name of this instance, recorded on every job it executes and
    /// used as the load-balancer fallback.
    pub host_name: String,
    /// Host names of all fleet members considered for placement. Supplied by
    /// an external discovery mechanism; empty means this instance runs alone.
    pub fleet_hosts: Vec<String>,
    /// Running-job count at which this instance starts consulting the
    /// balancer for an idle peer instead of placing locally.
    pub max_running_jobs: u64,
    /// Default poll interval for `wait_for_completion` when the caller
    /// passes zero.
    pub default_poll_interval_ms: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            host_name: "localhost".to_string(),
            fleet_hosts: Vec::new(),
            max_running_jobs: 30,
            default_poll_interval_ms: 1000,
        }
    }
}

impl InstanceConfig {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            ..Default::default()
        }
    }

    pub fn with_fleet_host(mut self, host: impl Into<String>) -> Self {
        self.fleet_hosts.push(host.into());
        self
    }

    pub fn with_max_running_jobs(mut self, max: u64) -> Self {
        self.max_running_jobs = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_config_default() {
        let cfg = ExecConfig::default();
        assert!(cfg.working_dir.is_none());
        assert_eq!(cfg.output_limit_bytes, 1024 * 1024);
    }

    #[test]
    fn instance_config_default() {
        let cfg = InstanceConfig::default();
        assert_eq!(cfg.host_name, "localhost");
        assert!(cfg.fleet_hosts.is_empty());
        assert_eq!(cfg.max_running_jobs, 30);
        assert_eq!(cfg.default_poll_interval_ms, 1000);
    }

    #[test]
    fn instance_config_builders() {
        let cfg = InstanceConfig::new("host-a")
            .with_fleet_host("host-b")
            .with_fleet_host("host-c")
            .with_max_running_jobs(5);
        assert_eq!(cfg.host_name, "host-a");
        assert_eq!(cfg.fleet_hosts, vec!["host-b", "host-c"]);
        assert_eq!(cfg.max_running_jobs, 5);
    }
}
