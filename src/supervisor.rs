//! Local launcher: Redis (when not already running), the Dapr sidecar with the
//! subscription app, then the web front end. Children are terminated in
//! reverse start order when the front end exits or Ctrl-C is received.

use crate::config::dapr_components::{self, CONFIGURATION_FILE};
use crate::config::toml_config::AppConfig;
use crate::utils::error::{ChatError, Result};
use crate::utils::validation::Validate;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use sysinfo::System;
use tokio::process::{Child, Command};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    /// 啟動後等待的時間
    pub delay_after: Option<Duration>,
    /// 前景程序結束時整個 launcher 隨之結束
    pub foreground: bool,
}

pub fn is_process_running(name: &str) -> bool {
    let system = System::new_all();
    let running = system.processes_by_name(OsStr::new(name)).next().is_some();
    running
}

fn redis_port(redis_host: &str) -> &str {
    redis_host
        .rsplit_once(':')
        .map(|(_, port)| port)
        .filter(|port| !port.is_empty())
        .unwrap_or("6379")
}

/// 依序列出要啟動的程序；快取伺服器已在執行時略過
pub fn launch_plan(config: &AppConfig, exe: &str, cache_running: bool) -> Vec<ProcessSpec> {
    let mut plan = Vec::new();
    let ports = &config.ports;

    if !cache_running {
        plan.push(ProcessSpec {
            name: "redis".to_string(),
            program: config.dapr.redis_command.clone(),
            args: vec![
                "--port".to_string(),
                redis_port(&config.dapr.redis_host).to_string(),
            ],
            delay_after: None,
            foreground: false,
        });
    }

    let components_dir = config.dapr.components_dir.clone();
    let config_file = Path::new(&components_dir)
        .join(CONFIGURATION_FILE)
        .to_string_lossy()
        .to_string();

    plan.push(ProcessSpec {
        name: "dapr".to_string(),
        program: config.dapr.sidecar_command.clone(),
        args: vec![
            "run".to_string(),
            "--app-id".to_string(),
            config.app.app_id.clone(),
            "--app-port".to_string(),
            ports.app.to_string(),
            "--dapr-http-port".to_string(),
            ports.dapr_http.to_string(),
            "--dapr-grpc-port".to_string(),
            ports.dapr_grpc.to_string(),
            "--resources-path".to_string(),
            components_dir,
            "--config".to_string(),
            config_file,
            "--".to_string(),
            exe.to_string(),
            "serve".to_string(),
            "--port".to_string(),
            ports.app.to_string(),
        ],
        delay_after: Some(Duration::from_secs(config.orchestration.startup_delay_secs)),
        foreground: false,
    });

    plan.push(ProcessSpec {
        name: "web".to_string(),
        program: exe.to_string(),
        args: vec![
            "web".to_string(),
            "--port".to_string(),
            ports.frontend.to_string(),
        ],
        delay_after: None,
        foreground: true,
    });

    plan
}

/// 送出 SIGTERM 後等待子程序自行結束的時間
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

struct ManagedChild {
    name: String,
    child: Child,
    pid: Option<u32>,
}

pub struct Supervisor {
    children: Vec<ManagedChild>,
    stop_timeout: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            stop_timeout: STOP_TIMEOUT,
        }
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    fn spawn(&mut self, spec: &ProcessSpec) -> Result<()> {
        tracing::info!("▶️ Starting {}: {} {}", spec.name, spec.program, spec.args.join(" "));

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);
        // 每個子程序自成一個 process group，停止時連同它啟動的程序一起送訊號
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| ChatError::ProcessError {
            name: spec.name.clone(),
            message: e.to_string(),
        })?;

        let pid = child.id();
        self.children.push(ManagedChild {
            name: spec.name.clone(),
            child,
            pid,
        });
        Ok(())
    }

    /// 啟動整個計畫並等待前景程序或 Ctrl-C
    pub async fn run(&mut self, plan: &[ProcessSpec]) -> Result<()> {
        let mut foreground = None;

        for spec in plan {
            if let Err(e) = self.spawn(spec) {
                self.shutdown().await;
                return Err(e);
            }
            if spec.foreground {
                foreground = Some(self.children.len() - 1);
            }
            if let Some(delay) = spec.delay_after {
                tracing::info!("⏳ Waiting {:?} for {} to start", delay, spec.name);
                tokio::time::sleep(delay).await;
            }
        }

        match foreground {
            Some(index) => {
                let managed = &mut self.children[index];
                tokio::select! {
                    status = managed.child.wait() => {
                        tracing::info!("{} exited: {:?}", managed.name, status);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("🛑 Ctrl-C received");
                    }
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// 反向終止所有子程序：先 SIGTERM 整個 group，逾時才 SIGKILL
    pub async fn shutdown(&mut self) {
        while let Some(mut managed) = self.children.pop() {
            self.stop(&mut managed).await;
        }
    }

    async fn stop(&self, managed: &mut ManagedChild) {
        if !matches!(managed.child.try_wait(), Ok(Some(_))) {
            tracing::info!("⏹️ Stopping {}", managed.name);
        }

        // 主程序已結束時 group 內仍可能留有它啟動的程序
        #[cfg(unix)]
        if signal_group(managed, nix::sys::signal::Signal::SIGTERM) {
            match tokio::time::timeout(self.stop_timeout, managed.child.wait()).await {
                Ok(Ok(status)) => tracing::debug!("{} exited: {}", managed.name, status),
                Ok(Err(e)) => tracing::warn!("⚠️ Failed to wait for {}: {}", managed.name, e),
                Err(_) => {
                    tracing::warn!(
                        "⚠️ {} did not stop within {:?}, killing",
                        managed.name,
                        self.stop_timeout
                    );
                    signal_group(managed, nix::sys::signal::Signal::SIGKILL);
                }
            }
        }

        if let Ok(None) = managed.child.try_wait() {
            if let Err(e) = managed.child.kill().await {
                tracing::warn!("⚠️ Failed to stop {}: {}", managed.name, e);
            }
        }
    }
}

/// 對子程序的 process group 送訊號；group 已不存在時回傳 false
#[cfg(unix)]
fn signal_group(managed: &ManagedChild, signal: nix::sys::signal::Signal) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pid) = managed.pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return false;
    };

    match killpg(Pid::from_raw(pid), signal) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            tracing::warn!("⚠️ Failed to send {} to {}: {}", signal, managed.name, e);
            false
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn launch(config: &AppConfig) -> Result<()> {
    config.validate()?;

    let written = dapr_components::write_components(config, Path::new(&config.dapr.components_dir))?;
    tracing::info!(
        "📝 Wrote {} Dapr resources to {}",
        written.len(),
        config.dapr.components_dir
    );

    let exe = std::env::current_exe()?;
    let cache_running = is_process_running(&config.dapr.redis_command);
    if cache_running {
        tracing::info!("Redis already running, skipping start");
    }

    let plan = launch_plan(config, &exe.to_string_lossy(), cache_running);
    Supervisor::new().run(&plan).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_starts_cache_sidecar_then_frontend() {
        let config = AppConfig::default();
        let plan = launch_plan(&config, "/usr/bin/multi-agent-chat", false);

        let names: Vec<&str> = plan.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["redis", "dapr", "web"]);

        assert_eq!(plan[0].args, vec!["--port", "6379"]);

        let dapr = &plan[1];
        let args = dapr.args.join(" ");
        assert!(args.starts_with("run --app-id multi-agent-chat --app-port 6001"));
        assert!(args.contains("--dapr-http-port 3500"));
        assert!(args.contains("--dapr-grpc-port 50001"));
        assert!(args.ends_with("-- /usr/bin/multi-agent-chat serve --port 6001"));
        assert_eq!(dapr.delay_after, Some(Duration::from_secs(5)));

        assert!(plan[2].foreground);
        assert_eq!(plan[2].args, vec!["web", "--port", "8501"]);
    }

    #[test]
    fn test_plan_skips_running_cache() {
        let config = AppConfig::default();
        let plan = launch_plan(&config, "mac", true);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].name, "dapr");
    }

    #[test]
    fn test_redis_port_parsing() {
        assert_eq!(redis_port("localhost:6380"), "6380");
        assert_eq!(redis_port("localhost"), "6379");
        assert_eq!(redis_port("localhost:"), "6379");
    }

    #[cfg(unix)]
    fn is_alive(pid: u32) -> bool {
        let system = System::new_all();
        system
            .process(sysinfo::Pid::from_u32(pid))
            .map(|p| p.status() != sysinfo::ProcessStatus::Zombie)
            .unwrap_or(false)
    }

    #[cfg(unix)]
    async fn wait_until_gone(pid: u32) -> bool {
        for _ in 0..50 {
            if !is_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[cfg(unix)]
    fn background(name: &str, script: String) -> ProcessSpec {
        ProcessSpec {
            name: name.to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script],
            delay_after: Some(Duration::from_millis(500)),
            foreground: false,
        }
    }

    #[cfg(unix)]
    fn finished_frontend() -> ProcessSpec {
        ProcessSpec {
            name: "web".to_string(),
            program: "true".to_string(),
            args: vec![],
            delay_after: None,
            foreground: true,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_stops_processes_started_by_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("daprd.pid");
        // 模擬 dapr run：啟動 daprd 後等待，收到 SIGTERM 才清理
        let script = format!(
            "sleep 300 & echo $! > {}; trap 'kill $!; exit 0' TERM INT; wait",
            pid_file.display()
        );

        let plan = vec![background("dapr", script), finished_frontend()];
        Supervisor::new().run(&plan).await.unwrap();

        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(wait_until_gone(pid).await, "pid {} still running", pid);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_kills_group_ignoring_sigterm() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("stubborn.pid");
        let script = format!(
            "trap '' TERM; sleep 300 & echo $! > {}; wait",
            pid_file.display()
        );

        let plan = vec![background("stubborn", script), finished_frontend()];
        let mut supervisor = Supervisor::new().with_stop_timeout(Duration::from_millis(300));
        tokio::time::timeout(Duration::from_secs(10), supervisor.run(&plan))
            .await
            .expect("shutdown should fall back to SIGKILL")
            .unwrap();

        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(wait_until_gone(pid).await, "pid {} still running", pid);
    }

    #[tokio::test]
    async fn test_missing_program_reports_process_error() {
        let plan = vec![ProcessSpec {
            name: "ghost".to_string(),
            program: "definitely-not-a-real-binary-xyz".to_string(),
            args: vec![],
            delay_after: None,
            foreground: true,
        }];

        let err = Supervisor::new().run(&plan).await.unwrap_err();
        assert!(matches!(err, ChatError::ProcessError { .. }));
    }
}
