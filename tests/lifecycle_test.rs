//! Supervision behavior against a fake process launcher: when spawns
//! happen, when they must not, and how the lock file is treated.

use std::fs;
use std::sync::{Arc, Mutex};

use taskmesh::domain::models::config::{AgentConfig, BrokerMode};
use taskmesh::domain::ports::launcher::ProcessLauncher;
use taskmesh::domain::ports::supervision::Supervision;
use taskmesh::services::lifecycle::LifecycleSupervisor;

#[derive(Default)]
struct FakeLauncher {
    alive_pids: Vec<u32>,
    spawned: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ProcessLauncher for FakeLauncher {
    fn spawn_detached(&self, args: &[String]) -> anyhow::Result<u32> {
        self.spawned.lock().unwrap().push(args.to_vec());
        Ok(4242)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive_pids.contains(&pid)
    }
}

#[tokio::test]
async fn stale_lock_triggers_an_agent_spawn() {
    let dir = tempfile::TempDir::new().unwrap();
    let lock = dir.path().join("agent.lock");
    fs::write(&lock, "999999999").unwrap();

    let launcher = FakeLauncher::default();
    let spawned = Arc::clone(&launcher.spawned);
    let supervisor =
        LifecycleSupervisor::with_launcher(&AgentConfig::default(), Box::new(launcher))
            .with_lock_file(&lock);
    supervisor.ensure_agent_running().await.unwrap();

    assert!(!lock.exists(), "stale lock should be cleared");
    assert_eq!(
        spawned.lock().unwrap().as_slice(),
        &[vec!["agent".to_string(), "run".to_string()]]
    );
}

#[tokio::test]
async fn live_lock_skips_the_agent_spawn() {
    let dir = tempfile::TempDir::new().unwrap();
    let lock = dir.path().join("agent.lock");
    fs::write(&lock, "4242").unwrap();

    let launcher = FakeLauncher {
        alive_pids: vec![4242],
        ..FakeLauncher::default()
    };
    let spawned = Arc::clone(&launcher.spawned);
    let supervisor =
        LifecycleSupervisor::with_launcher(&AgentConfig::default(), Box::new(launcher))
            .with_lock_file(&lock);
    supervisor.ensure_agent_running().await.unwrap();

    assert!(lock.exists());
    assert!(spawned.lock().unwrap().is_empty());
}

#[tokio::test]
async fn external_broker_is_never_auto_started() {
    let launcher = FakeLauncher::default();
    let spawned = Arc::clone(&launcher.spawned);

    let config = AgentConfig {
        broker: BrokerMode::External,
        // Nothing listens on this port; external mode must still not spawn.
        broker_url: "tcp://127.0.0.1:1".to_string(),
        ..AgentConfig::default()
    };
    let supervisor = LifecycleSupervisor::with_launcher(&config, Box::new(launcher));
    supervisor.ensure_broker_running().await.unwrap();

    assert!(spawned.lock().unwrap().is_empty());
}

#[tokio::test]
async fn disabled_supervision_is_a_noop() {
    let dir = tempfile::TempDir::new().unwrap();
    let lock = dir.path().join("agent.lock");
    fs::write(&lock, "999999999").unwrap();

    let launcher = FakeLauncher::default();
    let spawned = Arc::clone(&launcher.spawned);
    let config = AgentConfig {
        enabled: false,
        ..AgentConfig::default()
    };
    let supervisor =
        LifecycleSupervisor::with_launcher(&config, Box::new(launcher)).with_lock_file(&lock);

    supervisor.ensure_broker_running().await.unwrap();
    supervisor.ensure_agent_running().await.unwrap();

    assert!(lock.exists(), "a disabled supervisor must not touch the lock");
    assert!(spawned.lock().unwrap().is_empty());
}
