//! Common test utilities for registration agent integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use registration_agent::{
    AgentConfig, DiscoveryDescriptor, Error, PluginIdentity, RegistrationController,
    RegistrationRequest, RegistrationStatus, RegistryClient, Result, SmolSpawner,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Test timeout for async operations
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Authorization credential used by test configs
pub const TEST_AUTH: &str = "Bearer test-token";

/// A call observed by [`ScriptedRegistry`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// `register`
    Register { realm: String, callback: String, auth: String },
    /// `update`
    Update { plugin_id: String, auth: String, nodes: Vec<DiscoveryDescriptor> },
    /// `deregister`
    Deregister { plugin_id: String, auth: String },
}

/// Registry double whose failures are scripted up front
#[derive(Default)]
pub struct ScriptedRegistry {
    register_failures: AtomicUsize,
    update_failures: AtomicUsize,
    deregister_fails: AtomicBool,
    issued: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRegistry {
    /// A registry that accepts everything
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `n` registrations with a transport error
    pub fn failing_registrations(n: usize) -> Arc<Self> {
        let registry = Self::default();
        registry.register_failures.store(n, Ordering::SeqCst);
        Arc::new(registry)
    }

    /// Fail the next `n` publications with a server error
    pub fn failing_updates(n: usize) -> Arc<Self> {
        let registry = Self::default();
        registry.update_failures.store(n, Ordering::SeqCst);
        Arc::new(registry)
    }

    /// Make every deregistration fail from now on
    pub fn fail_deregistrations(&self) {
        self.deregister_fails.store(true, Ordering::SeqCst);
    }

    /// Everything observed so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `register` calls
    pub fn register_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Register { .. }))
    }

    /// Number of `update` calls
    pub fn update_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Update { .. }))
    }

    /// Number of `deregister` calls
    pub fn deregister_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Deregister { .. }))
    }

    /// Realms used by `register` calls, in order
    pub fn realms(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Register { realm, .. } => Some(realm),
                _ => None,
            })
            .collect()
    }

    /// Plugin ids passed to `deregister`, in order
    pub fn deregistered(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Deregister { plugin_id, .. } => Some(plugin_id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn register(&self, request: &RegistrationRequest, auth: &str) -> Result<PluginIdentity> {
        self.record(Call::Register {
            realm: request.realm.clone(),
            callback: request.callback.clone(),
            auth: auth.to_string(),
        });
        if Self::take_failure(&self.register_failures) {
            return Err(Error::Transport("connection refused".to_string()));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PluginIdentity::new(format!("plugin-{}", n)))
    }

    async fn update(
        &self,
        plugin_id: &str,
        auth: &str,
        nodes: &HashSet<DiscoveryDescriptor>,
    ) -> Result<()> {
        self.record(Call::Update {
            plugin_id: plugin_id.to_string(),
            auth: auth.to_string(),
            nodes: nodes.iter().cloned().collect(),
        });
        if Self::take_failure(&self.update_failures) {
            return Err(Error::Protocol {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }

    async fn deregister(&self, plugin_id: &str, auth: &str) -> Result<()> {
        self.record(Call::Deregister {
            plugin_id: plugin_id.to_string(),
            auth: auth.to_string(),
        });
        if self.deregister_fails.load(Ordering::SeqCst) {
            return Err(Error::Transport("registry unreachable".to_string()));
        }
        Ok(())
    }
}

/// Config for controller tests; no port override so the connect URL is stable
pub fn test_config(retry_interval: Duration) -> AgentConfig {
    AgentConfig::builder()
        .with_app_name("inventory")
        .with_http_port(8181)
        .with_management("app.internal", 9091)
        .with_port_override_env(None)
        .with_registry_url("http://registry.test:8181")
        .with_authorization(TEST_AUTH)
        .with_callback_host("agent.internal")
        .with_retry_interval(retry_interval)
        .build()
        .expect("valid test config")
}

/// Controller wired to `registry` on the smol executor
pub fn controller(
    registry: &Arc<ScriptedRegistry>,
    retry_interval: Duration,
) -> RegistrationController {
    RegistrationController::new(
        test_config(retry_interval),
        registry.clone(),
        Arc::new(SmolSpawner),
    )
}

/// Poll the controller until `pred` holds, returning the matching status
pub async fn wait_for_status<F>(controller: &RegistrationController, pred: F) -> RegistrationStatus
where
    F: Fn(&RegistrationStatus) -> bool,
{
    let deadline = Instant::now() + TEST_TIMEOUT;
    loop {
        let status = controller.status().await;
        if pred(&status) {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for controller, last status: {:?}",
            status
        );
        smol::Timer::after(Duration::from_millis(5)).await;
    }
}
