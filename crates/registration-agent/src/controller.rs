//! Registration controller
//!
//! Owns this process's registration with the discovery registry. The
//! controller keeps a single state cell behind an async mutex; the immediate
//! attempt, every retry tick and [`RegistrationController::stop`] all take
//! that lock for their whole read-modify-write, so attempts never overlap and
//! shutdown never races an attempt.
//!
//! While running, the state always satisfies: an identity is held if and
//! only if the retry timer is not armed.

use crate::{
    client::{RegistryClient, RegistryOperation},
    config::AgentConfig,
    error::{Error, Result},
    models::*,
    runtime::{RetryTimer, Spawner},
};
use futures::lock::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Created, `start()` not yet called
    #[default]
    Idle,
    /// Started; registering or registered
    Running,
    /// Stopped; terminal for the process
    Stopped,
}

/// Result of a single registration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Registered and published under the given plugin id
    Registered(String),
    /// An identity was already held, nothing to do
    AlreadyRegistered,
    /// Registration or publication failed; the retry timer stays armed
    Failed,
    /// The controller has been stopped
    Stopped,
}

/// Point-in-time view of the controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationStatus {
    /// Lifecycle phase
    pub lifecycle: Lifecycle,
    /// Id of the held plugin identity, if registered
    pub plugin_id: Option<String>,
    /// Whether the recurring retry timer is armed
    pub retry_armed: bool,
    /// Number of registration attempts made so far
    pub attempts: u64,
}

impl RegistrationStatus {
    /// Whether an identity is currently held
    pub fn is_registered(&self) -> bool {
        self.plugin_id.is_some()
    }

    /// Whether the identity/timer invariant holds for this snapshot
    pub fn invariant_holds(&self) -> bool {
        match self.lifecycle {
            Lifecycle::Running => self.plugin_id.is_some() != self.retry_armed,
            Lifecycle::Idle => !self.retry_armed,
            Lifecycle::Stopped => !self.retry_armed && self.plugin_id.is_none(),
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    plugin: Option<PluginIdentity>,
    retry: Option<RetryTimer>,
    lifecycle: Lifecycle,
}

impl ControllerState {
    /// Store a published identity and disarm the retry timer
    fn commit(&mut self, plugin: PluginIdentity) -> Result<&PluginIdentity> {
        if self.plugin.is_some() {
            return Err(Error::InvariantViolation(
                "publish succeeded while an identity was already held",
            ));
        }
        self.disarm();
        let plugin: &PluginIdentity = self.plugin.insert(plugin);
        Ok(plugin)
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.retry.take() {
            timer.cancel();
        }
    }
}

struct Inner {
    config: Arc<AgentConfig>,
    client: Arc<dyn RegistryClient>,
    spawner: Arc<dyn Spawner>,
    state: Mutex<ControllerState>,
    attempts: AtomicU64,
}

/// Drives registration, retry and deregistration for this process
#[derive(Clone)]
pub struct RegistrationController {
    inner: Arc<Inner>,
}

impl RegistrationController {
    /// Create a controller; nothing happens until [`start`](Self::start)
    pub fn new(
        config: impl Into<Arc<AgentConfig>>,
        client: Arc<dyn RegistryClient>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: config.into(),
                client,
                spawner,
                state: Mutex::new(ControllerState::default()),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Configuration the controller was built with
    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Schedule an immediate attempt and arm the recurring retry
    ///
    /// Returns without waiting for the first attempt. Calling it again, or
    /// after [`stop`](Self::stop), does nothing.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        match state.lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running => {
                debug!("Registration controller already started");
                return;
            }
            Lifecycle::Stopped => {
                debug!("Registration controller stopped, ignoring start");
                return;
            }
        }
        state.lifecycle = Lifecycle::Running;

        if state.plugin.is_some() {
            // Registered by a manual attempt before start
            return;
        }

        let interval = self.inner.config.retry_interval();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        state.retry = Some(RetryTimer::arm(
            self.inner.spawner.as_ref(),
            interval,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.attempt().await;
                    }
                }
            },
        ));

        let inner = self.inner.clone();
        self.inner.spawner.spawn(Box::pin(async move {
            inner.attempt().await;
        }));

        info!(
            "Registration controller started, retrying every {:?} until registered",
            interval
        );
    }

    /// Run one registration attempt now
    ///
    /// Failures are logged and recovered here; the outcome is informational.
    pub async fn attempt_registration(&self) -> AttemptOutcome {
        self.inner.attempt().await
    }

    /// Cancel the retry timer and deregister if registered
    ///
    /// Never fails and is safe to call repeatedly.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        state.disarm();
        let previous = std::mem::replace(&mut state.lifecycle, Lifecycle::Stopped);
        self.inner.compensate(&mut state).await;
        if previous != Lifecycle::Stopped {
            info!("Registration controller stopped");
        }
    }

    /// Snapshot of the current state
    pub async fn status(&self) -> RegistrationStatus {
        let state = self.inner.state.lock().await;
        RegistrationStatus {
            lifecycle: state.lifecycle,
            plugin_id: state.plugin.as_ref().map(|p| p.id.clone()),
            retry_armed: state.retry.is_some(),
            attempts: self.inner.attempts.load(Ordering::SeqCst),
        }
    }
}

impl Inner {
    async fn attempt(&self) -> AttemptOutcome {
        let mut state = self.state.lock().await;
        if state.lifecycle == Lifecycle::Stopped {
            return AttemptOutcome::Stopped;
        }
        if let Some(plugin) = &state.plugin {
            debug!("Already registered as {}, skipping attempt", plugin.id);
            return AttemptOutcome::AlreadyRegistered;
        }

        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.register_and_publish(&mut state).await
    }

    async fn register_and_publish(&self, state: &mut ControllerState) -> AttemptOutcome {
        let config = &self.config;
        let auth = config.authorization();

        let request = RegistrationRequest::new(config.realm_prefix(), config.callback_url());
        info!(
            "Registering as {} at {}",
            request.realm,
            config.registry_url()
        );

        let plugin = match self.client.register(&request, auth).await {
            Ok(plugin) => plugin,
            Err(e) => {
                warn!(
                    "Registry {} as {} failed: {}",
                    RegistryOperation::Register,
                    request.realm,
                    e
                );
                self.compensate(state).await;
                return AttemptOutcome::Failed;
            }
        };

        let connect_url = match config.connect_url() {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    "Registry {} for {} failed: {}",
                    RegistryOperation::Publish,
                    plugin.id,
                    e
                );
                self.deregister_quietly(&plugin).await;
                self.compensate(state).await;
                return AttemptOutcome::Failed;
            }
        };

        let node = DiscoveryDescriptor::for_plugin(
            config.realm_prefix(),
            &plugin,
            connect_url,
            config.app_name(),
        );
        info!("Publishing as {}", node.target.connect_url);

        let nodes = HashSet::from([node]);
        if let Err(e) = self.client.update(&plugin.id, auth, &nodes).await {
            warn!(
                "Registry {} for {} failed: {}",
                RegistryOperation::Publish,
                plugin.id,
                e
            );
            self.deregister_quietly(&plugin).await;
            self.compensate(state).await;
            return AttemptOutcome::Failed;
        }

        match state.commit(plugin) {
            Ok(plugin) => {
                info!("Registered as {}", plugin.id);
                AttemptOutcome::Registered(plugin.id.clone())
            }
            Err(e) => {
                error!("{}", e);
                AttemptOutcome::Failed
            }
        }
    }

    /// Drop any held identity, deregistering it first
    async fn compensate(&self, state: &mut ControllerState) {
        if let Some(plugin) = state.plugin.take() {
            self.deregister_quietly(&plugin).await;
        }
    }

    /// Best-effort deregistration; failures are logged and swallowed
    async fn deregister_quietly(&self, plugin: &PluginIdentity) {
        info!("Deregistering as {}", plugin.id);
        match self
            .client
            .deregister(&plugin.id, self.config.authorization())
            .await
        {
            Ok(()) => info!("Deregistered {}", plugin.id),
            Err(e) => warn!(
                "Registry {} for {} failed, continuing: {}",
                RegistryOperation::Deregister,
                plugin.id,
                e
            ),
        }
    }
}
