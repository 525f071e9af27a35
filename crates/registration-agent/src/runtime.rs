//! Runtime-agnostic task spawning and the recurring retry timer
//!
//! The controller never names an executor. It receives a [`Spawner`] and
//! drives its timers with `async-io`, which works under any runtime. Enable
//! the `smol` or `tokio` feature for a ready-made spawner.

use futures::future::{AbortHandle, Abortable};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future accepted by a [`Spawner`]
pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A spawner that can run futures in the background on an async runtime
pub trait Spawner: Send + Sync {
    /// Spawn a future and let it run to completion
    fn spawn(&self, future: BoxedTask);
}

/// Spawner for the Smol runtime
#[cfg(feature = "smol")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolSpawner;

#[cfg(feature = "smol")]
impl Spawner for SmolSpawner {
    fn spawn(&self, future: BoxedTask) {
        smol::spawn(future).detach();
    }
}

/// Spawner for the Tokio runtime
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[cfg(feature = "tokio")]
impl Spawner for TokioSpawner {
    fn spawn(&self, future: BoxedTask) {
        // JoinHandle detaches when dropped
        tokio::spawn(future);
    }
}

/// Sleep for `duration` on whichever runtime is polling
pub async fn sleep(duration: Duration) {
    async_io::Timer::after(duration).await;
}

/// Handle to a recurring task that fires every `period`
///
/// The next sleep only starts once the previous tick has completed, so ticks
/// never overlap. Cancelling is idempotent and safe from inside a tick: the
/// running tick finishes, then the loop exits without firing again. Dropping
/// the handle cancels the timer.
#[derive(Debug)]
pub struct RetryTimer {
    abort: AbortHandle,
    period: Duration,
}

impl RetryTimer {
    /// Arm a timer on `spawner` that runs `tick` after every `period`
    pub fn arm<S, F, Fut>(spawner: &S, period: Duration, mut tick: F) -> Self
    where
        S: Spawner + ?Sized,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();
        let ticker: BoxedTask = Box::pin(async move {
            loop {
                sleep(period).await;
                tick().await;
            }
        });

        spawner.spawn(Box::pin(async move {
            // Err(Aborted) is the normal way out
            let _ = Abortable::new(ticker, registration).await;
        }));

        Self { abort, period }
    }

    /// Stop the timer; further calls are no-ops
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Period between ticks
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.abort.abort();
    }
}
