//! Listener lifecycle: bind, accept, stop.

use std::{net::SocketAddr, sync::Arc};

use recache_cache::{CacheStore, DiskCacheStore};
use recache_config::{OptionsError, ProxyOptions};
use recache_proxy::Forwarder;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, instrument, warn};

use crate::{
    LifecycleError,
    observer::{ErrorObserver, ObserverSlot},
    worker::Coordinator,
};

mod accept;

use accept::{accept_loop, bind_listener};

/// URL reported while the proxy is not listening.
pub const NOT_RUNNING_URL: &str = "http://proxy-not-running";

/// State that only exists between `start()` and `stop()`.
struct RunningServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
    connections: TaskTracker,
}

/// A recording forward proxy bound to one cache directory.
///
/// Each instance owns its listener, its cache store and its error observer;
/// several instances can run side by side in one process.
pub struct CachingProxy {
    options: ProxyOptions,
    store: Arc<dyn CacheStore>,
    observer: ObserverSlot,
    running: Option<RunningServer>,
}

impl CachingProxy {
    /// Builds a proxy backed by a [`DiskCacheStore`] rooted at
    /// `options.cache_path()`. Fails if the options do not validate.
    pub fn new(options: ProxyOptions) -> Result<Self, OptionsError> {
        let report = options.ensure_valid()?;
        for warning in report.warnings() {
            warn!(target: "recache::master", "Config warning: {warning}");
        }
        let store = Arc::new(DiskCacheStore::new(options.cache_path()));
        Ok(Self::with_store(options, store))
    }

    /// Builds a proxy on top of any [`CacheStore`].
    pub fn with_store(options: ProxyOptions, store: Arc<dyn CacheStore>) -> Self {
        Self {
            options,
            store,
            observer: ObserverSlot::default(),
            running: None,
        }
    }

    pub fn with_error_observer(self, observer: impl ErrorObserver + 'static) -> Self {
        self.observer.set(Arc::new(observer));
        self
    }

    /// Replaces the error observer. Takes effect for requests that fail
    /// afterwards, including on a running proxy.
    pub fn set_error_observer(&self, observer: impl ErrorObserver + 'static) {
        self.observer.set(Arc::new(observer));
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Effective listening port, or 0 while stopped.
    pub fn port(&self) -> u16 {
        self.running.as_ref().map_or(0, |r| r.addr.port())
    }

    pub fn url(&self) -> String {
        match &self.running {
            Some(r) => format!("http://127.0.0.1:{}", r.addr.port()),
            None => NOT_RUNNING_URL.to_string(),
        }
    }

    /// Binds the listener and starts accepting. Returns once the socket is
    /// listening.
    #[instrument(skip(self), fields(
        host = %self.options.host(),
        port = self.options.port(),
        cache_path = %self.options.cache_path().display(),
    ))]
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if let Some(running) = &self.running {
            return Err(LifecycleError::AlreadyRunning(running.addr.port()));
        }

        let forwarder = Forwarder::with_ca_file(self.options.upstream_ca_file())?;
        let coordinator = Arc::new(Coordinator::with_observer_slot(
            self.store.clone(),
            forwarder,
            self.options.ttl(),
            self.observer.clone(),
        ));

        let listener = bind_listener(self.options.host(), self.options.port()).await?;
        let addr = listener.local_addr().map_err(|source| LifecycleError::Bind {
            addr: format!("{}:{}", self.options.host(), self.options.port()),
            source,
        })?;

        let shutdown = CancellationToken::new();
        let connections = TaskTracker::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            coordinator,
            shutdown.clone(),
            connections.clone(),
        ));

        info!(
            target: "recache::master",
            listen = %addr,
            ttl_ms = self.options.ttl().as_millis() as u64,
            "Proxy listening"
        );

        self.running = Some(RunningServer {
            addr,
            shutdown,
            accept_task,
            connections,
        });
        Ok(())
    }

    /// Stops accepting, lets in-flight requests finish and waits for every
    /// connection task to end. Does nothing when the proxy is not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        info!(
            target: "recache::master",
            listen = %running.addr,
            open_connections = running.connections.len(),
            "Stopping proxy"
        );

        running.shutdown.cancel();
        if let Err(e) = running.accept_task.await {
            warn!(
                target: "recache::master",
                error = ?e,
                "accept_loop task ended abnormally"
            );
        }

        running.connections.close();
        running.connections.wait().await;

        info!(target: "recache::master", listen = %running.addr, "Proxy stopped");
    }
}

impl Drop for CachingProxy {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.shutdown.cancel();
        }
    }
}
