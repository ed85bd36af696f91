//! Network module with deferred startup lifecycle.
//!
//! `new()` creates resources, `start()` binds the TCP listener, and `serve()`
//! accepts connections. Callers learn the bound port between `start()` and
//! `serve()`, which is what tests on port 0 need.

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, operation_handler, readiness_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::Service;

/// Serves one [`Service`] over HTTP.
///
/// 1. `new()`: allocates shared state (shutdown controller)
/// 2. `start()`: binds the TCP listener to the configured address
/// 3. `serve()`: accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    service: Arc<Service>,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, service: Arc<Service>) -> Self {
        Self {
            config,
            service,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router.
    ///
    /// Routes:
    /// - `GET /health`: detailed health JSON
    /// - `GET /health/live`: liveness probe
    /// - `GET /health/ready`: readiness probe
    /// - anything else: operation dispatch via the endpoint path template
    pub fn build_router(&self) -> Router {
        let state = AppState::new(Arc::clone(&self.service), Arc::clone(&self.shutdown));
        let layers = build_http_layers(&self.config, self.service.config().max_body_bytes);

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .fallback(operation_handler)
            .layer(layers)
            .with_state(state)
    }

    /// Binds the TCP listener and returns the actual port, which differs from
    /// the configured one when that is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves or the controller's
    /// `trigger_shutdown()` is called, then drains in-flight calls for up to
    /// `drain_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();

        self.shutdown.set_ready();
        info!("Serving HTTP connections");

        let controller = Arc::clone(&self.shutdown);
        let mut signal = self.shutdown.shutdown_receiver();
        let stop = async move {
            tokio::select! {
                () = shutdown => controller.trigger_shutdown(),
                _ = signal.wait_for(|stopping| *stopping) => {}
            }
            info!("Shutdown signalled, refusing new calls");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(stop)
            .await?;

        self.shutdown.trigger_shutdown();
        if self.shutdown.wait_for_drain(self.config.drain_timeout).await {
            info!("All calls drained");
        } else {
            warn!(
                in_flight = self.shutdown.in_flight_count(),
                "Drain timeout expired with calls still in flight"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use switchboard_core::ApiDescription;

    use super::*;

    fn service() -> Arc<Service> {
        let builder = Service::builder(ApiDescription::new(["echo"], Vec::<String>::new())).unwrap();
        Arc::new(builder.build().unwrap())
    }

    fn local() -> NetworkConfig {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = NetworkModule::new(local(), service());
        assert!(module.listener.is_none());
        let _router = module.build_router();
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let module = NetworkModule::new(local(), service());
        assert!(Arc::ptr_eq(
            &module.shutdown_controller(),
            &module.shutdown_controller()
        ));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(local(), service());
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let module = NetworkModule::new(local(), service());
        assert!(module.serve(std::future::pending::<()>()).await.is_err());
    }

    #[tokio::test]
    async fn serve_stops_on_signal() {
        let mut module = NetworkModule::new(local(), service());
        module.start().await.unwrap();
        let controller = module.shutdown_controller();
        module.serve(async {}).await.unwrap();
        assert_eq!(controller.health_state(), crate::network::HealthState::Stopped);
    }

    #[tokio::test]
    async fn trigger_shutdown_stops_serving() {
        let mut module = NetworkModule::new(local(), service());
        module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let server = tokio::spawn(module.serve(std::future::pending::<()>()));

        controller.trigger_shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("serve did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(controller.health_state(), crate::network::HealthState::Stopped);
    }
}
