use crate::error::{Result, ServerError};
use crate::handlers::AppState;
use crate::manager::Manager;
use crate::routes::create_router;
use crate::service::NotificationService;
use crate::shutdown::{ShutdownCoordinator, ShutdownHandle, ShutdownSignal, wait_for_shutdown};
use axum::Router;
use herald_config::Config;
use herald_store::MemoryStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Herald server: owns the notification service, the HTTP listener, the
/// background manager and the shutdown coordinator
pub struct HeraldServer {
    config: Config,
    service: Arc<NotificationService>,
    store: Arc<MemoryStore>,
    coordinator: ShutdownCoordinator,
}

impl HeraldServer {
    /// Validate the configuration and seed the account store from it
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(MemoryStore::new());
        store.seed(&config.auth).await.map_err(ServerError::Seed)?;

        let service = Arc::new(NotificationService::new(
            config.clone(),
            Arc::clone(&store) as Arc<dyn herald_core::AccountStore>,
        ));

        info!(
            tiers = config.auth.tiers.len(),
            users = config.auth.users.len(),
            default_access = %config.auth.default_access,
            "Server initialized"
        );

        Ok(Self {
            config,
            service,
            store,
            coordinator: ShutdownCoordinator::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &Arc<NotificationService> {
        &self.service
    }

    /// Account store, for administrative operations
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.coordinator.handle()
    }

    pub fn router(&self) -> Router {
        create_router(AppState::new(Arc::clone(&self.service)))
    }

    /// Bind the configured address, install signal handlers and serve until
    /// shutdown
    pub async fn start(self) -> Result<()> {
        let address = self.config.server.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;

        self.coordinator.listen_for_signals()?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until a shutdown signal arrives.
    ///
    /// On shutdown every subscriber is closed so streaming responses end,
    /// then open requests get `server.shutdown_timeout` to finish.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
        info!(address = %local_addr, "Herald server listening");

        let manager = Manager::new(Arc::clone(&self.service), self.config.server.manager_interval)
            .spawn(self.coordinator.subscribe());

        let server_shutdown = self.coordinator.subscribe();
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    wait_for_shutdown(server_shutdown).await;
                })
                .await
        });

        let signal = wait_for_shutdown(self.coordinator.subscribe()).await;
        info!(?signal, "Shutting down");

        let closed = self.service.shutdown().await;
        info!(closed, "Closed subscribers");

        let result = match signal {
            ShutdownSignal::Immediate => {
                server.abort();
                Ok(())
            }
            ShutdownSignal::Graceful => {
                let timeout = self.config.server.shutdown_timeout;
                match tokio::time::timeout(timeout, &mut server).await {
                    Ok(Ok(Ok(()))) => Ok(()),
                    Ok(Ok(Err(e))) => Err(ServerError::Serve(e)),
                    Ok(Err(e)) => Err(ServerError::Serve(std::io::Error::other(e))),
                    Err(_) => {
                        warn!(?timeout, "Open requests did not finish before the shutdown timeout");
                        server.abort();
                        Err(ServerError::ShutdownTimeout)
                    }
                }
            }
        };

        if let Err(e) = manager.await {
            error!(error = %e, "Manager task failed");
        }

        info!("Herald server stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_config::{TierSeed, UserSeed};
    use herald_core::AccountStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_seeds_store() {
        let mut config = Config::default();
        config.auth.tiers.push(TierSeed::default().code("pro"));
        config.auth.users.push(
            UserSeed::new("phil")
                .tier("pro")
                .tokens(vec!["tk_phil".to_string()]),
        );

        let fixture = HeraldServer::new(config).await.unwrap();
        let actual = fixture.store().authenticate_token("tk_phil").await.unwrap();

        assert_eq!(actual.username, "phil");
        assert_eq!(actual.tier.map(|tier| tier.code), Some("pro".to_string()));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.server.port = 0;

        let actual = HeraldServer::new(config).await;
        assert!(actual.is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let fixture = HeraldServer::new(Config::default()).await.unwrap();
        let handle = fixture.shutdown_handle();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let server = tokio::spawn(fixture.serve(listener));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown_graceful().unwrap();

        let actual = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(actual.is_ok());
    }
}
