//! The one place the core's components are constructed and wired together.

use crate::activation::{ActivationHandle, ActivationPolicy};
use crate::api_client::AskClient;
use crate::auth::AuthWatch;
use crate::config::RealtimeConfig;
use crate::connection::ConnectionManager;
use crate::error::CoreError;
use crate::notifications::{Notification, NotificationFeed, NotificationStore, Presentation};
use crate::pipeline::PipelineDriver;
use crate::registry::{EventRegistry, Subscription};

use log::info;

/// Owns one instance of every core component.
///
/// Built by [`start`](Self::start); torn down by [`shutdown`](Self::shutdown).
/// Components are handed out by reference; the connection, store and driver are
/// cheap to clone when a caller needs to keep one.
pub struct RealtimeCore {
    config: RealtimeConfig,
    registry: EventRegistry,
    connection: ConnectionManager,
    notifications: NotificationStore,
    feed: NotificationFeed,
    pipeline: PipelineDriver,
    pipeline_subscription: Subscription,
    activation: ActivationHandle,
    ask_client: AskClient,
}

impl RealtimeCore {
    /// Validate `config`, wire every component and start following `auth`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Config`] if `config` is invalid
    /// - [`CoreError::ApiClient`] if the HTTP client cannot be built
    pub fn start(config: RealtimeConfig, auth: AuthWatch) -> Result<Self, CoreError> {
        Self::start_with(config, auth, |_, _| {})
    }

    /// Like [`start`](Self::start), calling `presenter` for every stored notification.
    pub fn start_with<P>(
        config: RealtimeConfig,
        auth: AuthWatch,
        presenter: P,
    ) -> Result<Self, CoreError>
    where
        P: Fn(&Notification, Presentation) + Send + Sync + 'static,
    {
        config.validate()?;

        let ask_client = AskClient::new(&config.api.base_url, auth.clone())?;

        let registry = EventRegistry::new();
        let connection =
            ConnectionManager::new(config.connection.clone(), registry.clone(), auth.clone());

        let notifications = NotificationStore::new(config.notifications.capacity);
        let feed = NotificationFeed::attach_with(&registry, &notifications, presenter);

        let pipeline = PipelineDriver::new(config.pipeline.clone(), Some(connection.clone()));
        let pipeline_subscription = pipeline.attach(&registry);

        let activation = ActivationPolicy::spawn(connection.clone(), auth);

        info!("Realtime core started for {}", config.connection.endpoint);

        Ok(Self {
            config,
            registry,
            connection,
            notifications,
            feed,
            pipeline,
            pipeline_subscription,
            activation,
            ask_client,
        })
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    pub fn pipeline(&self) -> &PipelineDriver {
        &self.pipeline
    }

    pub fn ask_client(&self) -> &AskClient {
        &self.ask_client
    }

    /// Stop following authentication, detach listeners and close the connection.
    pub fn shutdown(self) {
        self.activation.stop();
        self.feed.detach();
        self.pipeline_subscription.unsubscribe();
        self.connection.disconnect();
        info!("Realtime core stopped");
    }
}
