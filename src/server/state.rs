//! Application state container
//!
//! This module defines the shared application state that is passed
//! to all request handlers via Axum's state extraction.

use crate::config::Settings;
use crate::db::{ConfigStore, FileConfigStore, InMemoryConfigStore, TimedConfigStore};
use crate::services::{
    Dispatcher, HttpLogLinkIssuer, HttpUptimeRegistrar, ProvisioningPlatform, Provisioner,
    RenderPlatform,
};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
///
/// Cheap to clone; every field is behind an `Arc` or `Copy`.
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Configuration store holding the credential pool and defaults
    pub store: Arc<dyn ConfigStore>,

    pub dispatcher: Arc<Dispatcher>,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Build the state from settings, wiring the real platform client
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let platform = RenderPlatform::new(settings.platform.clone(), settings.timeouts.clone())
            .context("Failed to build platform HTTP client")?;

        Self::with_platform(settings, Arc::new(platform))
    }

    /// Build the state around an already constructed platform client
    pub fn with_platform(
        settings: Settings,
        platform: Arc<dyn ProvisioningPlatform>,
    ) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);
        let start_time = Instant::now();

        let store = create_store(&settings);

        let mut provisioner = Provisioner::new(
            platform,
            settings.platform.clone(),
            settings.dispatch.filter_empty_env,
        );

        if let Some(url) = &settings.side_registration.uptime_url {
            tracing::debug!(endpoint = %url, "Uptime registration enabled");
            let registrar = HttpUptimeRegistrar::new(url.clone(), &settings.timeouts)
                .context("Failed to build uptime registrar client")?;
            provisioner = provisioner.with_uptime_registrar(Arc::new(registrar));
        }

        if let Some(url) = &settings.side_registration.log_link_url {
            tracing::debug!(endpoint = %url, "Log link issuing enabled");
            let issuer = HttpLogLinkIssuer::new(url.clone(), &settings.timeouts)
                .context("Failed to build log link issuer client")?;
            provisioner = provisioner.with_log_link_issuer(Arc::new(issuer));
        }

        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            provisioner,
            settings.dispatch.clone(),
            settings.store.default_repository.clone(),
        ));

        tracing::info!(
            mode = %settings.dispatch.mode,
            capacity_ceiling = settings.dispatch.capacity_ceiling,
            "Application state initialized successfully"
        );

        Ok(Self {
            settings,
            store,
            dispatcher,
            start_time,
        })
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Whether the configuration store answers within its deadline
    pub async fn check_store_health(&self) -> bool {
        match self.store.load().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Store health check failed");
                false
            }
        }
    }
}

/// File store when a path is configured, otherwise an in-memory store seeded
/// from the environment. Either way every call runs under the store timeout.
fn create_store(settings: &Settings) -> Arc<dyn ConfigStore> {
    let inner: Arc<dyn ConfigStore> = match &settings.store.path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using file-backed configuration store");
            Arc::new(FileConfigStore::new(path.clone()))
        }
        None => {
            let seed = settings.store.seed_credentials.clone().unwrap_or_default();
            tracing::info!(
                seeded = !seed.is_empty(),
                "Using in-memory configuration store"
            );
            Arc::new(InMemoryConfigStore::seeded(seed, ""))
        }
    };

    Arc::new(TimedConfigStore::new(inner, settings.timeouts.store))
}
