use std::sync::Arc;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::domain::errors::TransportError;
use crate::domain::ports::NotificationTransport;
use crate::infrastructure::transport::HttpTransport;
use crate::services::{
    FeedStore, FeedSynchronizer, MutatorOptions, ReadStateMutator, SyncHandle, SyncOptions,
};
use crate::web::{BellWidget, Messages};

/// A widget wired to a running synchronizer
pub struct MountedWidget {
    pub widget: BellWidget,
    sync: SyncHandle,
}

impl MountedWidget {
    pub fn is_syncing(&self) -> bool {
        !self.sync.is_finished()
    }

    /// Release the push channel. Mutations still in flight complete as no-ops.
    pub async fn unmount(self) {
        self.sync.shutdown().await;
        tracing::info!("Notification widget unmounted");
    }
}

/// Build the store, synchronizer, mutator and widget for one user and
/// start the initial fetch in the background.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime. Hosts that mount from a
/// non-runtime thread use [`mount_on`].
pub fn mount(config: &Config, transport: Arc<dyn NotificationTransport>) -> MountedWidget {
    mount_on(&Handle::current(), config, transport)
}

/// [`mount`] with the synchronizer spawned onto `runtime`
pub fn mount_on(runtime: &Handle, config: &Config, transport: Arc<dyn NotificationTransport>) -> MountedWidget {
    let store = FeedStore::new();

    let synchronizer = FeedSynchronizer::new(
        store.clone(),
        Arc::clone(&transport),
        SyncOptions {
            user_id: config.user_id.clone(),
            locale: config.locale.clone(),
            unknown_events: config.unknown_events,
        },
    );

    let mutator = ReadStateMutator::new(
        store.clone(),
        transport,
        MutatorOptions {
            locale: config.locale.clone(),
            mode: config.mutation_mode,
            reconcile: config.mark_all_reconcile,
        },
    );

    let widget = BellWidget::new(
        store,
        mutator,
        config.locale.clone(),
        Messages::with_overrides(&config.messages),
        config.styles.clone(),
    );

    let sync = synchronizer.spawn_on(runtime);
    tracing::info!(
        "Notification widget mounted for user {} (locale {})",
        config.user_id,
        config.locale
    );

    MountedWidget { widget, sync }
}

/// [`mount`] against the HTTP notification service named in the config.
/// Same runtime requirement as [`mount`].
pub fn mount_http(config: &Config) -> Result<MountedWidget, TransportError> {
    let transport = HttpTransport::new(&config.endpoint, &config.access_key, config.request_timeout())?;
    Ok(mount(config, Arc::new(transport)))
}
