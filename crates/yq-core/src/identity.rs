//! Profile sync with an external identity provider (the `gigya` feature).

use std::time::Duration;
use tracing::{debug, info, warn};
use yq_types::IdentityPayload;

use crate::dispatch::{Dispatcher, Task};
use crate::host::Host;

/// What a sync attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAttempt {
    /// Profile lookup started.
    Started,
    /// Provider not ready; another attempt is scheduled.
    Retrying,
    /// Provider missing, or not ready with no retries left.
    Skipped,
}

/// Send the signed-in user's profile through the lite recommend endpoint.
///
/// When the provider is not ready yet, a [`Task::IdentityRetry`] carrying
/// `retries - 1` is posted after `retry_delay`.
pub(crate) fn sync_identity(
    host: &Host,
    dispatcher: &Dispatcher,
    retries: u32,
    retry_delay: Duration,
) -> SyncAttempt {
    let Some(provider) = host.identity_provider() else {
        debug!("No identity provider registered, skipping profile sync");
        return SyncAttempt::Skipped;
    };

    if !provider.is_ready() {
        if retries == 0 {
            debug!("Identity provider never became ready");
            return SyncAttempt::Skipped;
        }
        dispatcher.schedule(
            retry_delay,
            Task::IdentityRetry {
                retries: retries - 1,
            },
        );
        return SyncAttempt::Retrying;
    }

    let transport = dispatcher.transport().clone();
    let lookup = provider.user_info();
    dispatcher.detach(async move {
        let Some(user) = lookup.await else {
            debug!("Identity provider returned no user");
            return;
        };
        let Some(payload) = IdentityPayload::from_user(&user) else {
            debug!("Identity user has no ID");
            return;
        };
        let id = payload.idm.id.clone();
        match transport.identify(payload).await {
            Ok(()) => info!("Synced identity profile for {id}"),
            Err(e) => warn!("Identity sync failed: {e}"),
        }
    });
    SyncAttempt::Started
}
