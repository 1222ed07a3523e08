use git2::{Cred, CredentialType, RemoteCallbacks};
use std::cell::Cell;
use std::time::Instant;

use crate::credentials::Credentials;

/// Callbacks for a single network operation.
///
/// Credentials are offered once as user/password; libgit2 re-invokes the
/// callback after a rejected attempt, so a second call gives up instead of
/// looping. Transfer progress aborts the operation once `deadline` passes.
pub(super) fn remote_callbacks<'a>(creds: &'a Credentials, deadline: Instant) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let attempts = Cell::new(0u32);

    callbacks.credentials(move |_url, _username_from_url, allowed_types| {
        credential_callback(creds, &attempts, allowed_types)
    });
    callbacks.transfer_progress(move |_| Instant::now() < deadline);
    callbacks.sideband_progress(move |_| Instant::now() < deadline);

    callbacks
}

fn credential_callback(
    creds: &Credentials,
    attempts: &Cell<u32>,
    allowed_types: CredentialType,
) -> Result<Cred, git2::Error> {
    if creds.is_empty() {
        return Err(git2::Error::from_str(
            "authentication required but no credentials are configured",
        ));
    }

    let attempt = attempts.get();
    attempts.set(attempt + 1);
    if attempt > 0 {
        return Err(git2::Error::from_str("credentials were rejected by the remote"));
    }

    if !allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
        return Err(git2::Error::from_str(
            "remote does not accept username/token authentication",
        ));
    }

    Cred::userpass_plaintext(&creds.username, &creds.token)
}
