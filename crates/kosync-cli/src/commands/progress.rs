//! Progress command handlers

use anyhow::{bail, Context, Result};

use kosync_core::identity::{self, IdentityStrategy};
use kosync_core::{SyncEngine, SyncTransport};

use crate::output::Output;

/// Check credentials against the server
pub async fn auth<T: SyncTransport>(engine: &SyncEngine<T>, output: &Output) -> Result<()> {
    let authorized = engine
        .test_auth()
        .await
        .context("Failed to reach sync server")?;

    if !authorized {
        bail!("Sync server rejected the credentials");
    }

    output.success("Credentials accepted");
    Ok(())
}

/// Show the remote progress for a file
pub async fn get<T: SyncTransport>(
    engine: &SyncEngine<T>,
    file: &str,
    output: &Output,
) -> Result<()> {
    let document = engine.document_id(file)?;
    let remote = engine
        .get_document_progress(&document)
        .await
        .context("Failed to fetch progress")?;

    output.print_remote(&document, remote.as_ref());
    Ok(())
}

/// Push a page position for a file
pub async fn put<T: SyncTransport>(
    engine: &SyncEngine<T>,
    file: &str,
    page: i64,
    total_pages: i64,
    output: &Output,
) -> Result<()> {
    validate_position(page, total_pages)?;

    let accepted = engine
        .put_progress(file, page, total_pages)
        .await
        .context("Failed to push progress")?;

    if !accepted {
        bail!("Sync server did not accept the progress (see log for details)");
    }

    output.success(&format!("Pushed page {} of {}", page, total_pages));
    Ok(())
}

/// Reconcile a local page position with the server
pub async fn sync<T: SyncTransport>(
    engine: &SyncEngine<T>,
    file: &str,
    page: i64,
    total_pages: i64,
    output: &Output,
) -> Result<()> {
    validate_position(page, total_pages)?;

    let document = engine.document_id(file)?;
    output.message(&format!("Checking remote progress for {}", document));
    let outcome = engine
        .sync_document(&document, page, total_pages)
        .await
        .context("Failed to sync progress")?;

    output.print_outcome(&document, &outcome);
    Ok(())
}

/// Print the document key of a file
///
/// Needs no credentials or network access.
pub fn id(file: &str, strategy: IdentityStrategy, output: &Output) -> Result<()> {
    let document = identity::resolve(file, strategy)?;
    output.print_document_id(file, &document);
    Ok(())
}

fn validate_position(page: i64, total_pages: i64) -> Result<()> {
    if page < 0 {
        bail!("Page must not be negative");
    }
    if total_pages < 0 {
        bail!("Total pages must not be negative");
    }
    Ok(())
}
