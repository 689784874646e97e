//! Wires login, enumeration, translation and migration into one run.

use futures::future::{join_all, try_join_all};
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::enumerate::{PathSet, enumerate};
use crate::errors::Result;
use crate::migrate::{Shutdown, migrate};
use crate::report::RunReport;
use crate::session::{Connector, Session};
use crate::translate::PathTranslator;
use crate::types::Mount;

/// Execute one sync run.
///
/// Login and enumeration failures are fatal and returned before any secret is
/// read. Per-secret failures end up in the report.
pub async fn run(
    config: &SyncConfig,
    connector: &dyn Connector,
    shutdown: &Shutdown,
) -> Result<RunReport> {
    config.validate()?;
    if config.source.address == config.destination.address {
        warn!(address = %config.source.address, "source and destination are the same server");
    }

    let source = connector.login(&config.source).await?;
    let destination = connector.login(&config.destination).await?;

    let translator = PathTranslator::new(&config.mounts);
    let plans = try_join_all(
        config
            .mounts
            .iter()
            .map(|mount| plan_mount(&source, mount, &translator, config.list_concurrency)),
    )
    .await?;

    let base = RunReport {
        dry_run: config.migration.dry_run,
        ..Default::default()
    };
    if shutdown.is_triggered() {
        return Ok(RunReport {
            cancelled: true,
            ..base
        });
    }

    let passes = plans.into_iter().map(|(label, paths)| {
        let source = &source;
        let destination = &destination;
        async move {
            migrate(
                source,
                destination,
                &label,
                paths,
                config.migration,
                shutdown,
            )
            .await
        }
    });
    let mut report = join_all(passes)
        .await
        .into_iter()
        .map(RunReport::from)
        .fold(base, RunReport::merge);
    report.cancelled = shutdown.is_triggered();

    info!(
        source = source.address(),
        destination = destination.address(),
        copied = report.succeeded(),
        failed = report.failed(),
        "sync finished"
    );
    Ok(report)
}

/// Enumerate one mount and translate its paths for copying.
async fn plan_mount(
    source: &Session,
    mount: &Mount,
    translator: &PathTranslator,
    list_concurrency: usize,
) -> Result<(String, PathSet)> {
    let root = mount.enumeration_root();
    let label = format!("{}/", mount.path());
    let paths = enumerate(source, &root, list_concurrency).await?;

    // The root only comes back as its own leaf when it has no children.
    if paths.len() == 1 && paths[0] == root {
        warn!(%mount, "mount is empty; nothing to copy");
        return Ok((label, PathSet::new()));
    }

    let paths: PathSet = paths.iter().map(|path| translator.translate(path)).collect();
    info!(%mount, secrets = paths.len(), "enumerated mount");
    Ok((label, paths))
}
