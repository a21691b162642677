//! Install command
//!
//! Drives the full pipeline — Resolve, Fetch, Install, Verify — for each
//! requested formula, one at a time. Any failed step is terminal for that
//! run: the error is surfaced verbatim and nothing is recorded as
//! installed.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};

use an_core::flow::UnresolvedFormula;
use an_core::index::FormulaIndex;
use an_core::paths::formula_dir;
use an_core::Reporter;

use crate::ops::Context;
use crate::store::InstalledPackage;
use crate::ui::ConsoleReporter;
use crate::DbHandle;

/// Install one or more formulas by name, `name@version`, or file path.
pub async fn install(targets: &[String], head: bool, dry_run: bool) -> Result<()> {
    let start = Instant::now();

    let index = FormulaIndex::load(&formula_dir()).context("Failed to load formula index")?;
    let db = DbHandle::spawn().context("Failed to open state database")?;
    let client = reqwest::Client::builder()
        .user_agent(an_core::USER_AGENT)
        .build()?;
    let ctx = Context::new(db, index, client, Arc::new(ConsoleReporter));

    let mut installed = 0;
    for target in targets {
        install_one(&ctx, target, head, dry_run).await?;
        installed += 1;
    }

    if !dry_run {
        ctx.reporter
            .summary(installed, "INSTALL", start.elapsed().as_secs_f64());
    }
    Ok(())
}

async fn install_one(ctx: &Context, target: &str, head: bool, dry_run: bool) -> Result<()> {
    let resolved = UnresolvedFormula::parse(target, head).resolve(&ctx.index)?;
    let name = resolved.name.clone();
    let version = resolved.version.clone();

    if let Some(existing) = ctx.db.get_package(name.to_string()).await? {
        if existing.version == version.as_str() && !head {
            ctx.reporter
                .info(&format!("{name} {version} is already installed"));
            return Ok(());
        }
    }

    if dry_run {
        ctx.reporter
            .info(&format!("would install {name} {version}"));
        return Ok(());
    }

    ctx.reporter.section(&format!("Fetching {name}"));
    let fetched = match resolved.fetch(&ctx.client, &ctx.reporter).await {
        Ok(fetched) => fetched,
        Err(err) => return fail(ctx, &name, &version, err).await,
    };

    ctx.reporter.section(&format!("Installing {name}"));
    let installed = match fetched.install(&ctx.reporter) {
        Ok(installed) => installed,
        Err(err) => return fail(ctx, &name, &version, err).await,
    };

    ctx.reporter.section(&format!("Verifying {name}"));
    let report = match installed.verify(&ctx.reporter) {
        Ok(report) => report,
        Err(err) => return fail(ctx, &name, &version, err).await,
    };
    tracing::debug!("smoke test output: {}", report.output.trim());

    ctx.db
        .install_complete(
            InstalledPackage {
                name: installed.name.to_string(),
                version: installed.version.to_string(),
                sha256: installed.digest.as_ref().map(ToString::to_string),
                size_bytes: installed.size_bytes,
                installed_at: chrono::Utc::now().timestamp(),
            },
            installed.linked.clone(),
        )
        .await?;

    ctx.reporter.done(
        &installed.name,
        &installed.version,
        &format!("({})", crate::ui::format_size(installed.size_bytes)),
    );
    Ok(())
}

/// Record the failure in history and surface the pipeline error verbatim.
async fn fail(
    ctx: &Context,
    name: &an_schema::FormulaName,
    version: &an_schema::Version,
    err: an_core::flow::PipelineError,
) -> Result<()> {
    ctx.reporter.failed(name, version, &err.to_string());
    ctx.db
        .add_history(
            name.to_string(),
            "install".to_string(),
            Some(version.to_string()),
            false,
        )
        .await
        .ok();
    Err(err.into())
}
