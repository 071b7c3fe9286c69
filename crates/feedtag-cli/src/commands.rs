//! Command handlers. Each returns the [`RunStatus`] that sets the exit code.

use std::path::Path;

use chrono::Utc;
use feedtag_core::AppConfig;
use feedtag_tagger::csv_io::read_corpus_documents;
use feedtag_tagger::{
    CodaClient, FeedDownloader, Pipeline, PipelineSettings, RunStatus, RunSummary, Shortener,
};

use crate::corpus::PgCorpus;

const TRIGGER_SOURCE: &str = "cli";

/// A single pipeline step run on its own.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Download,
    Window,
    Tag,
    Export,
}

/// HTTP clients and settings built once from configuration.
struct Collaborators {
    settings: PipelineSettings,
    downloader: FeedDownloader,
    shortener: Shortener,
    sheet: Option<CodaClient>,
}

impl Collaborators {
    fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let timeout = config.http_timeout_secs;
        let sheet = config
            .sheet
            .as_ref()
            .map(|sheet| CodaClient::new(sheet, timeout))
            .transpose()?;

        Ok(Self {
            settings: PipelineSettings::from_app_config(config),
            downloader: FeedDownloader::new(timeout, &config.user_agent)?,
            shortener: Shortener::from_config(config.shortener.as_ref(), timeout)?,
            sheet,
        })
    }

    fn pipeline<'a>(&'a self, corpus: &'a PgCorpus<'a>) -> Pipeline<'a, PgCorpus<'a>, Shortener> {
        Pipeline {
            settings: &self.settings,
            downloader: &self.downloader,
            corpus,
            shortener: &self.shortener,
            sheet: self.sheet.as_ref(),
        }
    }
}

/// Check the store and apply pending migrations.
///
/// Returns `false` when either fails; the pipeline then runs without the
/// corpus and records the misses as warnings.
async fn prepare_store(pool: &sqlx::PgPool) -> bool {
    if let Err(e) = feedtag_db::ping(pool).await {
        tracing::warn!(error = %e, "corpus store unreachable; tagging without it");
        return false;
    }
    match feedtag_db::run_migrations(pool).await {
        Ok(applied) => {
            tracing::info!(applied, "corpus store ready");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "migrations failed; tagging without the corpus store");
            false
        }
    }
}

fn print_summary(label: &str, summary: &RunSummary) {
    let status = summary.status();
    println!(
        "{label} {status}: {} feeds downloaded ({} failed), {} records windowed, \
         {} tagged, {} stored, {} exported",
        summary.feeds_downloaded,
        summary.feeds_failed,
        summary.records_windowed,
        summary.records_tagged,
        summary.corpus_rows_stored.unwrap_or_default(),
        summary.rows_exported.unwrap_or_default(),
    );
    for warning in &summary.warnings {
        println!("  warning: {warning}");
    }
    for failure in &summary.failures {
        println!("  failed: {failure}");
    }
}

/// Run one step without recording a pipeline run. Only the tag step touches
/// the store.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed. Step failures
/// are reported through the returned status.
pub(crate) async fn run_step(
    config: &AppConfig,
    pool: &sqlx::PgPool,
    step: Step,
) -> anyhow::Result<RunStatus> {
    let collaborators = Collaborators::from_config(config)?;
    let store_ready = matches!(step, Step::Tag) && prepare_store(pool).await;
    let corpus = PgCorpus::new(store_ready.then_some(pool));
    let pipeline = collaborators.pipeline(&corpus);

    let mut summary = RunSummary::default();
    match step {
        Step::Download => {
            pipeline.download(&mut summary).await;
        }
        Step::Window => {
            pipeline.window(Utc::now(), &mut summary);
        }
        Step::Tag => {
            pipeline.tag(&mut summary).await;
        }
        Step::Export => pipeline.export_interval_file(&mut summary).await,
    }

    print_summary(&format!("{step:?}").to_lowercase(), &summary);
    Ok(summary.status())
}

/// Run the whole pipeline and record it in `pipeline_runs`.
///
/// The run proceeds when the store is down; it is then tagged with empty
/// predictions and left out of the ledger.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed.
pub(crate) async fn run_pipeline(
    config: &AppConfig,
    pool: &sqlx::PgPool,
) -> anyhow::Result<RunStatus> {
    let collaborators = Collaborators::from_config(config)?;
    let store_ready = prepare_store(pool).await;
    let corpus = PgCorpus::new(store_ready.then_some(pool));
    let pipeline = collaborators.pipeline(&corpus);

    let run = if store_ready {
        match feedtag_db::create_pipeline_run(pool, TRIGGER_SOURCE).await {
            Ok(run) => {
                tracing::info!(run_id = run.id, public_id = %run.public_id, "pipeline run started");
                Some(run)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to record pipeline run start; continuing unrecorded");
                None
            }
        }
    } else {
        None
    };

    let summary = pipeline.run(Utc::now()).await;
    let status = summary.status();
    let records = i32::try_from(summary.records_tagged).unwrap_or(i32::MAX);

    if let Some(run) = &run {
        let error_message = (!summary.failures.is_empty()).then(|| summary.failures.join("; "));
        let summary_json = serde_json::to_value(&summary)?;
        if let Err(e) = feedtag_db::finish_pipeline_run(
            pool,
            run.id,
            status.as_str(),
            records,
            summary_json,
            error_message.as_deref(),
        )
        .await
        {
            tracing::error!(run_id = run.id, error = %e, "failed to record pipeline run outcome");
        }
    }

    tracing::info!(status = %status, records, "pipeline run finished");
    print_summary("run", &summary);
    Ok(status)
}

/// Seed an empty corpus from a CSV of previously tagged rows.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read or the insert fails.
pub(crate) async fn corpus_init(pool: &sqlx::PgPool, source: &Path) -> anyhow::Result<RunStatus> {
    let docs = read_corpus_documents(source)?;
    match feedtag_db::seed_corpus_if_empty(pool, &docs).await? {
        Some(inserted) => println!(
            "corpus seeded: {inserted} of {} documents inserted from {}",
            docs.len(),
            source.display()
        ),
        None => println!("corpus already populated; nothing seeded"),
    }
    Ok(RunStatus::Succeeded)
}

/// # Errors
///
/// Returns an error if the count query fails.
pub(crate) async fn corpus_count(pool: &sqlx::PgPool) -> anyhow::Result<RunStatus> {
    let count = feedtag_db::count_corpus_documents(pool).await?;
    println!("{count} corpus documents");
    Ok(RunStatus::Succeeded)
}

/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn list_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<RunStatus> {
    let runs = feedtag_db::list_pipeline_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no pipeline runs recorded; run `feedtag run` first");
        return Ok(RunStatus::Succeeded);
    }

    println!(
        "{:<8}{:<18}{:<26}{:<10}ERROR",
        "ID", "STARTED", "STATUS", "RECORDS"
    );
    for run in &runs {
        let started = run.started_at.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<8}{:<18}{:<26}{:<10}{}",
            run.id,
            started,
            run.status,
            run.records_processed,
            run.error_message.as_deref().unwrap_or("")
        );
    }
    Ok(RunStatus::Succeeded)
}
