use super::clear::{self, ClearScope};
use super::sync_ui::{StageProgress, SyncUI};
use super::{spreadsheet_url, AppContext, CommandStatus, GoogleServices};
use crate::output::Output;
use crate::Service;
use chrono::NaiveDate;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use serde_json::json;
use sheet_sync_config::EnvCredentials;
use sheet_sync_core::{
    FetchMode, PlaylistSyncMode, PlaylistSyncOptions, PlaylistSyncOrchestrator, PlaylistSyncSummary,
    ScrobbleSyncOptions, ScrobbleSyncOrchestrator, ScrobbleSyncSummary, SyncOutcome,
};
use sheet_sync_sources::{build_http_client, LastFmClient};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub service: Service,
    pub force_from: Option<NaiveDate>,
    pub reset: bool,
    pub playlists: Vec<String>,
    pub assume_yes: bool,
}

pub async fn run_sync(request: SyncRequest, output: &Output) -> Result<CommandStatus> {
    tracing::debug!(?request, "Sync command started");

    // Missing secrets are fatal before anything touches state or the network
    let env = EnvCredentials::from_env();
    let lastfm_api_key = if request.service.includes_lastfm() {
        Some(env.require_lastfm_api_key().map_err(|e| eyre!("{}", e))?)
    } else {
        None
    };
    let google = env.require_google().map_err(|e| eyre!("{}", e))?;

    let ctx = AppContext::load()?;
    ctx.config
        .validate(request.service.includes_lastfm())
        .map_err(|e| eyre!("Invalid configuration in {}: {}", ctx.paths.config_file().display(), e))?;

    if request.force_from.is_some() && !request.service.includes_lastfm() {
        output.warn("--force-from only applies to Last.fm; ignoring it");
    }
    if !request.playlists.is_empty() && !request.service.includes_youtube() {
        output.warn("--playlist only applies to YouTube; ignoring it");
    }

    let services = ctx.google_services(&google)?;

    if request.reset {
        if !clear::confirm(request.service, ClearScope::Both, request.assume_yes)? {
            output.info("Reset cancelled");
            return Ok(CommandStatus::Completed);
        }
        clear::clear_services(&ctx, &services, request.service, ClearScope::Both, output).await?;
    }

    ctx.cancel_on_ctrl_c();
    let result = run_services(&ctx, &services, &request, lastfm_api_key, output).await;

    if let Err(e) = ctx.persist_google_token(&services.auth).await {
        tracing::warn!(error = %e, "Could not save Google access token");
    }

    result
}

async fn run_services(
    ctx: &AppContext,
    services: &GoogleServices,
    request: &SyncRequest,
    lastfm_api_key: Option<String>,
    output: &Output,
) -> Result<CommandStatus> {
    let ui = SyncUI::new(output.is_human() && !output.is_quiet());
    let mut report = serde_json::Map::new();
    let mut status = CommandStatus::Completed;

    if let Some(api_key) = lastfm_api_key {
        let stage = ui.stage("Last.fm");
        let outcome = guard(&stage, sync_lastfm(ctx, services, request, api_key, &stage).await)?;
        stage.finish(outcome_label(outcome.is_completed()));
        report_lastfm(&outcome, output);
        if !outcome.is_completed() {
            status = CommandStatus::Interrupted;
        }
        report.insert("lastfm".to_string(), serde_json::to_value(&outcome)?);
    }

    if request.service.includes_youtube() && status == CommandStatus::Completed {
        let stage = ui.stage("YouTube");
        let outcome = guard(&stage, sync_youtube(ctx, services, request, &stage).await)?;
        stage.finish(outcome_label(outcome.is_completed()));
        report_youtube(&outcome, output);
        if !outcome.is_completed() {
            status = CommandStatus::Interrupted;
        }
        report.insert("youtube".to_string(), serde_json::to_value(&outcome)?);
    }

    if !output.is_human() {
        output.json(&json!({
            "success": status == CommandStatus::Completed,
            "services": report,
        }));
    }

    Ok(status)
}

fn guard<T>(stage: &StageProgress, result: Result<T>) -> Result<T> {
    if result.is_err() {
        stage.abandon();
    }
    result
}

fn outcome_label(completed: bool) -> &'static str {
    if completed {
        "Done"
    } else {
        "Interrupted"
    }
}

async fn sync_lastfm(
    ctx: &AppContext,
    services: &GoogleServices,
    request: &SyncRequest,
    api_key: String,
    stage: &StageProgress,
) -> Result<SyncOutcome<ScrobbleSyncSummary>> {
    let config = &ctx.config.lastfm;
    let client = build_http_client(ctx.config.retry.http_timeout()).wrap_err("Failed to build HTTP client")?;
    let source = LastFmClient::new(client, api_key, config.username.trim().to_string());

    let options = ScrobbleSyncOptions {
        force_from: request.force_from,
        page_size: config.page_size,
        spreadsheet_title: config.spreadsheet_title.clone(),
        default_spreadsheet_id: config.default_spreadsheet_id().map(str::to_string),
    };

    let orchestrator =
        ScrobbleSyncOrchestrator::new(Arc::new(source), services.sheets.clone(), ctx.store.clone(), ctx.retry())
            .with_progress(stage.reporter());

    Ok(orchestrator.run(&options).await?)
}

async fn sync_youtube(
    ctx: &AppContext,
    services: &GoogleServices,
    request: &SyncRequest,
    stage: &StageProgress,
) -> Result<SyncOutcome<PlaylistSyncSummary>> {
    let config = &ctx.config.youtube;
    let options = PlaylistSyncOptions {
        spreadsheet_title: config.spreadsheet_title.clone(),
        default_spreadsheet_id: config.default_spreadsheet_id().map(str::to_string),
        selected: request.playlists.clone(),
    };

    let orchestrator = PlaylistSyncOrchestrator::new(
        services.youtube.clone(),
        services.sheets.clone(),
        ctx.store.clone(),
        ctx.retry(),
    )
    .with_progress(stage.reporter());

    Ok(orchestrator.run(&options).await?)
}

fn report_lastfm(outcome: &SyncOutcome<ScrobbleSyncSummary>, output: &Output) {
    if !output.is_human() {
        return;
    }
    match outcome {
        SyncOutcome::Completed { summary } => {
            output.success(format!(
                "Last.fm ({}): {} new scrobbles, {} rows written",
                describe_fetch_mode(&summary.mode),
                summary.fetched,
                summary.rows_written
            ));
            output.info(format!("  {}", spreadsheet_url(&summary.spreadsheet_id)));
        }
        SyncOutcome::Interrupted { progress } => {
            output.warn(format!("Last.fm sync interrupted ({}). Run the same command to resume.", progress));
        }
    }
}

fn report_youtube(outcome: &SyncOutcome<PlaylistSyncSummary>, output: &Output) {
    if !output.is_human() {
        return;
    }
    match outcome {
        SyncOutcome::Completed { summary } => {
            output.success(describe_playlist_summary(summary));
            output.info(format!("  {}", spreadsheet_url(&summary.spreadsheet_id)));
        }
        SyncOutcome::Interrupted { progress } => {
            output.warn(format!("YouTube sync interrupted ({}). Run the same command to resume.", progress));
        }
    }
}

fn describe_fetch_mode(mode: &FetchMode) -> String {
    match mode {
        FetchMode::Full => "full fetch".to_string(),
        FetchMode::Resume { from_page } => format!("resumed at page {}", from_page),
        FetchMode::Incremental { after } => format!("since {}", after.format("%Y-%m-%d %H:%M:%S")),
        FetchMode::Forced { from } => format!("forced from {}", from.format("%Y-%m-%d")),
    }
}

fn describe_playlist_summary(summary: &PlaylistSyncSummary) -> String {
    let mode = match summary.mode {
        PlaylistSyncMode::Full => "full",
        PlaylistSyncMode::Optimized => "optimized",
        PlaylistSyncMode::Selected => "selected",
    };
    let tally = &summary.tally;
    format!(
        "YouTube ({}): {} playlists, {} created, {} updated, {} unchanged, {} renamed, {} deleted",
        mode, summary.playlists_seen, tally.created, tally.updated, tally.unchanged, tally.renamed, tally.deleted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sheet_sync_core::PlaylistTally;

    #[test]
    fn test_describe_fetch_mode() {
        assert_eq!(describe_fetch_mode(&FetchMode::Resume { from_page: 4 }), "resumed at page 4");
        let after = Utc.with_ymd_and_hms(2024, 3, 9, 18, 5, 0).unwrap();
        assert_eq!(describe_fetch_mode(&FetchMode::Incremental { after }), "since 2024-03-09 18:05:00");
    }

    #[test]
    fn test_describe_playlist_summary() {
        let summary = PlaylistSyncSummary {
            mode: PlaylistSyncMode::Optimized,
            spreadsheet_id: "abc".to_string(),
            playlists_seen: 12,
            tally: PlaylistTally {
                created: 1,
                updated: 2,
                unchanged: 8,
                renamed: 1,
                deleted: 0,
                rows_written: 40,
            },
        };
        assert_eq!(
            describe_playlist_summary(&summary),
            "YouTube (optimized): 12 playlists, 1 created, 2 updated, 8 unchanged, 1 renamed, 0 deleted"
        );
    }
}
