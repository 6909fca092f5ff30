use super::sync_ui::is_interactive;
use super::{AppContext, GoogleServices};
use crate::output::Output;
use crate::Service;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use sheet_sync_config::EnvCredentials;
use sheet_sync_core::{playlists, scrobbles};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Local,
    Remote,
    Both,
}

impl ClearScope {
    pub fn from_flags(local_only: bool, remote_only: bool) -> Self {
        match (local_only, remote_only) {
            (true, _) => ClearScope::Local,
            (false, true) => ClearScope::Remote,
            (false, false) => ClearScope::Both,
        }
    }

    fn includes_local(self) -> bool {
        matches!(self, ClearScope::Local | ClearScope::Both)
    }

    fn includes_remote(self) -> bool {
        matches!(self, ClearScope::Remote | ClearScope::Both)
    }

    fn describe(self) -> &'static str {
        match self {
            ClearScope::Local => "local state and caches",
            ClearScope::Remote => "the spreadsheet",
            ClearScope::Both => "local state, caches and the spreadsheet",
        }
    }
}

fn service_label(service: Service) -> &'static str {
    match service {
        Service::Lastfm => "Last.fm",
        Service::Youtube => "YouTube",
        Service::All => "Last.fm and YouTube",
    }
}

/// Asks before destroying anything; without a terminal only `--yes` proceeds
pub fn confirm(service: Service, scope: ClearScope, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !is_interactive() {
        return Err(eyre!(
            "Refusing to delete {} without confirmation in a non-interactive session; pass --yes",
            scope.describe()
        ));
    }

    dialoguer::Confirm::new()
        .with_prompt(format!("Delete {} for {}?", scope.describe(), service_label(service)))
        .default(false)
        .interact()
        .map_err(|e| eyre!("Failed to read confirmation: {}", e))
}

pub async fn run_clear(service: Service, scope: ClearScope, assume_yes: bool, output: &Output) -> Result<()> {
    if !confirm(service, scope, assume_yes)? {
        output.info("Nothing cleared");
        return Ok(());
    }

    let ctx = AppContext::load()?;

    if !scope.includes_remote() {
        return clear_local_state(&ctx, service, output);
    }

    let google = EnvCredentials::from_env()
        .require_google()
        .map_err(|e| eyre!("{}", e))?;
    let services = ctx.google_services(&google)?;
    let result = clear_services(&ctx, &services, service, scope, output).await;
    if let Err(e) = ctx.persist_google_token(&services.auth).await {
        tracing::warn!(error = %e, "Could not save Google access token");
    }
    result
}

/// Remote first: deleting the spreadsheet needs the ID recorded in local state
pub async fn clear_services(
    ctx: &AppContext,
    services: &GoogleServices,
    service: Service,
    scope: ClearScope,
    output: &Output,
) -> Result<()> {
    if scope.includes_remote() {
        let writer = ctx.sheet_writer(services);

        if service.includes_lastfm() {
            match scrobbles::clear_remote(&writer, &ctx.store).await? {
                Some(id) => output.success(format!("Deleted Last.fm spreadsheet {}", id)),
                None => output.info("No Last.fm spreadsheet recorded, nothing to delete"),
            }
        }
        if service.includes_youtube() {
            match playlists::clear_remote(&writer, &ctx.store).await? {
                Some(id) => output.success(format!("Deleted YouTube spreadsheet {}", id)),
                None => output.info("No YouTube spreadsheet recorded, nothing to delete"),
            }
        }
    }

    if scope.includes_local() {
        clear_local_state(ctx, service, output)?;
    }

    Ok(())
}

fn clear_local_state(ctx: &AppContext, service: Service, output: &Output) -> Result<()> {
    if service.includes_lastfm() {
        scrobbles::clear_local(&ctx.store)?;
        output.success("Cleared Last.fm fetch state and scrobble cache");
    }
    if service.includes_youtube() {
        playlists::clear_local(&ctx.store)?;
        output.success("Cleared YouTube fetch state and playlist caches");
    }
    tracing::info!(operation = "clear_local", root = %ctx.store.root().display(), "Local state cleared");
    Ok(())
}
