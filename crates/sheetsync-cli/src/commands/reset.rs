use super::sync::{run_sync, SyncRequest};
use super::CommandStatus;
use crate::output::Output;
use crate::Service;
use color_eyre::Result;

/// `clear --yes` followed by a fresh `sync`, with one confirmation up front
pub async fn run_reset(service: Service, assume_yes: bool, output: &Output) -> Result<CommandStatus> {
    let request = SyncRequest {
        service,
        force_from: None,
        reset: true,
        playlists: Vec::new(),
        assume_yes,
    };
    run_sync(request, output).await
}
