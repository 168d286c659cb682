//! Command dispatch: bridges CLI args -> `AppClient` -> output formatting.

pub mod config_cmd;
pub mod entities;
pub mod publish;
pub mod watch;

use emstrack_core::{AppClient, ApiClient, EntityKind, MqttClient};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// The concrete client every server-bound command runs against.
pub type Client = AppClient<MqttClient, ApiClient>;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, client: &Client, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Ambulances(args) => {
            entities::handle(client, EntityKind::Ambulance, args, global).await
        }
        Command::Hospitals(args) => {
            entities::handle(client, EntityKind::Hospital, args, global).await
        }
        Command::Calls(args) => entities::handle(client, EntityKind::Call, args, global).await,
        Command::Bases(args) => entities::handle(client, EntityKind::Base, args, global).await,
        Command::Watch(args) => watch::handle(client, &args, global).await,
        Command::Publish(args) => publish::handle(client, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled without a server connection".into(),
        }),
    }
}
