//! `publish`: send one message through the client's broker session.

use emstrack_core::QoS;

use crate::cli::{GlobalOpts, PublishArgs};
use crate::error::CliError;

use super::Client;

pub async fn handle(
    client: &Client,
    args: PublishArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let qos = QoS::try_from(args.qos).map_err(|level| CliError::Validation {
        field: "qos".into(),
        reason: format!("expected 0, 1 or 2, got {level}"),
    })?;

    client
        .publish(&args.topic, args.payload.into_bytes(), qos, args.retain)
        .await?;

    if !global.quiet {
        eprintln!("Published to {}", args.topic);
    }
    Ok(())
}
