use crate::api;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            cors_origin,
        } => {
            api::new(port, dsn, cors_origin, globals).await?;
        }
    }

    Ok(())
}
