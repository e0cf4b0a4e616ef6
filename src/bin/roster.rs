use anyhow::Result;
use roster::cli::{actions, actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let (action, globals) = start()?;

    match action {
        Action::Server { .. } => actions::server::handle(action, &globals).await?,
    }

    Ok(())
}
