use crate::cli::actions::Action;
use crate::doorman;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { port, dsn, globals } => {
            doorman::new(port, dsn, globals).await?;
        }
    }

    Ok(())
}
