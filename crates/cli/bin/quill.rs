use anyhow::Result;
use clap::Parser;
use quill::{App, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let app = App::parse();
    app.init_tracing();

    match &app.command {
        Command::Generate(cmd) => cmd.generate(&app.load_config()?).await?,
        Command::Stream(cmd) => cmd.stream(&app.load_config()?).await?,
        Command::Init { force } => app.init_config(*force)?,
    }

    Ok(())
}
