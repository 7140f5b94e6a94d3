use anyhow::Result;
use clap::Parser;

use runbook::cli::commands::execution::{ExecutionAction, ExecutionCommand};
use runbook::cli::commands::process::{ProcessAction, ProcessCommand};
use runbook::cli::commands::serve::ServeCommand;
use runbook::cli::commands::{resolve_user, show_how_to_get_started};
use runbook::cli::{Cli, Commands, ExecutionCommands, ProcessCommands};
use runbook::{config, init_telemetry, open_store, RunbookConfig, Tracker};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config()?;
    init_telemetry(&config.observability)?;

    tokio::runtime::Runtime::new()?.block_on(async { run(cli, config).await })
}

async fn run(cli: Cli, config: &RunbookConfig) -> Result<()> {
    let Some(command) = cli.command else {
        return show_how_to_get_started();
    };

    let store = open_store(config).await?;
    let tracker = Tracker::new(store.clone());
    let user = || resolve_user(cli.user.as_deref(), config);

    let result = match command {
        // the server closes the store itself once it has drained
        Commands::Serve { host, port } => {
            return ServeCommand::new(tracker, config.server.clone(), config.auth.clone())
                .with_host(host)
                .with_port(port)
                .execute()
                .await;
        }
        Commands::Process(sub) => {
            let action = match sub {
                ProcessCommands::List => ProcessAction::List,
                ProcessCommands::Show { id } => ProcessAction::Show { id },
                ProcessCommands::History { id } => ProcessAction::History { id },
                ProcessCommands::Create { file } => ProcessAction::Create { file, user: user()? },
                ProcessCommands::Update { id, file } => ProcessAction::Update {
                    id,
                    file,
                    user: user()?,
                },
            };
            ProcessCommand::new(tracker, action)
                .with_json(cli.json)
                .execute()
                .await
        }
        Commands::Execution(sub) => {
            let action = match sub {
                ExecutionCommands::Start { process } => ExecutionAction::Start {
                    process,
                    user: user()?,
                },
                ExecutionCommands::Show { id } => ExecutionAction::Show { id },
                ExecutionCommands::List { process } => ExecutionAction::List { process },
                ExecutionCommands::Mark { id, step, mark_as } => ExecutionAction::Mark {
                    id,
                    step,
                    mark_as,
                    user: user()?,
                },
            };
            ExecutionCommand::new(tracker, action)
                .with_json(cli.json)
                .execute()
                .await
        }
    };

    store.close().await;
    result
}
