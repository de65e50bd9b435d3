use clap::{Parser, Subcommand};
use rst_common::with_tokio::tokio;

use prople_agentd::errors::AgentdError;
use prople_agentd::svc::agent::AgentService;

#[derive(Parser)]
#[command(name = "agentd")]
#[command(version = "1.0")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "run")]
    #[command(about = "Running the agent HTTP node")]
    Run {
        #[arg(short, long, value_name = "FILE")]
        #[arg(required = true)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), AgentdError> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Run { config } => {
            let config = config
                .to_owned()
                .ok_or(AgentdError::ConfigError("config file is missing".to_string()))?;

            let node = AgentService::new(config).svc()?;
            node.serve()
                .await
                .map_err(|err| AgentdError::ServeError(err.to_string()))?;
        }
    }

    Ok(())
}
