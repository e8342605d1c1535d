use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use hotel_auth::auth::Provider;
use hotel_auth::{commands, config};

#[derive(Parser)]
#[command(name = "hotel-auth", version, about = "Social sign-in for the hotel booking app")]
struct Cli {
    /// Path to config.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the auth service
    Serve,
    /// Sign in through a provider widget in the browser
    Login {
        #[arg(value_enum)]
        provider: ProviderArg,
    },
    /// Check the stored session against the auth service
    Verify,
    /// Forget the stored session
    Logout,
    /// Print the stored session token
    Token,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Google,
    Telegram,
    Vk,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Google => Provider::Google,
            ProviderArg::Telegram => Provider::Telegram,
            ProviderArg::Vk => Provider::Vk,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    hotel_auth::init_tracing();

    let cli = Cli::parse();

    let config = match config::init_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to initialize config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve => {
            if let Err(e) = commands::serve(&config).await {
                tracing::error!("Auth server failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
        Command::Login { provider } => match commands::login(&config, provider.into()).await {
            Ok(user) => println!("Signed in as {} <{}> (id {})", user.name, user.email, user.id),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        Command::Verify => match commands::verify(&config).await {
            Some(user) => println!("{} <{}> (id {})", user.name, user.email, user.id),
            None => {
                eprintln!("No valid session");
                return ExitCode::FAILURE;
            }
        },
        Command::Logout => commands::logout(&config),
        Command::Token => match commands::token(&config) {
            Some(token) => println!("{}", token),
            None => return ExitCode::FAILURE,
        },
    }

    ExitCode::SUCCESS
}
