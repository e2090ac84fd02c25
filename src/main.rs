use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod build;
mod commands;
mod config;
mod logging;

use config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Log what every stage does
    #[arg(short, long, global = true)]
    verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    command: FerrosmithCommand,
}

#[derive(Parser)]
struct BuildArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,
}

#[derive(Parser)]
struct ServeArgs {
    /// The address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// The port to bind to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Open the site in the default browser
    #[arg(short, long)]
    open: bool,

    /// The path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Serve the first build without watching for changes
    #[arg(long)]
    no_watch: bool,
}

#[derive(Subcommand)]
enum FerrosmithCommand {
    /// Build the site once
    Build(BuildArgs),

    /// Build the site, serve it locally and rebuild on changes
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let config_file = match &args.command {
        FerrosmithCommand::Build(build) => &build.config_file,
        FerrosmithCommand::Serve(serve) => &serve.config_file,
    };
    let (config, config_path) = Config::load_from_arg(Some(config_file))?;
    logging::init_logging(&config.log, args.verbose)?;

    match args.command {
        FerrosmithCommand::Build(_) => {
            commands::build::run(config, &config_path).await?;
        }
        FerrosmithCommand::Serve(args) => {
            commands::serve::run(&args, config, config_path).await?;
        }
    }

    Ok(())
}
