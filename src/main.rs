use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use binar_sync::cli::args::{Cli, Commands};
use binar_sync::cli::commands::{self, Context};
use binar_sync::config::{ColorSetting, Config};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // Logs go to stderr so JSON on stdout stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        print!("{}", commands::completions(shell)?);
        return Ok(());
    }

    let ctx = Context::open(cli.data_dir, cli.api_url, cli.token, cli.output)?;
    init_logging(&ctx.config);
    match ctx.config.general.color {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {}
    }

    let output = match cli.command {
        Commands::Status => commands::status(&ctx).await?,
        Commands::Run => commands::run(&ctx).await?,
        Commands::List { status } => commands::list(&ctx, status)?,
        Commands::Create { entity, data } => commands::create(&ctx, &entity, &data)?,
        Commands::Update { entity, id, data } => commands::update(&ctx, &entity, &id, &data)?,
        Commands::Delete { entity, id } => commands::delete(&ctx, &entity, &id)?,
        Commands::Cancel { id } => commands::cancel(&ctx, &id)?,
        Commands::CancelAll { force } => commands::cancel_all(&ctx, force)?,
        Commands::Requeue { id, all } => commands::requeue(&ctx, id.as_deref(), all)?,
        Commands::Pull => commands::pull(&ctx).await?,
        Commands::Entities { entity } => commands::entities(&ctx, entity.as_deref())?,
        Commands::Stats => commands::stats(&ctx)?,
        Commands::Cleanup { older_than } => commands::cleanup(&ctx, older_than)?,
        Commands::Watch => commands::watch(&ctx).await?,
        Commands::Completions { .. } => String::new(),
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
