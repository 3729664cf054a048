use canvas::application::data::LogLevel;
use canvas::application::{Application, ApplicationError};
use canvas::cli::Cli;
use clap::Parser as _;
use supports_color::Stream;
use tracing::debug;

#[compio::main]
#[snafu::report]
async fn main() -> Result<(), ApplicationError> {
    let cli_args = Cli::parse();
    install_tracing(cli_args.log_level);
    // The build report goes to stdout; only color it for a terminal.
    colored::control::set_override(supports_color::on(Stream::Stdout).is_some());
    debug!("Parsed CLI arguments: {cli_args:?}");

    let outcome = Application::run(cli_args).await?;
    debug!(
        "Session left {} snapshot entries, {} commands rejected",
        outcome.snapshot.len(),
        outcome.rejected_commands
    );

    Ok(())
}

fn install_tracing(log_level: LogLevel) {
    let Some(level) = log_level.to_tracing_level() else {
        return;
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(log_level.shows_targets())
        .without_time()
        .compact()
        .init();
}
