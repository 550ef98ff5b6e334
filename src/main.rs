use autotrader::cli::{Cli, parse_log_level, run};
use clap::Parser;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_log_level(&cli.log_level))
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: failed to install tracing subscriber: {e}");
    }

    run(cli).await
}
