use clap::Parser;
use tempmail::{cli::Cli, config::Config};

#[tokio::main]
async fn main() {
  let cli = Cli::parse();

  let config = match Config::from_env() {
    Ok(c) => c,
    Err(e) => {
      eprintln!("error: {e}");
      std::process::exit(2);
    }
  };

  if let Err(e) = tempmail::cli::run(cli, config).await {
    eprintln!("error: {e}");
    std::process::exit(1);
  }
}
