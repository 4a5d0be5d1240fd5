use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bastion",
    about = "Bastion - resilient API gateway",
    version = env!("CARGO_PKG_VERSION"),
    author
)]
pub struct Cli {
    #[arg(short, long, env = "BASTION_CONFIG", default_value = "bastion.json")]
    pub config: PathBuf,

    /// Overrides the port from the config file
    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}
