#![allow(clippy::cargo_common_metadata)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use xshell::{cmd, Shell};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Fmt,
    Check,
    Clippy,
    /// Run the signaling server, optionally on a given address
    Run {
        address: Option<String>,
        #[arg(long, default_value = "debug")]
        log_level: String,
    },
    Test,
    Doc,
    PreCommit,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(project_root::get_project_root()?);

    match &cli.command {
        Command::Fmt => fmt(&sh)?,
        Command::Check => check(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Run { address, log_level } => run(&sh, address.as_deref(), log_level)?,
        Command::Test => test(&sh)?,
        Command::Doc => doc(&sh)?,
        Command::PreCommit => pre_commit(&sh)?,
    };

    Ok(())
}

fn fmt(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo +nightly fmt").run()?)
}

fn check(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo check --all-targets --all-features --workspace").run()?)
}

fn clippy(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo clippy --all-targets --all-features --workspace").run()?)
}

fn run(sh: &Shell, address: Option<&str>, log_level: &str) -> Result<()> {
    let _env = sh.push_env("RENDEZVOUS_LOG_LEVEL", log_level);
    let address: Vec<&str> = address.into_iter().collect();
    Ok(cmd!(sh, "cargo run --package rendezvous-signaling-server -- {address...}").run()?)
}

fn test(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo test --workspace --all-features").run()?)
}

fn doc(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo doc --no-deps --all-features --workspace").run()?)
}

fn pre_commit(sh: &Shell) -> Result<()> {
    for cmd in [fmt, check, clippy, test, doc] {
        cmd(sh)?;
    }
    Ok(())
}
