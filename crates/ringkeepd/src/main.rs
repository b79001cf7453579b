//! ringkeepd — the ringkeep update daemon.
//!
//! Runs on every storage host. Watches the host's DaemonState in the
//! coordinator and, when it turns updateable, brings every partition the
//! host holds to the domain group's latest version.
//!
//! # Usage
//!
//! ```text
//! ringkeepd run --config /etc/ringkeep/ringkeep.toml
//! ringkeepd trigger --config /etc/ringkeep/ringkeep.toml
//! ringkeepd check-config --config /etc/ringkeep/ringkeep.toml
//! ```

use clap::{Parser, Subcommand};
use ringkeep_core::Topology;
use tracing_subscriber::EnvFilter;

use ringkeepd::settings::ConfigArgs;
use ringkeepd::{DEFAULT_LOG_FILTER, daemon_mode, trigger};

#[derive(Parser)]
#[command(name = "ringkeepd", about = "ringkeep update daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the update daemon and its status API.
    Run(ConfigArgs),

    /// Mark this host updateable in a local coordinator database.
    Trigger(ConfigArgs),

    /// Parse and validate the configuration, then print it.
    CheckConfig(ConfigArgs),
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run(args) => daemon_mode::serve(args.load()?),
        Command::Trigger(args) => {
            let revision = trigger::run_trigger(&args.load()?)?;
            println!("host marked updateable (revision {revision})");
            Ok(())
        }
        Command::CheckConfig(args) => check_config(&args),
    }
}

fn check_config(args: &ConfigArgs) -> anyhow::Result<()> {
    let config = args.load()?;
    print!("{}", config.to_toml_string()?);

    if let Some(path) = &config.coordinator.topology {
        let topology = Topology::from_file(path)?;
        match topology.ring_group(&config.ring_group) {
            Some(ring_group) => {
                let hosts: usize = ring_group.rings.iter().map(|r| r.hosts.len()).sum();
                println!(
                    "# topology: ring group {} has {} rings, {} hosts",
                    ring_group.name,
                    ring_group.rings.len(),
                    hosts
                );
            }
            None => anyhow::bail!(
                "ring group {} not found in topology {}",
                config.ring_group,
                path.display()
            ),
        }
    }
    Ok(())
}
