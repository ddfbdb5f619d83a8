use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "srvrig",
    version,
    about = "Run several local application server instances side by side"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Base directory holding config, registry and instances (default: ~/.srvrig)
    #[arg(long = "home", env = "SRVRIG_BASE", global = true)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the base directory from the installation resources
    Init,
    /// Remove the base directory and everything in it
    Clean {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Provision, build, deploy and run an app in a new instance
    Start {
        /// App name from srvrig.toml
        app: String,
        /// Datasource environment (dev or sit)
        #[arg(short, long)]
        env: Option<String>,
        /// Deploy the last built archive without running the build
        #[arg(short, long)]
        skip_build: bool,
    },
    /// Copy changed JSP files into a running instance
    Update {
        /// App name of a running instance
        app: String,
    },
    /// List running instances and their ports
    Ps,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::aot::Shell,
    },
}
