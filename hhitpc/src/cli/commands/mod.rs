use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use tesplugin::load_order::{read_load_order_file, LoadOrder};

pub mod run;
pub mod scan;

#[derive(Subcommand)]
pub enum Commands {
    /// Build the patch plugin
    Run {
        /// Game data directory holding the plugin files
        data_dir: PathBuf,

        /// Plugins to load, in load order
        #[arg(short, long, conflicts_with = "plugin_list")]
        plugins: Vec<String>,

        /// plugins.txt-style load order file
        #[arg(short = 'l', long, conflicts_with = "plugins")]
        plugin_list: Option<PathBuf>,

        /// Output plugin path
        #[arg(short, long, default_value = "HHITPC.esp")]
        output: PathBuf,

        /// TOML settings file (label overrides, extra topics)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Run the whole pass but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report matching topics without patching
    Scan {
        /// Game data directory holding the plugin files
        data_dir: PathBuf,

        /// Plugins to load, in load order
        #[arg(short, long, conflicts_with = "plugin_list")]
        plugins: Vec<String>,

        /// plugins.txt-style load order file
        #[arg(short = 'l', long, conflicts_with = "plugins")]
        plugin_list: Option<PathBuf>,

        /// TOML settings file (label overrides, extra topics)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Run {
                data_dir,
                plugins,
                plugin_list,
                output,
                settings,
                dry_run,
                json,
            } => run::execute(
                data_dir,
                plugins,
                plugin_list.as_deref(),
                output,
                settings.as_deref(),
                *dry_run,
                *json,
            ),
            Commands::Scan {
                data_dir,
                plugins,
                plugin_list,
                settings,
                json,
            } => scan::execute(data_dir, plugins, plugin_list.as_deref(), settings.as_deref(), *json),
        }
    }
}

/// Parse every plugin named on the command line or in the list file.
pub(crate) fn load_plugins(
    data_dir: &Path,
    plugins: &[String],
    plugin_list: Option<&Path>,
) -> anyhow::Result<LoadOrder> {
    let names = match plugin_list {
        Some(path) => read_load_order_file(path)
            .with_context(|| format!("reading load order from {}", path.display()))?,
        None => plugins.to_vec(),
    };
    anyhow::ensure!(
        !names.is_empty(),
        "no plugins given; pass --plugins or --plugin-list"
    );
    let order = LoadOrder::load(data_dir, &names)
        .with_context(|| format!("loading plugins from {}", data_dir.display()))?;
    Ok(order)
}
