// SPDX-FileCopyrightText: 2021-2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

mod cli;

use clap::crate_name;
use cli_utils::logging;
use cli_utils::BoxResult;
use figsnap::client::ApiClient;
use figsnap::enrich::Enricher;
use figsnap::ids::{EntityKind, IdGenerator};
use figsnap::orchestrator::Orchestrator;
use figsnap::rdf::store::SnapshotGraph;
use figsnap::settings;
use fs4::fs_std::FileExt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;
use tracing_subscriber::filter::LevelFilter;

#[allow(clippy::print_stdout)]
fn print_version_and_exit(quiet: bool) {
    if !quiet {
        print!("{} ", clap::crate_name!());
    }
    println!("{}", figsnap::VERSION);
    std::process::exit(0);
}

#[tokio::main]
#[instrument]
async fn main() -> BoxResult<()> {
    let log_reload_handle = logging::setup(crate_name!())?;
    let args = cli::args_matcher().get_matches();

    let quiet = args.get_flag(cli::A_L_QUIET);
    let version = args.get_flag(cli::A_L_VERSION);
    if version {
        print_version_and_exit(quiet);
    }

    let verbose = args.get_flag(cli::A_L_VERBOSE);
    let log_level = if verbose {
        LevelFilter::TRACE
    } else if quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };
    logging::set_log_level_tracing(&log_reload_handle, log_level)?;

    // Two concurrent runs would hammer the upstream
    // and race for the output directory.
    let lock_file_path = PathBuf::from("/tmp/figsnap.lock");
    if !lock_file_path.exists() {
        fs::File::create(&lock_file_path)?;
    }
    tracing::debug!("Preparing to lock file '{}' ...", lock_file_path.display());
    let lock_file = fs::File::open(&lock_file_path)?;
    if !lock_file.try_lock_exclusive()? {
        return Err(format!(
            "Failed to lock file '{}' - is another snapshot run still active?",
            lock_file_path.display()
        )
        .into());
    }
    tracing::debug!("Obtained lock on file '{}'.", lock_file_path.display());

    let run_settings = settings::load()?;

    let ids = Arc::new(IdGenerator::new());
    for (kind, value) in &run_settings.initial_ids {
        match EntityKind::from_str(kind) {
            Ok(entity_kind) => ids.set(entity_kind, *value),
            Err(_) => tracing::warn!("Ignoring initial id for unknown entity kind '{kind}'"),
        }
    }

    let client = ApiClient::new(&run_settings)?;
    let graph = SnapshotGraph::new(&run_settings.state_graph, Arc::clone(&ids))?;
    let width = run_settings.parallelism();
    let output_directory = run_settings.output_directory.clone();
    let enricher = Enricher::new(client, &run_settings);

    tracing::info!("Snapshotting into graph <{}> ...", run_settings.state_graph);
    let report = Orchestrator::new(enricher, graph, output_directory, width)
        .run()
        .await?;
    if let Some(path) = &report.snapshot {
        tracing::info!("Snapshot written to '{}'.", path.display());
    }

    tracing::trace!("Releasing lock on file '{}' ...", lock_file_path.display());
    FileExt::unlock(&lock_file)?;
    tracing::info!("Released lock on file '{}'.", lock_file_path.display());

    Ok(())
}
