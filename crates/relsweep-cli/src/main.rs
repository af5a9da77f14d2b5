//! relsweep - assembly definition generator
//!
//! The `relsweep` command reconciles a set of published per-architecture
//! release payloads against the build system and emits a declarative
//! assembly definition.
//!
//! ## Commands
//!
//! - `from-releases`: compute an assembly definition from nightly and/or
//!   standard release references

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use tracing::Level;

use relsweep_clients::{BrewCliClient, BrewCliConfig, OcPayloadClient};
use relsweep_core::{
    init_tracing, AssemblySweep, AssemblyType, ReleaseReference, SweepConfig,
};

mod config;
mod previous;

use previous::{calculate_previous, graph_version_for_assembly, UpgradeGraphClient};

#[derive(Parser)]
#[command(name = "relsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assembly definition generator for multi-arch release payloads", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute an assembly definition from a set of published releases
    FromReleases {
        /// Group metadata file (YAML)
        #[arg(long)]
        group: PathBuf,

        /// The name of the assembly to scaffold (e.g. "4.12.5", "art1234")
        #[arg(long)]
        name: String,

        /// A nightly release name for each architecture
        /// (e.g. 4.12.0-0.nightly-2022-10-25-210451)
        #[arg(long = "nightly", value_name = "NIGHTLY_NAME")]
        nightlies: Vec<String>,

        /// The name and arch of an official release (e.g. 4.12.3-x86_64)
        #[arg(long = "standard", value_name = "X.Y.Z-ARCH")]
        standards: Vec<String>,

        /// Apply weaker conformance criteria (e.g. a payload is not
        /// required for every architecture)
        #[arg(long)]
        custom: bool,

        /// An in-flight release that can upgrade to this release
        #[arg(long, value_name = "EDGE")]
        in_flight: Option<String>,

        /// Releases that can upgrade to this release
        #[arg(long = "previous", value_name = "EDGES")]
        previous: Vec<String>,

        /// Calculate the previous list from the upgrade graph
        #[arg(long)]
        auto_previous: bool,

        /// Upgrade-graph service URL for --auto-previous
        #[arg(
            long,
            value_name = "GRAPH_URL",
            default_value = "https://api.openshift.com/api/upgrades_info/v1/graph"
        )]
        graph_url: String,

        /// Write the generated definition to a file as well as stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Safety margin (seconds) added to the newest build completion
        #[arg(long, default_value_t = 300)]
        basis_margin_secs: i64,

        /// Upper bound on simultaneous outstanding upstream calls
        #[arg(long, default_value_t = 500)]
        fetch_concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::FromReleases {
            group,
            name,
            nightlies,
            standards,
            custom,
            in_flight,
            previous,
            auto_previous,
            graph_url,
            output,
            basis_margin_secs,
            fetch_concurrency,
        } => {
            from_releases(FromReleasesArgs {
                group,
                name,
                nightlies,
                standards,
                custom,
                in_flight,
                previous,
                auto_previous,
                graph_url,
                output,
                basis_margin_secs,
                fetch_concurrency,
            })
            .await
        }
    }
}

struct FromReleasesArgs {
    group: PathBuf,
    name: String,
    nightlies: Vec<String>,
    standards: Vec<String>,
    custom: bool,
    in_flight: Option<String>,
    previous: Vec<String>,
    auto_previous: bool,
    graph_url: String,
    output: Option<PathBuf>,
    basis_margin_secs: i64,
    fetch_concurrency: usize,
}

async fn from_releases(args: FromReleasesArgs) -> Result<()> {
    if args.nightlies.is_empty() && args.standards.is_empty() {
        bail!("at least one release (--nightly or --standard) must be specified");
    }
    if args.auto_previous && !args.previous.is_empty() {
        bail!("cannot use --previous and --auto-previous at the same time");
    }
    let assembly_type = AssemblyType::infer(args.custom, &args.name);
    if assembly_type.is_custom()
        && (args.auto_previous || !args.previous.is_empty() || args.in_flight.is_some())
    {
        bail!("custom assemblies do not carry a previous list");
    }

    let group = config::load_group_metadata(&args.group)?;

    let mut references = Vec::new();
    for nightly in &args.nightlies {
        references.push(ReleaseReference::nightly(nightly, &group)?);
    }
    for standard in &args.standards {
        references.push(ReleaseReference::standard(standard, &group)?);
    }

    let previous = if assembly_type.is_custom() {
        Vec::new()
    } else {
        let graph_client = UpgradeGraphClient::new(args.graph_url);
        let graph_version =
            graph_version_for_assembly(assembly_type, &args.name, &group.major_minor());
        calculate_previous(
            &graph_version,
            &group.arches,
            args.in_flight.as_deref(),
            &args.previous,
            args.auto_previous,
            &group.major_minor(),
            &graph_client,
        )
        .await?
    };

    let payloads = Arc::new(OcPayloadClient::default());
    let builds = Arc::new(BrewCliClient::new(BrewCliConfig {
        sweep_tag_template: group.sweep_tag_template.clone(),
        default_el: group.default_el,
        ..Default::default()
    }));

    let sweep = AssemblySweep::new(args.name.clone(), args.custom, group, references, payloads, builds)
        .with_previous(previous)
        .with_config(SweepConfig {
            basis_margin: Duration::seconds(args.basis_margin_secs),
            fetch_concurrency: args.fetch_concurrency,
        });

    let result = sweep.run().await?;

    let yaml = serde_yaml::to_string(&result.to_definition())
        .context("serializing assembly definition")?;
    println!("{yaml}");

    if let Some(path) = args.output {
        std::fs::write(&path, &yaml)
            .with_context(|| format!("writing definition to {}", path.display()))?;
    }
    Ok(())
}
