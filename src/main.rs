use clap::{Parser, Subcommand};
use semver::Version;
use tracing::info;

use updraft::{Deployment, GithubSource, UpdateFetcher};

#[derive(Parser)]
#[command(name = "updraft", about = "Check, download and install application updates from github releases")]
struct Args {
  /// Repository owner on github
  owner: String,
  /// Repository name on github
  repo: String,
  /// Version currently installed, defaults to this binary's own version
  #[arg(long)]
  installed: Option<Version>,
  /// Only consider releases whose tag carries this channel
  #[arg(long)]
  channel: Option<String>,
  /// Log more
  #[arg(short, long)]
  verbose: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Query the latest release and report whether an update exists
  Check,
  /// Check, then download the selected packages into staging
  Download,
  /// Check, download and install the selected packages
  Install,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let args = Args::parse();
  let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
  tracing_subscriber::fmt().with_max_level(level).init();

  let installed = match args.installed {
    Some(version) => version,
    None => Version::parse(env!("CARGO_PKG_VERSION"))?,
  };
  let source = GithubSource::new("updraft", &args.owner, &args.repo, args.channel)?;
  let deployment = Deployment::detect(installed.clone())?;
  let fetcher = UpdateFetcher::new(source, deployment);

  let outcome = fetcher.check_for_update().await;
  let manifest = match (outcome.manifest, outcome.diagnostic) {
    (Some(manifest), _) => {
      info!("newest published version: {}", manifest.newest_version);
      if !manifest.has_update {
        println!("already up to date");
        return Ok(());
      }
      println!("update available: {}{}", manifest.newest_version, if manifest.update_required { " (required)" } else { "" });
      manifest
    }
    (None, Some(diagnostic)) => {
      println!("check failed: {}", diagnostic);
      return Ok(());
    }
    (None, None) => return Ok(()),
  };

  match args.command {
    Command::Check => {}
    Command::Download => {
      let selected = manifest.selected_entries(&installed);
      fetcher
        .download_updates(
          &selected,
          |total| info!("download {:.1}% complete", total),
          |entry, percent| info!("{}: {:.1}%", entry.filename, percent),
          |entry, error| info!("{} failed: {}", entry.filename, error),
        )
        .await?;
      println!("packages staged");
    }
    Command::Install => {
      fetcher.download_pending().await?;
      let selected = manifest.selected_entries(&installed);
      let installed_dir = fetcher.install_updates(
        &selected,
        |entry, percent| info!("{}: install {:.1}% complete", entry.filename, percent),
        |entry, error| info!("{} failed: {}", entry.filename, error),
      )?;
      println!("installed into {}", installed_dir.display());
    }
  }
  Ok(())
}
