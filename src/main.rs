use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use consolemod_lib::config::ConfigStorage;
use consolemod_lib::console::{find_removable_storage, list_profile_ids, ConsoleFiles, ProfileChoice};
use consolemod_lib::packages::{CatalogIndex, InstalledRecords, PackageCatalogSync, PackageFiles};

#[derive(Parser, Debug)]
#[command(
    name = "consolemod",
    version,
    about = "Manage mod files on a console over FTP"
)]
struct Cli {
    /// Config file (defaults to ~/.consolemod/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Console address, `host` or `host:port` (defaults to the last one used)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file, creating remote directories
    Upload { local: PathBuf, remote: String },
    /// Download a file, overwriting the local copy
    Download { remote: String, local: PathBuf },
    /// Delete a file if present
    Delete { remote: String },
    /// Check whether a file exists
    Exists { remote: String },
    /// Check whether a directory exists
    DirExists { path: String },
    /// List child directories (pass a trailing `/`)
    Dirs { parent: String },
    /// Find removable storage
    Usb,
    /// List user profile IDs
    Profiles,
    /// List package files
    Packages,
    /// Install a package file
    InstallPkg { local: PathBuf },
    /// Report installed packages the catalog has newer versions of
    Sync {
        /// JSON array of installed package records
        installed: PathBuf,
        /// JSON object of package ID to latest version
        catalog: PathBuf,
    },
}

type CliResult<T> = Result<T, Box<dyn Error>>;

#[tokio::main]
async fn main() {
    consolemod_lib::init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let storage = match cli.config {
        Some(path) => ConfigStorage::at(path),
        None => ConfigStorage::open_default()?,
    };
    let config_file = storage.load().await?;

    let host_arg = cli
        .host
        .or(config_file.last_host)
        .ok_or("no console address: pass --host")?;
    let files = ConsoleFiles::ftp(config_file.console);
    let host = files.address(&host_arg)?;

    match cli.command {
        Command::Upload { local, remote } => {
            let n = files.upload_file(&host, &local, &remote).await?;
            println!("Uploaded {} bytes", n);
        }
        Command::Download { remote, local } => {
            let n = files.download_file(&host, &remote, &local).await?;
            println!("Downloaded {} bytes", n);
        }
        Command::Delete { remote } => {
            if files.delete_file(&host, &remote).await? {
                println!("Deleted");
            } else {
                println!("Nothing to delete");
            }
        }
        Command::Exists { remote } => println!("{}", files.file_exists(&host, &remote).await?),
        Command::DirExists { path } => println!("{}", files.directory_exists(&host, &path).await?),
        Command::Dirs { parent } => {
            for name in files.list_child_directories(&host, &parent).await? {
                println!("{}", name);
            }
        }
        Command::Usb => println!("{}", find_removable_storage(&files, &host).await?),
        Command::Profiles => {
            let ids = list_profile_ids(&files, &host).await?;
            println!("{}", serde_json::to_string_pretty(&ProfileChoice::from_ids(ids)?)?);
        }
        Command::Packages => {
            let listing = PackageCatalogSync::new(files.clone())
                .list_packages(&host, &files.config().package_dir)
                .await?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::InstallPkg { local } => {
            let remote = PackageFiles::new(files.clone())
                .install_package(&host, &local)
                .await?;
            println!("Installed {}", remote);
        }
        Command::Sync { installed, catalog } => {
            let installed = InstalledRecords::from_json(&tokio::fs::read_to_string(&installed).await?)?;
            let catalog = CatalogIndex::from_json(&tokio::fs::read_to_string(&catalog).await?)?;
            if catalog.is_empty() {
                warn!("Catalog is empty, nothing can be outdated");
            } else {
                info!("Checking against {} catalog entries", catalog.len());
            }

            let report = PackageCatalogSync::new(files.clone())
                .sync(&host, &files.config().package_dir, &installed, &catalog)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if let Err(e) = storage.remember_host(&host_arg).await {
        warn!("Failed to save config: {}", e);
    }

    Ok(())
}
