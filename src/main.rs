use anyhow::Result;
use appdist::commands::{self, PackageInput};
use appdist::platform::Platform;
use clap::Parser;
use std::path::PathBuf;

/// appdist - Mobile build distribution
///
/// Inspect iOS (.ipa) and Android (.apk) builds, store them, and produce
/// over-the-air install links.
///
/// Examples:
///   appdist inspect MyApp.ipa            # Print the build's metadata
///   appdist upload app-release.apk       # Store the build and print its install URL
///   appdist latest com.example.app       # Latest upload id for a bundle
#[derive(Parser, Debug)]
#[command(author, version = env!("APPDIST_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Storage root directory (defaults to <data dir>/appdist)
    #[arg(
        long = "root",
        short = 'r',
        env = "APPDIST_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,

    /// Public base URL install links point at (defaults to http://localhost:8000)
    #[arg(
        long = "base-url",
        env = "APPDIST_BASE_URL",
        value_name = "URL",
        global = true
    )]
    pub base_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the metadata of a package without storing it
    Inspect(PackageArgs),

    /// Store a package under a new upload id
    Upload(PackageArgs),

    /// Show a stored upload
    Show(UploadIdArgs),

    /// Print the latest upload id for a bundle id
    Latest(LatestArgs),

    /// Print the iOS install manifest of a stored upload
    Manifest(UploadIdArgs),
}

#[derive(clap::Args, Debug)]
pub struct PackageArgs {
    /// The .ipa or .apk file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// ios or android (defaults to the file extension)
    #[arg(long, short = 'p', value_name = "PLATFORM")]
    pub platform: Option<Platform>,

    /// File whose text is attached to the build as its changelog
    #[arg(long, short = 'c', value_name = "FILE")]
    pub changelog: Option<PathBuf>,

    /// Free-form link attached to the build
    #[arg(long, value_name = "URL")]
    pub web: Option<String>,
}

impl From<PackageArgs> for PackageInput {
    fn from(args: PackageArgs) -> Self {
        Self {
            file: args.file,
            platform: args.platform,
            changelog: args.changelog,
            web: args.web,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct UploadIdArgs {
    #[arg(value_name = "UPLOAD_ID")]
    pub upload_id: String,
}

#[derive(clap::Args, Debug)]
pub struct LatestArgs {
    #[arg(value_name = "BUNDLE_ID")]
    pub bundle_id: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = appdist::runtime::RealRuntime;

    match cli.command {
        Commands::Inspect(args) => commands::inspect(runtime, &args.into())?,
        Commands::Upload(args) => {
            commands::upload(runtime, &args.into(), cli.root, cli.base_url)?
        }
        Commands::Show(args) => commands::show(runtime, &args.upload_id, cli.root, cli.base_url)?,
        Commands::Latest(args) => commands::latest(runtime, &args.bundle_id, cli.root)?,
        Commands::Manifest(args) => {
            commands::manifest(runtime, &args.upload_id, cli.root, cli.base_url)?
        }
    }
    Ok(())
}
