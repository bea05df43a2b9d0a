use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// scriptdeps - dependency registry for script targets
///
/// Track external dependency packages, resolve their latest major versions
/// from git tags, and generate the build manifest the external build tool
/// consumes.
///
/// Examples:
///   scriptdeps add https://example.com/foo.git   # Track foo at its latest major version
///   scriptdeps manifest my-script                # Print the manifest named for my-script
#[derive(Parser, Debug)]
#[command(author, version = env!("SCRIPTDEPS_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory holding the registry and generated folders
    /// (overrides defaults; also via SCRIPTDEPS_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "SCRIPTDEPS_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Add a package from a repository URL or local path
    Add(AddArgs),

    /// Bulk-import packages from a newline-delimited list file
    Import(ImportArgs),

    /// Remove a package
    Remove(RemoveArgs),

    /// Update all packages to their latest major versions
    Update(UpdateArgs),

    /// List all added packages
    List(ListArgs),

    /// Print the manifest for a named script target
    Manifest(ManifestArgs),

    /// Symlink the shared build cache into a folder
    Link(LinkArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Repository URL (ending in .git) or local path of the package
    #[arg(value_name = "LOCATION")]
    pub location: String,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// File with one package location per line; blank lines are skipped
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the package to remove
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {}

#[derive(clap::Args, Debug)]
pub struct ListArgs {}

#[derive(clap::Args, Debug)]
pub struct ManifestArgs {
    /// Script target name substituted into the manifest
    #[arg(value_name = "SCRIPT")]
    pub script: String,
}

#[derive(clap::Args, Debug)]
pub struct LinkArgs {
    /// Folder to expose the shared build cache in
    #[arg(value_name = "PATH")]
    pub dest: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = scriptdeps::runtime::RealRuntime;

    match cli.command {
        Commands::Add(args) => scriptdeps::commands::add(runtime, &args.location, cli.root),
        Commands::Import(args) => scriptdeps::commands::import(runtime, args.file, cli.root),
        Commands::Remove(args) => {
            scriptdeps::commands::remove(runtime, &args.name, args.yes, cli.root)
        }
        Commands::Update(_args) => scriptdeps::commands::update(runtime, cli.root),
        Commands::List(_args) => scriptdeps::commands::list(runtime, cli.root),
        Commands::Manifest(args) => scriptdeps::commands::manifest(runtime, &args.script, cli.root),
        Commands::Link(args) => scriptdeps::commands::link(runtime, args.dest, cli.root),
    }
}
