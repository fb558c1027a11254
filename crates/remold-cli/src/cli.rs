use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand, ValueEnum};

pub const REMOLD_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const REMOLD_BEFORE_HELP: &str = concat!(
    "remold ",
    env!("CARGO_PKG_VERSION"),
    " – patch-based source forks of obfuscated game jars\n\n",
    "\x1b[1;36mVersions\x1b[0m\n",
    "  open             Create versions/<dir> from a metadata archive (path or URL).\n",
    "  setup            Download, remap, decompile and patch one version.\n",
    "  migrate          Move a version directory and its patches to a new id.\n",
    "  update           Migrate the newest tracked version to the next upstream release.\n",
    "  package          Write the metadata archive and its .sha256 sidecar.\n\n",
    "\x1b[1;36mPatches\x1b[0m\n",
    "  apply            Reapply patches onto the decompiled baseline.\n",
    "  rebuild          Capture working tree edits back into patches/.\n",
);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    disable_help_subcommand = true,
    before_help = REMOLD_BEFORE_HELP,
    help_template = REMOLD_HELP_TEMPLATE
)]
pub struct RemoldCli {
    #[arg(short, long, help = "Suppress human output", global = true)]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes", global = true)]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        long,
        env = "REMOLD_ROOT",
        value_name = "DIR",
        help = "Workspace holding versions/ (defaults to the current directory)",
        global = true
    )]
    pub root: Option<PathBuf>,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Create a version directory from a metadata archive.")]
    Open(OpenArgs),
    #[command(about = "Download, remap, decompile and patch a version directory.")]
    Setup(SetupArgs),
    #[command(about = "Move a version directory and its patches to a new version id.")]
    Migrate(MigrateArgs),
    #[command(about = "Migrate the newest tracked version to the next upstream release.")]
    Update(UpdateArgs),
    #[command(about = "Package metadata and patches into an archive.")]
    Package(PackageArgs),
    #[command(about = "Apply patches onto the decompiled baseline.")]
    Apply(ApplyArgs),
    #[command(about = "Rebuild patches from the working tree.")]
    Rebuild(RebuildArgs),
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    #[arg(value_name = "ARCHIVE", help = "Archive path or http(s)/file URL")]
    pub source: String,
    #[arg(long = "dir", value_name = "NAME", help = "Directory name under versions/")]
    pub dir_name: Option<String>,
    #[arg(long, help = "Replace an existing version directory")]
    pub force: bool,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct FuzzArgs {
    #[arg(
        long,
        value_name = "MIN_SCORE",
        num_args = 0..=1,
        default_missing_value = "0.5",
        help = "Fall back to fuzzy matching (optional minimum score, 0.0-1.0)"
    )]
    pub fuzzy: Option<f64>,
    #[arg(
        long,
        value_name = "LINES",
        conflicts_with = "fuzzy",
        value_parser = value_parser!(usize),
        help = "Ignore up to LINES context lines at each end of a hunk"
    )]
    pub max_fuzz: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    #[arg(value_name = "VERSION")]
    pub version: String,
    #[command(flatten)]
    pub fuzz: FuzzArgs,
    #[arg(long, value_enum, default_value_t = AssetsArg::Auto, help = "Client asset handling")]
    pub assets: AssetsArg,
    #[arg(long, help = "Require launcher asset indexes to match the manifest digest")]
    pub strict_assets: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetsArg {
    Auto,
    Downloaded,
    None,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[arg(value_name = "FROM")]
    pub from: String,
    #[arg(value_name = "TO")]
    pub to: String,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long, value_enum, help = "Only consider one kind of upstream entry")]
    pub kind: Option<KindArg>,
    #[arg(long, help = "Jump to the newest entry instead of the next one")]
    pub latest: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Release,
    Snapshot,
}

impl KindArg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Snapshot => "snapshot",
        }
    }
}

#[derive(Args, Debug)]
pub struct PackageArgs {
    #[arg(value_name = "VERSION")]
    pub version: String,
    #[arg(long, value_name = "VERSION", help = "Toolchain version recorded in the archive")]
    pub toolchain_version: Option<String>,
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[arg(value_name = "VERSION")]
    pub version: String,
    #[command(flatten)]
    pub fuzz: FuzzArgs,
}

#[derive(Args, Debug)]
pub struct RebuildArgs {
    #[arg(value_name = "VERSION")]
    pub version: String,
    #[arg(long, default_value_t = 3, help = "Context lines around each change")]
    pub context: usize,
}
