use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pkgq", about = concat!("pkgq v", env!("CARGO_PKG_VERSION"), " - patch queues and changelogs for packaging"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "dir", global = true)]
    pub dir: Option<String>,

    /// Log edit decisions and external commands
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the patches of the spec file in application order
    Patches(PatchesArgs),
    /// Replace the spec file's patches with the given patch files
    UpdatePatches(UpdatePatchesArgs),
    /// Show, set or delete a spec tag
    Tag(TagArgs),
    /// Print the body of a spec section
    Section(SectionArgs),
    /// List a quilt series with patch metadata
    Series(SeriesArgs),
    /// Show or extend the changelog
    Changelog(ChangelogCmd),
    /// Export commits as patches into the spec file
    Export(ExportArgs),
    /// Apply a patch series as commits
    Import(ImportArgs),
    /// Split an archive file name into base, format and compression
    Archive(ArchiveArgs),
    /// Show the Debian source package format
    SourceFormat(SourceFormatArgs),
}

// ---------------------------------------------------------------------------
// Spec command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct PatchesArgs {
    /// Include tagged patches without a %patch macro
    #[arg(long)]
    pub unapplied: bool,
    /// Include patches listed in gbp-ignore-patches
    #[arg(long)]
    pub ignored: bool,
}

#[derive(Args)]
pub struct UpdatePatchesArgs {
    /// Patch file names, relative to the spec directory
    pub patches: Vec<String>,
}

#[derive(Args)]
pub struct TagArgs {
    /// Tag name, e.g. Patch or VCS
    pub name: String,
    /// New value (omit to print the current value)
    pub value: Option<String>,
    /// Tag number, e.g. 3 for Patch3
    #[arg(long)]
    pub num: Option<i32>,
    /// Delete the tag
    #[arg(long, conflicts_with = "value")]
    pub delete: bool,
}

#[derive(Args)]
pub struct SectionArgs {
    /// Section name without the leading %, e.g. prep
    pub name: String,
}

// ---------------------------------------------------------------------------
// Series and changelog args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SeriesArgs {
    /// Series file (default: <packaging dir>/patches/series)
    pub file: Option<String>,
}

#[derive(Args)]
pub struct ChangelogCmd {
    #[command(subcommand)]
    pub action: ChangelogAction,
}

#[derive(Subcommand)]
pub enum ChangelogAction {
    /// Show the changelog sections
    Show,
    /// Add a new release section
    Add(ChangelogAddArgs),
}

#[derive(Args)]
pub struct ChangelogAddArgs {
    /// Revision of the new release, e.g. 1.0-2
    #[arg(long)]
    pub revision: String,
    /// Also add one entry per commit since this revision
    #[arg(long)]
    pub since: Option<String>,
    /// Package name (debian policy; default: from the newest section)
    #[arg(long)]
    pub package: Option<String>,
    /// Target distribution (debian policy)
    #[arg(long, default_value = "UNRELEASED")]
    pub distribution: String,
    /// Upload urgency (debian policy)
    #[arg(long, default_value = "medium")]
    pub urgency: String,
    /// Entry texts, without the bullet
    pub entries: Vec<String>,
}

// ---------------------------------------------------------------------------
// Patch queue args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ExportArgs {
    /// Upstream commit the patches apply to
    #[arg(long)]
    pub base: String,
    /// Last commit to export
    #[arg(long, default_value = "HEAD")]
    pub head: String,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Series file to import (default: the spec file's applied patches)
    pub file: Option<String>,
}

// ---------------------------------------------------------------------------
// Misc args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ArchiveArgs {
    /// File name, e.g. hello-2.10.tar.gz
    pub filename: String,
}

#[derive(Args)]
pub struct SourceFormatArgs {
    /// Format file (default: <packaging dir>/source/format)
    pub file: Option<String>,
}
