mod changelog;
use changelog::cmd_changelog;

use std::path::{Path, PathBuf};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::git::GitCli;
use crate::io::package_io;
use crate::model::archive;
use crate::model::config::PkgConfig;
use crate::model::patch::PatchSeries;
use crate::model::spec::SpecFile;
use crate::ops::patch_ops::collect_patch_info;
use crate::ops::spec_ops::{self, PatchCommands};
use crate::ops::pq;
use crate::parse::mail_header::MailparseInfo;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let ctx = Context::load(cli.dir.as_deref())?;

    match cli.command {
        // Spec commands
        Commands::Patches(args) => cmd_patches(&ctx, args, json),
        Commands::UpdatePatches(args) => cmd_update_patches(&ctx, args),
        Commands::Tag(args) => cmd_tag(&ctx, args, json),
        Commands::Section(args) => cmd_section(&ctx, args),

        // Series and changelog
        Commands::Series(args) => cmd_series(&ctx, args, json),
        Commands::Changelog(args) => cmd_changelog(&ctx, args, json),

        // Patch queue
        Commands::Export(args) => cmd_export(&ctx, args, json),
        Commands::Import(args) => cmd_import(&ctx, args, json),

        // Misc
        Commands::Archive(args) => cmd_archive(args, json),
        Commands::SourceFormat(args) => cmd_source_format(&ctx, args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Configuration plus the directory it applies to
pub(crate) struct Context {
    pub root: PathBuf,
    pub config: PkgConfig,
}

impl Context {
    fn load(dir: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let start = match dir {
            Some(dir) => std::fs::canonicalize(dir)
                .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
            None => std::env::current_dir()?,
        };
        let (config, root) = config_io::load_config(&start)?;
        Ok(Context { root, config })
    }

    pub fn packaging_dir(&self) -> PathBuf {
        self.root.join(&self.config.packaging.dir)
    }

    /// Resolve a user-supplied path against the packaging directory
    fn packaging_path(&self, file: Option<&str>, default: &str) -> PathBuf {
        match file {
            Some(file) => PathBuf::from(file),
            None => self.packaging_dir().join(default),
        }
    }

    pub fn spec_path(&self) -> Result<PathBuf, package_io::SpecIoError> {
        package_io::find_spec_file(&self.packaging_dir(), Some(self.config.packaging.spec_file.as_str()))
    }

    /// Load the spec file; its patches resolve against the configured patch dir
    pub fn load_spec(&self) -> Result<(PathBuf, SpecFile), package_io::SpecIoError> {
        let path = self.spec_path()?;
        let mut spec = package_io::load_spec(&path)?;
        spec.spec_dir = self.packaging_dir().join(&self.config.pq.patch_dir);
        Ok((path, spec))
    }

    pub fn git(&self) -> GitCli {
        GitCli::new(&self.root)
    }
}

fn print_patches(series: &PatchSeries, json: bool) -> CmdResult {
    if json {
        let patches: Vec<PatchJson> = series
            .iter()
            .map(|p| patch_to_json(p, p.parsed_info()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&patches)?);
        return Ok(());
    }
    for patch in series.iter() {
        let strip = patch.strip.map(|n| format!(" -p{}", n)).unwrap_or_default();
        match patch.parsed_info() {
            Some(info) => println!("{}{}  {}", patch.file_name(), strip, info.subject),
            None => println!("{}{}", patch.file_name(), strip),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Spec commands
// ---------------------------------------------------------------------------

fn cmd_patches(ctx: &Context, args: PatchesArgs, json: bool) -> CmdResult {
    let (_, spec) = ctx.load_spec()?;
    let series = spec.patchseries(args.unapplied, args.ignored)?;
    print_patches(&series, json)
}

fn cmd_update_patches(ctx: &Context, args: UpdatePatchesArgs) -> CmdResult {
    let (path, mut spec) = ctx.load_spec()?;
    spec_ops::update_patch_series(&mut spec, &args.patches, &PatchCommands::new())?;
    package_io::save_spec(&path, &spec)?;
    println!("{} patches in {}", args.patches.len(), path.display());
    Ok(())
}

fn cmd_tag(ctx: &Context, args: TagArgs, json: bool) -> CmdResult {
    let (path, mut spec) = ctx.load_spec()?;
    let label = match args.num {
        Some(n) => format!("{}{}", args.name, n),
        None => args.name.clone(),
    };

    if args.delete {
        spec_ops::delete_tag(&mut spec, &args.name, args.num)?;
        package_io::save_spec(&path, &spec)?;
        println!("deleted {}", label);
        return Ok(());
    }

    match args.value {
        Some(value) => {
            spec_ops::set_tag(&mut spec, &args.name, args.num, &value, None)?;
            package_io::save_spec(&path, &spec)?;
            println!("{}: {}", label, value);
        }
        None => {
            let tags: Vec<_> = spec
                .in_file_order(spec.tags(&args.name))
                .into_iter()
                .filter(|t| args.num.is_none() || t.num == args.num)
                .collect();
            if tags.is_empty() {
                return Err(format!("tag not found: {}", label).into());
            }
            if json {
                let out: Vec<TagJson> = tags.into_iter().map(tag_to_json).collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for tag in tags {
                    println!("{}", tag.value);
                }
            }
        }
    }
    Ok(())
}

fn cmd_section(ctx: &Context, args: SectionArgs) -> CmdResult {
    let (_, spec) = ctx.load_spec()?;
    let body = spec
        .get_section(&args.name)
        .ok_or_else(|| format!("no %{} section", args.name))?;
    print!("{}", body);
    Ok(())
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Locate a series file; the default one requires a 3.0 (quilt) source package
fn series_path(ctx: &Context, file: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(file) = file {
        return Ok(PathBuf::from(file));
    }
    let format = package_io::read_source_format(&ctx.packaging_dir().join("source/format"))?;
    if !format.is_quilt() {
        return Err(format!("source format {} keeps no patch series", format).into());
    }
    Ok(ctx.packaging_dir().join("patches/series"))
}

fn read_series(path: &Path) -> Result<PatchSeries, Box<dyn std::error::Error>> {
    let patch_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok(PatchSeries::read_series_file(path, patch_dir)?)
}

fn cmd_series(ctx: &Context, args: SeriesArgs, json: bool) -> CmdResult {
    let path = series_path(ctx, args.file.as_deref())?;
    let mut series = read_series(&path)?;
    collect_patch_info(&mut series, &MailparseInfo)?;
    print_patches(&series, json)
}

// ---------------------------------------------------------------------------
// Patch queue
// ---------------------------------------------------------------------------

fn cmd_export(ctx: &Context, args: ExportArgs, json: bool) -> CmdResult {
    let (path, mut spec) = ctx.load_spec()?;
    let names = pq::export_to_spec(&ctx.git(), &mut spec, &args.base, &args.head)?;
    package_io::save_spec(&path, &spec)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&PatchNamesJson { patches: names })?);
    } else {
        for name in &names {
            println!("{}", name);
        }
    }
    Ok(())
}

fn cmd_import(ctx: &Context, args: ImportArgs, json: bool) -> CmdResult {
    let mut series = match args.file.as_deref() {
        Some(file) => read_series(Path::new(file))?,
        None => ctx.load_spec()?.1.patchseries(false, false)?,
    };
    let commits = pq::import_series(&ctx.git(), &mut series, &MailparseInfo)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&CommitsJson { commits })?);
    } else {
        for (patch, commit) in series.iter().zip(&commits) {
            println!("{} {}", commit, patch.file_name());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

fn cmd_archive(args: ArchiveArgs, json: bool) -> CmdResult {
    let name = archive::parse_filename(&args.filename)
        .ok_or_else(|| format!("not an archive file name: {}", args.filename))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&name)?);
    } else {
        println!(
            "{} {} {}",
            name.base,
            name.format.as_deref().unwrap_or("-"),
            name.compression.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_source_format(ctx: &Context, args: SourceFormatArgs, json: bool) -> CmdResult {
    let path = ctx.packaging_path(args.file.as_deref(), "source/format");
    let format = package_io::read_source_format(&path)?;
    if json {
        let out = SourceFormatJson {
            version: format.version.clone(),
            kind: format.kind.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format);
    }
    Ok(())
}
