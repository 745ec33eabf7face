use std::path::PathBuf;

use crate::cli::commands::{ChangelogAction, ChangelogAddArgs, ChangelogCmd};
use crate::cli::output::{ChangelogSectionJson, section_to_json};
use crate::io::package_io;
use crate::model::changelog::{ChangelogEntry, ChangelogHeader};
use crate::ops::changelog_ops::{add_release_to_text, entries_from_commits, update_spec_changelog};
use crate::parse::changelog_parser::{ChangelogPolicy, parse_changelog};

use super::{CmdResult, Context};

/// The rpm policy keeps the changelog inside the spec file, the debian
/// policy in `<packaging dir>/changelog`.
fn debian_changelog_path(ctx: &Context) -> PathBuf {
    ctx.packaging_dir().join("changelog")
}

fn is_spec_policy(policy: &ChangelogPolicy) -> bool {
    policy.name == "rpm"
}

fn read_changelog_text(ctx: &Context, policy: &ChangelogPolicy) -> Result<String, Box<dyn std::error::Error>> {
    if is_spec_policy(policy) {
        let (_, spec) = ctx.load_spec()?;
        return Ok(spec.get_section("changelog").unwrap_or_default());
    }
    let path = debian_changelog_path(ctx);
    if !path.exists() {
        return Ok(String::new());
    }
    Ok(package_io::read_text(&path)?)
}

pub(crate) fn cmd_changelog(ctx: &Context, args: ChangelogCmd, json: bool) -> CmdResult {
    let policy = ChangelogPolicy::by_name(&ctx.config.changelog.policy)?;
    match args.action {
        ChangelogAction::Show => cmd_show(ctx, policy, json),
        ChangelogAction::Add(args) => cmd_add(ctx, policy, args),
    }
}

fn cmd_show(ctx: &Context, policy: &ChangelogPolicy, json: bool) -> CmdResult {
    let text = read_changelog_text(ctx, policy)?;
    let changelog = parse_changelog(text.trim_start(), policy)?;

    if json {
        let sections: Vec<ChangelogSectionJson> = changelog.sections.iter().map(section_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&sections)?);
        return Ok(());
    }
    for section in &changelog.sections {
        let field = |key: &str| section.header.field(key).unwrap_or("");
        println!(
            "{}  {}  {} <{}>",
            section.header.time.format("%Y-%m-%d"),
            field("revision"),
            field("name"),
            field("email")
        );
        for entry in &section.entries {
            for line in &entry.lines {
                println!("    {}", line.trim_start());
            }
        }
    }
    Ok(())
}

fn cmd_add(ctx: &Context, policy: &ChangelogPolicy, args: ChangelogAddArgs) -> CmdResult {
    let config = &ctx.config.changelog;
    if config.name.is_empty() || config.email.is_empty() {
        return Err("set [changelog] name and email in pkgq.toml".into());
    }

    let mut entries = Vec::new();
    if let Some(since) = &args.since {
        entries.extend(entries_from_commits(&ctx.git(), since, "HEAD", policy.entry_bullet)?);
    }
    entries.extend(
        args.entries
            .iter()
            .map(|text| ChangelogEntry::new(None, &format!("{} {}", policy.entry_bullet, text))),
    );
    if entries.is_empty() {
        return Err("nothing to add: give entry texts or --since".into());
    }

    let mut header = ChangelogHeader::new(chrono::Local::now().fixed_offset())
        .with_field("name", &config.name)
        .with_field("email", &config.email)
        .with_field("revision", &args.revision);

    if is_spec_policy(policy) {
        let (path, mut spec) = ctx.load_spec()?;
        update_spec_changelog(&mut spec, policy, header, entries)?;
        package_io::save_spec(&path, &spec)?;
        println!("added {} to {}", args.revision, path.display());
        return Ok(());
    }

    let path = debian_changelog_path(ctx);
    let text = if path.exists() {
        package_io::read_utf8(&path)?
    } else {
        String::new()
    };
    let package = match args.package {
        Some(package) => package,
        None => parse_changelog(text.trim_start(), policy)?
            .sections
            .first()
            .and_then(|s| s.header.field("package"))
            .map(str::to_string)
            .ok_or("no package name: pass --package for the first release")?,
    };
    header = header
        .with_field("package", &package)
        .with_field("distribution", &args.distribution)
        .with_field("urgency", &args.urgency);
    let updated = add_release_to_text(&text, policy, header, entries)?;
    package_io::write_text(&path, &updated)?;
    println!("added {} to {}", args.revision, path.display());
    Ok(())
}
