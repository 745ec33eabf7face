use pkgqueue::model::SpecFile;
use pkgqueue::ops::spec_ops::{self, PatchCommands};
use pkgqueue::parse::parse_spec;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn load_fixture(name: &str) -> (String, SpecFile) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let source = fs::read_to_string(&path).unwrap_or_else(|e| panic!("Could not read fixture {}: {}", name, e));
    let spec = parse_spec(&source);
    (source, spec)
}

/// `(file name, strip level)` of every patch in the series
fn patch_list(spec: &SpecFile, unapplied: bool, ignored: bool) -> Vec<(String, Option<u32>)> {
    spec.patchseries(unapplied, ignored)
        .unwrap()
        .iter()
        .map(|p| (p.file_name(), p.strip))
        .collect()
}

fn owned(items: &[(&str, u32)]) -> Vec<(String, Option<u32>)> {
    items.iter().map(|(n, s)| (n.to_string(), Some(*s))).collect()
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn test_fixture_metadata() {
    let (_, spec) = load_fixture("hello.spec");
    assert_eq!(spec.name(), Some("hello"));
    assert_eq!(spec.version(), Some("%{upstream_version}"));
    assert_eq!(spec.release(), Some("2%{?dist}"));
    assert_eq!(spec.epoch(), None);
    assert_eq!(spec.ignored_patches().unwrap(), vec![0]);

    let orig = spec.orig_src().unwrap();
    assert_eq!(orig.base, "hello-%{version}");
    assert_eq!(orig.format.as_deref(), Some("tar"));
    assert_eq!(orig.compression.as_deref(), Some("gzip"));
}

#[test]
fn test_fixture_patch_series() {
    let (_, spec) = load_fixture("hello.spec");
    assert_eq!(
        patch_list(&spec, false, false),
        owned(&[
            ("0001-Fix-the-build-with-newer-compilers.patch", 1),
            ("0002-Use-the-system-locale.patch", 1),
            ("0003-Only-on-x86.patch", 1),
        ])
    );
    assert_eq!(
        patch_list(&spec, true, true),
        owned(&[
            ("distro-branding.patch", 0),
            ("0001-Fix-the-build-with-newer-compilers.patch", 1),
            ("0002-Use-the-system-locale.patch", 1),
            ("0003-Only-on-x86.patch", 1),
        ])
    );
}

#[test]
fn test_fixture_sections() {
    let (_, spec) = load_fixture("hello.spec");
    assert_eq!(spec.get_section("build").unwrap(), "%configure\n%make_build\n\n");
    assert_eq!(spec.get_section("BUILD").unwrap(), "%configure\n%make_build\n\n");
    assert_eq!(spec.get_section("check"), None);
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

#[test]
fn test_replace_fixture_patches() {
    let (source, mut spec) = load_fixture("hello.spec");
    spec_ops::update_patch_series(&mut spec, &["0001-New.patch".to_string()], &PatchCommands::new()).unwrap();
    let text = spec.to_string();

    assert_eq!(patch_list(&spec, false, false), owned(&[("0001-New.patch", 1)]));
    assert_eq!(
        patch_list(&spec, true, true),
        owned(&[("distro-branding.patch", 0), ("0001-New.patch", 1)])
    );
    assert!(text.contains("Patch0:     distro-branding.patch\n# Patches auto-generated by git-buildpackage:\nPatch1:"));
    assert!(text.contains("%patch0 -p0\n# 0001-New.patch\n%patch1 -p1\n\n%build\n"));
    assert!(!text.contains("%ifarch"));
    assert!(!text.contains("0002-Use-the-system-locale.patch"));
    assert_eq!(text.matches("auto-generated").count(), 1);

    // Everything from %build on is untouched
    let tail = &source[source.find("%build").unwrap()..];
    assert!(text.ends_with(tail));

    // The edited text indexes the same way when parsed again
    let reparsed = parse_spec(&text);
    assert_eq!(patch_list(&reparsed, true, true), patch_list(&spec, true, true));
}

#[test]
fn test_clear_fixture_patches() {
    let (_, mut spec) = load_fixture("hello.spec");
    spec_ops::update_patch_series(&mut spec, &[], &PatchCommands::new()).unwrap();
    let text = spec.to_string();

    assert!(patch_list(&spec, true, false).is_empty());
    assert_eq!(patch_list(&spec, true, true), owned(&[("distro-branding.patch", 0)]));
    assert!(!text.contains("auto-generated"));
    assert!(text.contains("Patch0:     distro-branding.patch\nBuildRequires: gcc\n"));
    assert!(text.contains("%patch0 -p0\n\n%build\n"));
}

#[test]
fn test_set_vcs_tag_after_url() {
    let (_, mut spec) = load_fixture("hello.spec");
    spec_ops::set_tag(&mut spec, "VCS", None, "git://example.com/hello.git", Some("URL")).unwrap();
    assert!(spec.to_string().contains(
        "URL:        https://www.gnu.org/software/hello/\nVCS:        git://example.com/hello.git\n"
    ));
    assert_eq!(spec.tag_value("vcs"), Some("git://example.com/hello.git"));

    spec_ops::set_tag(&mut spec, "VCS", None, "", None).unwrap();
    assert_eq!(spec.tag_value("vcs"), None);
    assert!(!spec.to_string().contains("VCS:"));
}

#[test]
fn test_set_fixture_section() {
    let (_, mut spec) = load_fixture("hello.spec");
    spec_ops::set_section(&mut spec, "build", "make %{?_smp_mflags}\n").unwrap();
    assert_eq!(spec.get_section("build").unwrap(), "make %{?_smp_mflags}\n");
    assert!(spec.to_string().contains("%build\nmake %{?_smp_mflags}\n%install\n"));
}

#[test]
fn test_crlf_fixture() {
    let (source, mut spec) = load_fixture("crlf.spec");
    assert_eq!(spec.name(), Some("crlf"));
    assert_eq!(patch_list(&spec, false, false), owned(&[("a.patch", 1)]));

    spec_ops::update_patch_series(&mut spec, &["b.patch".to_string()], &PatchCommands::new()).unwrap();
    assert_eq!(patch_list(&spec, false, false), owned(&[("b.patch", 1)]));
    assert!(source.ends_with("%patch1 -p1"));
    assert!(spec.to_string().starts_with("Name: crlf\r\nVersion: 1.0\r\n"));
}
