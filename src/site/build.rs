//! The build driver: renders reachable pages, copies statics, then writes taginator pages.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::ast::FinderKind;
use crate::engine::{ImageJob, Session};
use crate::errors::{BobbinError, Diagnostics, ErrorKind};
use crate::host::{FileResolver, Resource, ResourceKind, ScriptSandbox};
use crate::site::tree::SiteTree;
use crate::site::urls::{output_path, tag_output_path};
use crate::site::Project;

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("css url pattern compiles")
});

static EXTERNAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.-]*:|//)").expect("scheme pattern compiles"));

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildSettings {
    /// Build every file, not only those reachable from the root index.
    pub all: bool,
    /// Build drafts and strip their underscores.
    pub drafts: bool,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub output: PathBuf,
    pub pages: usize,
    pub copied: usize,
    pub tag_pages: usize,
    /// Conversions for the external image pipeline.
    pub images: Vec<ImageJob>,
    pub diagnostics: Diagnostics,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.has_failures()
    }
}

/// Builds `project` into its build directory.
pub fn build(project: &Project, settings: BuildSettings) -> Result<BuildReport, BobbinError> {
    let tree = project.tree(settings.drafts)?;
    let mut session = project.session(settings.drafts)?;
    let scripts = project.scripts();
    let output = project.build_dir();
    fs::create_dir_all(&output).map_err(|e| BobbinError::io(&output, e))?;

    let index = tree
        .find("index", FinderKind::Page)
        .ok_or_else(|| BobbinError::unspanned(ErrorKind::MissingIndex))?;
    tree.mark_used(&index);
    if let Some(favicon) = tree.find("favicon.ico", FinderKind::Static) {
        tree.mark_used(&favicon);
    }

    let mut report = BuildReport {
        output: output.clone(),
        ..BuildReport::default()
    };
    let mut built = HashSet::new();

    // Rendering marks linked files as used, so repeat until a pass builds nothing new.
    loop {
        let pending: Vec<Resource> = tree
            .files()
            .into_iter()
            .filter(|resource| !built.contains(&resource.path))
            .filter(|resource| settings.drafts || !resource.draft)
            .filter(|resource| settings.all || tree.is_used(resource))
            .cloned()
            .collect();
        if pending.is_empty() {
            break;
        }

        for resource in pending {
            built.insert(resource.path.clone());
            let target = output_path(&output, &resource, settings.drafts);
            match resource.kind {
                ResourceKind::Markup | ResourceKind::Markdown => {
                    let Some(page) = session.page(&resource, &tree) else {
                        return Err(BobbinError::io(
                            &tree.absolute_path(&resource),
                            "could not be read",
                        ));
                    };
                    let html = session.render_page(&page, &tree, &scripts);
                    write(&target, &html)?;
                    report.pages += 1;
                }
                ResourceKind::Css => {
                    let source = tree.absolute_path(&resource);
                    let text =
                        fs::read_to_string(&source).map_err(|e| BobbinError::io(&source, e))?;
                    track_css_links(&tree, &text);
                    write(&target, &text)?;
                    report.copied += 1;
                }
                _ => {
                    copy(&tree.absolute_path(&resource), &target)?;
                    report.copied += 1;
                }
            }
            debug!(path = %resource.path.display(), "built");
        }

        if session.diagnostics.has_failures() {
            break;
        }
    }

    report.tag_pages = render_tag_pages(&mut session, &tree, &scripts, &output, settings.drafts)?;

    report.images = session
        .image_jobs()
        .into_iter()
        .filter(|job| settings.drafts || !Resource::new(&job.source).draft)
        .cloned()
        .collect();

    info!(
        pages = report.pages,
        copied = report.copied,
        tag_pages = report.tag_pages,
        images = report.images.len(),
        output = %output.display(),
        "build finished"
    );
    if !session.diagnostics.is_empty() {
        warn!(
            failures = session.diagnostics.failure_count(),
            warnings = session.diagnostics.warning_count(),
            "build reported problems"
        );
    }

    report.diagnostics = std::mem::take(&mut session.diagnostics);
    Ok(report)
}

/// Drains the taginator queue until rendering schedules nothing new.
fn render_tag_pages(
    session: &mut Session,
    tree: &SiteTree,
    scripts: &dyn ScriptSandbox,
    output: &Path,
    build_drafts: bool,
) -> Result<usize, BobbinError> {
    let tag_path = session.options.tag_path.clone();
    let mut count = 0;
    loop {
        let generated = session.drain_generated();
        if generated.is_empty() {
            return Ok(count);
        }
        for (url, page) in generated {
            let Some(tag) = page.tag.as_ref().map(|t| t.tag.clone()) else {
                continue;
            };
            let page_output = output_path(output, &page.resource, build_drafts);
            let target = tag_output_path(&page_output, &tag_path, &tag);
            let html = session.render_page(&page, tree, scripts);
            write(&target, &html)?;
            debug!(%url, path = %target.display(), "wrote tag page");
            count += 1;
        }
    }
}

/// Marks local files named in `url(...)` as used.
fn track_css_links(tree: &SiteTree, css: &str) {
    for capture in CSS_URL.captures_iter(css) {
        let target = capture[1].trim().trim_start_matches("../");
        if target.starts_with("data:") || EXTERNAL.is_match(target) {
            continue;
        }
        if let Some(resource) = tree.find(target, FinderKind::Any) {
            tree.mark_used(&resource);
        }
    }
}

fn write(path: &Path, contents: &str) -> Result<(), BobbinError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BobbinError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| BobbinError::io(path, e))
}

fn copy(from: &Path, to: &Path) -> Result<(), BobbinError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| BobbinError::io(parent, e))?;
    }
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| BobbinError::io(from, e))
}

#[cfg(test)]
mod css_tests {
    use super::*;

    #[test]
    fn css_urls_are_captured_without_quotes() {
        let css = r#"body { background: url("../img/bg.png"); } a { b: url( 'x.svg' ) } c { d: url(y.woff) }"#;
        let found: Vec<_> = CSS_URL
            .captures_iter(css)
            .map(|c| c[1].trim().to_string())
            .collect();
        assert_eq!(found, ["../img/bg.png", "x.svg", "y.woff"]);
    }

    #[test]
    fn external_targets_are_skipped() {
        assert!(EXTERNAL.is_match("https://cdn.example.com/font.woff"));
        assert!(EXTERNAL.is_match("//cdn.example.com/font.woff"));
        assert!(!EXTERNAL.is_match("img/bg.png"));
    }
}
