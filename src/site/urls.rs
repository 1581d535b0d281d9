//! URL and output-path rewriting for resources in the source tree.
//!
//! Resource paths are relative to `source/` and always use `/` once rewritten.

use std::path::{Path, PathBuf};

use crate::ast::PathType;
use crate::host::{Resource, ResourceKind};

/// Strips leading underscores from every path segment.
pub fn undraft(path: &str) -> String {
    path.split('/')
        .map(|segment| segment.trim_start_matches('_'))
        .collect::<Vec<_>>()
        .join("/")
}

fn slashed(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// The extension a resource has once built, `None` to keep its own.
fn output_extension(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::Markup | ResourceKind::Markdown | ResourceKind::Html => Some("html"),
        _ => None,
    }
}

/// Writes `target` (a slashed source-relative path) in the style of `path_type`, as seen
/// from the page at `from`.
pub fn rewrite(path_type: PathType, domain: &str, from: &Path, target: &str) -> String {
    match path_type {
        PathType::Rooted => format!("/{target}"),
        PathType::Absolute => {
            if domain.is_empty() || domain.ends_with('/') {
                format!("{domain}{target}")
            } else {
                format!("{domain}/{target}")
            }
        }
        PathType::Relative => {
            let base = from.parent().unwrap_or(Path::new(""));
            pathdiff::diff_paths(Path::new(target), base)
                .map(|path| slashed(&path))
                .unwrap_or_else(|| target.to_string())
        }
    }
}

/// The URL of `resource`. Pages lose their extension and `index` collapses to its
/// directory; everything else keeps its built extension.
pub fn resource_url(
    resource: &Resource,
    path_type: PathType,
    from: &Path,
    domain: &str,
    build_drafts: bool,
) -> String {
    let mut target = slashed(&resource.path);
    if build_drafts && resource.draft {
        target = undraft(&target);
    }

    let page = matches!(
        resource.kind,
        ResourceKind::Markup | ResourceKind::Markdown | ResourceKind::Html
    );
    if !page {
        return rewrite(path_type, domain, from, &target);
    }

    let stem = match target.rfind('.') {
        Some(dot) if dot > target.rfind('/').map_or(0, |slash| slash + 1) => &target[..dot],
        _ => target.as_str(),
    };
    let url = rewrite(path_type, domain, from, stem);
    collapse_index(url)
}

fn collapse_index(url: String) -> String {
    if url == "index" {
        return "./".into();
    }
    match url.strip_suffix("index") {
        Some(base) if base.is_empty() || base.ends_with('/') => base.to_string(),
        _ => url,
    }
}

/// Where `resource` is written under `build_path`.
pub fn output_path(build_path: &Path, resource: &Resource, build_drafts: bool) -> PathBuf {
    let mut relative = slashed(&resource.path);
    if build_drafts && resource.draft {
        relative = undraft(&relative);
    }
    let mut path = build_path.join(relative);
    if let Some(extension) = output_extension(resource.kind) {
        path.set_extension(extension);
    }
    path
}

/// The output path of a taginator clone: `blog/index.html` becomes
/// `blog/<tag_path>/<tag>.html`, `blog/post.html` becomes `blog/post/<tag_path>/<tag>.html`.
pub fn tag_output_path(page_output: &Path, tag_path: &str, tag: &str) -> PathBuf {
    let extension = page_output
        .extension()
        .map(|e| e.to_string_lossy().into_owned());
    let stem = page_output.with_extension("");
    let base = if stem.file_name().is_some_and(|name| name == "index") {
        stem.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        stem
    };
    let mut path = base.join(tag_path).join(tag);
    if let Some(extension) = extension {
        path.set_extension(extension);
    }
    path
}
