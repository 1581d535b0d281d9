//! The build session: the explicit context object threaded through parsing and rendering.
//!
//! A [`Session`] owns everything that outlives a single page render: options, the symbol
//! table, the diagnostics sink, the template and partial stores, the parsed-page cache, the
//! taginator queue and the generated-image registry. Nothing here is global.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{ImageSettings, Key, PathType, Symbols, DEFAULT_QUALITY};
use crate::errors::Diagnostics;
use crate::host::{FileResolver, Resource, ScriptSandbox};
use crate::markup::{Markup, Page};
use crate::runtime::inline::InlineRules;
use crate::runtime::render::Renderer;
use crate::runtime::taginator::TagQueue;
use crate::syntax::{lex, parse, Grammar, ParseContext};

// ============================================================================
// OPTIONS
// ============================================================================

/// Settings that change how pages parse and render.
#[derive(Debug, Clone)]
pub struct Options {
    /// Prefix for absolute URLs, such as `https://example.com/`.
    pub domain: String,
    /// How finders write URLs when a finder names no path type.
    pub path_mode: PathType,
    /// Directory segment for taginator pages: `<page>/<tag_path>/<tag>`.
    pub tag_path: String,
    pub image_defaults: ImageSettings,
    pub inline: InlineRules,
    pub build_drafts: bool,
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            domain: String::new(),
            path_mode: PathType::Absolute,
            tag_path: "tag".into(),
            image_defaults: ImageSettings::default(),
            inline: InlineRules::new(),
            build_drafts: false,
            max_depth: 512,
        }
    }
}

// ============================================================================
// IMAGE JOBS
// ============================================================================

/// A resized or converted image that a page links to. Produced by the external image
/// pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub settings: ImageSettings,
}

/// The output path for `source` under `settings`: the format's extension, a `_<max>`
/// suffix when the size differs from the site default and a `_q<quality>` suffix when the
/// quality does. The result never equals `source`.
pub fn generated_image_path(
    source: &Path,
    settings: ImageSettings,
    defaults: ImageSettings,
) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = match settings.format {
        Some(format) => format.extension().to_string(),
        None => source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let default_quality = match defaults.quality {
        0 => DEFAULT_QUALITY,
        quality => quality,
    };

    let mut name = stem;
    if settings.max_size > 0 && settings.max_size != defaults.max_size {
        name.push_str(&format!("_{}", settings.max_size));
    }
    let mut quality_marked = false;
    if settings.quality != default_quality {
        name.push_str(&format!("_q{}", settings.quality));
        quality_marked = true;
    }
    let output = source.with_file_name(format!("{name}.{extension}"));
    if output == source && !quality_marked {
        return source.with_file_name(format!("{name}_q{}.{extension}", settings.quality));
    }
    output
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Default)]
pub struct Session {
    pub options: Options,
    pub symbols: Symbols,
    pub diagnostics: Diagnostics,
    templates: HashMap<Key, Rc<Markup>>,
    partials: HashMap<Key, Rc<Markup>>,
    pages: HashMap<PathBuf, Rc<Markup>>,
    pub(crate) tags: TagQueue,
    images: HashMap<(PathBuf, ImageSettings), ImageJob>,
    image_order: Vec<(PathBuf, ImageSettings)>,
}

impl Session {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Lexes and parses one file, registering it for diagnostics.
    pub fn parse(&mut self, path: impl AsRef<Path>, text: &str, grammar: Grammar) -> Markup {
        let path = path.as_ref();
        let file = self
            .diagnostics
            .sources
            .add(path.display().to_string(), text);
        let tokens = lex(file, text);
        let context = ParseContext {
            diagnostics: &mut self.diagnostics,
            symbols: &mut self.symbols,
            image_defaults: self.options.image_defaults,
        };
        let nodes = parse(tokens, grammar, context);
        debug!(path = %path.display(), nodes = nodes.len(), "parsed");
        Markup::new(path, file, nodes)
    }

    pub fn add_template(&mut self, name: &str, text: &str) -> Key {
        let markup = self.parse(format!("templates/{name}"), text, Grammar::Support);
        let key = self.symbols.intern(name);
        debug!(name, "loaded template");
        self.templates.insert(key, Rc::new(markup));
        key
    }

    pub fn add_partial(&mut self, name: &str, text: &str) -> Key {
        let markup = self.parse(format!("partials/{name}"), text, Grammar::Support);
        let key = self.symbols.intern(name);
        debug!(name, "loaded partial");
        self.partials.insert(key, Rc::new(markup));
        key
    }

    pub fn template(&self, key: Key) -> Option<Rc<Markup>> {
        self.templates.get(&key).cloned()
    }

    pub fn partial(&self, key: Key) -> Option<Rc<Markup>> {
        self.partials.get(&key).cloned()
    }

    /// Parses a page once per session. `None` when the resolver cannot read it.
    pub fn load_page(
        &mut self,
        resource: &Resource,
        resolver: &dyn FileResolver,
    ) -> Option<Rc<Markup>> {
        if let Some(markup) = self.pages.get(&resource.path) {
            return Some(Rc::clone(markup));
        }
        let text = resolver.read_source(resource)?;
        let markup = Rc::new(self.parse(&resource.path, &text, Grammar::Page));
        self.pages
            .insert(resource.path.clone(), Rc::clone(&markup));
        Some(markup)
    }

    /// Loads `resource` as a render target.
    pub fn page(&mut self, resource: &Resource, resolver: &dyn FileResolver) -> Option<Page> {
        let markup = self.load_page(resource, resolver)?;
        Some(Page::new(markup, resource.clone()))
    }

    /// Parses `text` as a page without a backing file.
    pub fn page_from_source(&mut self, path: impl AsRef<Path>, text: &str) -> Page {
        let path = path.as_ref();
        let markup = Rc::new(self.parse(path, text, Grammar::Page));
        self.pages.insert(path.to_path_buf(), Rc::clone(&markup));
        Page::new(markup, Resource::new(path))
    }

    /// Renders one page to HTML. Problems land in [`Session::diagnostics`].
    pub fn render_page(
        &mut self,
        page: &Page,
        resolver: &dyn FileResolver,
        scripts: &dyn ScriptSandbox,
    ) -> String {
        debug!(
            path = %page.path().display(),
            tag = page.tag.as_ref().map(|t| t.tag.as_str()),
            "rendering page"
        );
        Renderer::new(self, resolver, scripts, page).render()
    }

    /// Taginator clones scheduled since the last drain.
    pub fn drain_generated(&mut self) -> Vec<(String, Page)> {
        self.tags.drain()
    }

    /// Registers an image conversion and returns its output path. Repeated requests for
    /// the same source and settings share one job.
    pub fn register_image(&mut self, source: &Path, settings: ImageSettings) -> PathBuf {
        let key = (source.to_path_buf(), settings);
        if let Some(job) = self.images.get(&key) {
            return job.output.clone();
        }
        let output = generated_image_path(source, settings, self.options.image_defaults);
        debug!(source = %source.display(), output = %output.display(), "registered image job");
        self.images.insert(
            key.clone(),
            ImageJob {
                source: source.to_path_buf(),
                output: output.clone(),
                settings,
            },
        );
        self.image_order.push(key);
        output
    }

    /// Image jobs in registration order.
    pub fn image_jobs(&self) -> Vec<&ImageJob> {
        self.image_order
            .iter()
            .filter_map(|key| self.images.get(key))
            .collect()
    }
}
