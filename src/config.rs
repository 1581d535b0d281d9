//! Project configuration: `config/bobbin.toml`.
//!
//! Every field is optional. A project without the file builds with defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ast::{ImageFormat, ImageSettings, PathType};
use crate::engine::Options;
use crate::errors::BobbinError;
use crate::runtime::inline::InlineRules;

pub const CONFIG_FILE: &str = "config/bobbin.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub domain: String,
    pub path_mode: String,
    pub build_path: PathBuf,
    pub tag_path: String,
    pub image_quality: Option<u32>,
    pub image_size: Option<u32>,
    pub image_format: Option<String>,
    pub inline: Vec<InlineRule>,
}

/// One `[[inline]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineRule {
    pub pattern: String,
    pub template: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: String::new(),
            path_mode: "absolute".into(),
            build_path: PathBuf::from("public"),
            tag_path: "tag".into(),
            image_quality: None,
            image_size: None,
            image_format: None,
            inline: Vec::new(),
        }
    }
}

impl Config {
    /// Reads `<root>/config/bobbin.toml`, falling back to defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self, BobbinError> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path).map_err(|e| BobbinError::io(&path, e))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, BobbinError> {
        toml::from_str(text).map_err(|e| BobbinError::config(e.to_string()))
    }

    pub fn path_type(&self) -> Result<PathType, BobbinError> {
        PathType::from_name(&self.path_mode).ok_or_else(|| {
            BobbinError::config(format!(
                "path_mode must be absolute, relative, root or rooted, not '{}'",
                self.path_mode
            ))
        })
    }

    pub fn image_defaults(&self) -> Result<ImageSettings, BobbinError> {
        let format = match self.image_format.as_deref() {
            Some(name) => Some(ImageFormat::from_name(name).ok_or_else(|| {
                BobbinError::config(format!("unsupported image_format '{name}'"))
            })?),
            None => None,
        };
        if let Some(quality) = self.image_quality {
            if !(1..=100).contains(&quality) {
                return Err(BobbinError::config(format!(
                    "image_quality must be between 1 and 100, not {quality}"
                )));
            }
        }
        Ok(ImageSettings {
            quality: self.image_quality.unwrap_or(0),
            max_size: self.image_size.unwrap_or(0),
            format,
        })
    }

    /// The parse and render options for a session over this project.
    pub fn options(&self, build_drafts: bool) -> Result<Options, BobbinError> {
        let mut inline = InlineRules::new();
        for rule in &self.inline {
            inline.push(&rule.pattern, rule.template.as_str())?;
        }
        let tag_path = self.tag_path.trim_matches('/');
        if tag_path.is_empty() {
            return Err(BobbinError::config("tag_path must not be empty"));
        }
        Ok(Options {
            domain: self.domain.clone(),
            path_mode: self.path_type()?,
            tag_path: tag_path.to_string(),
            image_defaults: self.image_defaults()?,
            inline,
            build_drafts,
            ..Options::default()
        })
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.build_path, PathBuf::from("public"));
        let options = config.options(false).unwrap();
        assert_eq!(options.path_mode, PathType::Absolute);
        assert_eq!(options.tag_path, "tag");
        assert_eq!(options.image_defaults, ImageSettings::default());
    }

    #[test]
    fn fields_flow_into_options() {
        let config = Config::parse(
            r#"
domain = "https://example.com/"
path_mode = "relative"
tag_path = "/topics/"
image_quality = 80
image_size = 1200
image_format = "webp"

[[inline]]
pattern = '\*\*(.+?)\*\*'
template = "<b>$1</b>"
"#,
        )
        .unwrap();
        let options = config.options(true).unwrap();
        assert_eq!(options.domain, "https://example.com/");
        assert_eq!(options.path_mode, PathType::Relative);
        assert_eq!(options.tag_path, "topics");
        assert_eq!(options.image_defaults.quality, 80);
        assert_eq!(options.image_defaults.max_size, 1200);
        assert_eq!(options.image_defaults.format, Some(ImageFormat::Webp));
        assert_eq!(options.inline.len(), 1);
        assert!(options.build_drafts);
    }

    #[test]
    fn bad_values_are_config_errors() {
        for text in [
            "path_mode = \"sideways\"",
            "image_format = \"bmp\"",
            "image_quality = 0",
            "[[inline]]\npattern = \"(\"\ntemplate = \"\"",
        ] {
            let error = Config::parse(text)
                .and_then(|c| c.options(false))
                .unwrap_err();
            assert!(matches!(error.kind, ErrorKind::Config { .. }), "{text}");
        }
    }

    #[test]
    fn malformed_toml_is_reported() {
        let error = Config::parse("domain = ").unwrap_err();
        assert!(matches!(error.kind, ErrorKind::Config { .. }));
        assert!(Config::parse("colour = \"red\"").is_err());
    }
}
