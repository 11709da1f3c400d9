//! Compiler Configuration
//!
//! Options threaded into the transformation engine and the translation
//! entry points. Both structs deserialize from JSON with every field
//! optional.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Target language features the rules are allowed to emit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Features: u8 {
        /// Classes, modules, `let`, default arguments
        const ES6 = 1 << 0;
        /// Async functions and other proposals
        const STAGE3 = 1 << 1;
    }
}

/// Engine-wide switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub features: Features,
    /// Collect runtime helper snippets referenced by the output
    pub snippets: bool,
    /// Attribute output fragments to source positions
    pub source_map: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            features: Features::empty(),
            snippets: true,
            source_map: true,
        }
    }
}

impl TransformOptions {
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn es6(&self) -> bool {
        self.features.contains(Features::ES6)
    }

    pub fn stage3(&self) -> bool {
        self.features.contains(Features::STAGE3)
    }
}

/// Options for a single translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    /// Name recorded as the map's source
    pub src_filename: String,
    /// (line, column) of the fragment inside its original file
    pub src_offset: (u32, u32),
    /// (line, column) at which the output will be placed
    pub dst_offset: (u32, u32),
    /// Strip common leading indentation before parsing
    pub dedent: bool,
    /// Translate only the body of the single top-level statement
    pub body_only: bool,
    /// Append the map as a base64 data-URL pragma
    pub inline_map: bool,
    /// Full text of the original file when the input is a fragment of it
    pub complete_src: Option<String>,
    #[serde(flatten)]
    pub transform: TransformOptions,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        TranslateOptions {
            src_filename: "<source>".to_string(),
            src_offset: (0, 0),
            dst_offset: (0, 0),
            dedent: true,
            body_only: false,
            inline_map: false,
            complete_src: None,
            transform: TransformOptions::default(),
        }
    }
}

impl TranslateOptions {
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.src_filename = filename.into();
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.transform.features = features;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_missing_fields() {
        let opts: TranslateOptions = serde_json::from_str(r#"{"inline_map": true}"#).unwrap();
        assert!(opts.inline_map);
        assert!(opts.dedent);
        assert!(opts.transform.snippets);
        assert_eq!(opts.src_filename, "<source>");
        assert!(!opts.transform.es6());
    }

    #[test]
    fn should_read_feature_flags() {
        let opts: TransformOptions = serde_json::from_str(r#"{"features": "ES6 | STAGE3"}"#).unwrap();
        assert!(opts.es6());
        assert!(opts.stage3());
    }
}
