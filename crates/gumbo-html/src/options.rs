//! Parse Options
//!
//! Options forwarded unchanged to the engine. Defaults match the engine's
//! own default options.

use crate::{Namespace, Tag};
use serde::{Deserialize, Serialize};

/// Options for a single parse call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Column width of a tab character when computing source positions
    pub tab_stop: u32,
    /// Stop recording diagnostics after the first one
    pub stop_on_first_error: bool,
    /// Maximum number of diagnostics to record; `None` means unlimited
    pub max_errors: Option<u32>,
    /// Parse the input as a fragment inserted under this context element
    pub fragment_context: Option<FragmentContext>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            tab_stop: 8,
            stop_on_first_error: false,
            max_errors: None,
            fragment_context: None,
        }
    }
}

impl ParseOptions {
    /// Options for parsing a fragment under `tag` in the HTML namespace
    pub fn fragment(tag: Tag) -> Self {
        Self {
            fragment_context: Some(FragmentContext {
                tag,
                namespace: Namespace::Html,
            }),
            ..Self::default()
        }
    }

    /// Whether another diagnostic may be recorded after `recorded` ones
    pub fn accepts_error(&self, recorded: usize) -> bool {
        if self.stop_on_first_error && recorded >= 1 {
            return false;
        }
        match self.max_errors {
            Some(max) => recorded < max as usize,
            None => true,
        }
    }
}

/// Fragment parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentContext {
    pub tag: Tag,
    #[serde(default)]
    pub namespace: Namespace,
}
