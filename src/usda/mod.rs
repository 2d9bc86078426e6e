//! `usda` implements text file parser.
//!
//! [Parser] reads one buffer and reports prims through a [Builder] as their
//! blocks close. Referenced, sub-layered and payloaded files are parsed by
//! separate parser instances, see [LoadState].

use std::collections::BTreeSet;

mod block;
mod builder;
mod diag;
mod meta;
mod parser;
mod samples;
mod stream;
mod token;
mod variant;

pub use block::{Attribute, Properties, Property, Relation, TYPELESS_PRIM};
pub use builder::{Builder, Callbacks, PrimSpec, ROOT_INDEX};
pub use diag::{Cursor, Depth, Diagnostic, Diagnostics};
pub use meta::{MetaMap, MetaTables, PrimMetaMap, PrimMetas, Scope, StageMetas, Validator, VariableDef};
pub use parser::{ParseState, Parser, Scalar};
pub use stream::Stream;
pub use token::Token;
pub use variant::{VariantContent, VariantSet, VariantSets};

/// Where the parsed file comes from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum LoadState {
    /// The file is opened directly.
    #[default]
    Toplevel,
    SubLayer,
    Reference,
    Payload,
}

/// API schemas accepted by default in the `apiSchemas` metadatum.
const DEFAULT_API_SCHEMAS: &[&str] = &[
    "MaterialBindingAPI",
    "ShapingAPI",
    "ShadowAPI",
    "LightAPI",
    "LightListAPI",
    "MeshLightAPI",
    "VolumeLightAPI",
    "CollectionAPI",
    "ConnectableAPI",
    "CoordSysAPI",
    "NodeDefAPI",
    "SkelBindingAPI",
    "GeomModelAPI",
    "MotionAPI",
    "PrimvarsAPI",
    "VisibilityAPI",
    "XformCommonAPI",
];

#[derive(Debug, Clone)]
pub struct Options {
    pub load_state: LoadState,
    /// Treat unknown metadata and API schemas as errors.
    pub strict: bool,
    /// Stage metadata that only top level files may declare.
    pub restricted_stage_metas: BTreeSet<String>,
    pub api_schemas: BTreeSet<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            load_state: LoadState::default(),
            strict: false,
            restricted_stage_metas: BTreeSet::new(),
            api_schemas: DEFAULT_API_SCHEMAS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl Options {
    pub fn with_load_state(mut self, load_state: LoadState) -> Self {
        self.load_state = load_state;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_restricted_stage_metas(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.restricted_stage_metas = names.into_iter().map(Into::into).collect();
        self
    }

    /// Accepts additional API schemas on top of the current set.
    pub fn with_api_schemas(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.api_schemas.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Checks whether `data` starts with the `#usda` magic header.
///
/// Only the first `max_scan` bytes are looked at, `0` scans the whole buffer.
/// Leading whitespace and a UTF-8 BOM are skipped.
pub fn is_usda(data: &[u8], max_scan: usize) -> bool {
    const BOM: &[u8] = b"\xEF\xBB\xBF";
    const MAGIC: &[u8] = b"#usda";

    let data = match max_scan {
        0 => data,
        max => &data[..data.len().min(max)],
    };

    let data = data.strip_prefix(BOM).unwrap_or(data);
    let start = data
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(data.len());

    match data[start..].strip_prefix(MAGIC) {
        Some([sep, ..]) => *sep == b' ' || *sep == b'\t',
        _ => false,
    }
}
