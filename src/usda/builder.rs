//! Construction protocol between the parser and a scene graph.
//!
//! The parser never sees concrete scene types. It reports fully parsed prims
//! through [Builder], which callers implement directly or assemble from
//! closures with [Callbacks].

use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::sdf::{self, Specifier, StringData};

use super::{
    block::Properties,
    meta::{PrimMetaMap, PrimMetas, StageMetas},
    variant::VariantSets,
};

/// Parent index of top level prims.
pub const ROOT_INDEX: i64 = -1;

/// Prim reported when its block closes.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimSpec {
    pub path: sdf::Path,
    pub specifier: Specifier,
    /// Declared type, empty for typeless prims.
    pub type_name: String,
    pub name: String,
    pub index: i64,
    pub parent: i64,
    pub properties: Properties,
    pub metas: PrimMetaMap,
    pub unregistered_strings: Vec<StringData>,
    /// Indices of the direct children, in file order.
    pub children: Vec<i64>,
    pub variant_sets: VariantSets,
}

impl PrimSpec {
    pub fn prim_metas(&self) -> Result<PrimMetas> {
        PrimMetas::from_meta_map(&self.metas, &self.unregistered_strings)
    }
}

/// Receives construction events.
///
/// Callbacks are synchronous and must not call back into the parser.
pub trait Builder {
    /// Returns an index for a new prim under `parent` ([ROOT_INDEX] for top level prims).
    fn assign_prim_index(&mut self, parent: i64) -> i64;

    /// Called once the stage metadata is parsed, an error aborts parsing.
    fn accept_stage_metas(&mut self, metas: &StageMetas) -> Result<()>;

    /// Whether prims of type `ty` can be constructed.
    fn has_prim_type(&self, ty: &str) -> bool;

    fn construct_prim(&mut self, ty: &str, spec: &PrimSpec) -> Result<()>;

    /// Fires after a successful [Builder::construct_prim].
    fn post_construct_prim(&mut self, _ty: &str, _path: &sdf::Path, _index: i64, _parent: i64) -> Result<()> {
        Ok(())
    }
}

type AssignFn<'f> = Box<dyn FnMut(i64) -> i64 + 'f>;
type StageMetasFn<'f> = Box<dyn FnMut(&StageMetas) -> Result<()> + 'f>;
type ConstructFn<'f> = Box<dyn FnMut(&PrimSpec) -> Result<()> + 'f>;
type PostConstructFn<'f> = Box<dyn FnMut(&sdf::Path, i64, i64) -> Result<()> + 'f>;

/// [Builder] made of closures, construction functions are keyed by prim type.
///
/// Without a registered index function, indices are allocated sequentially from 0.
#[derive(Default)]
pub struct Callbacks<'f> {
    assign: Option<AssignFn<'f>>,
    stage_metas: Option<StageMetasFn<'f>>,
    construct: HashMap<String, ConstructFn<'f>>,
    post_construct: HashMap<String, PostConstructFn<'f>>,
    next_index: i64,
}

impl<'f> Callbacks<'f> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_assign_prim_index(&mut self, f: impl FnMut(i64) -> i64 + 'f) {
        self.assign = Some(Box::new(f));
    }

    pub fn register_stage_metas(&mut self, f: impl FnMut(&StageMetas) -> Result<()> + 'f) {
        self.stage_metas = Some(Box::new(f));
    }

    pub fn register_prim_construct(&mut self, ty: impl Into<String>, f: impl FnMut(&PrimSpec) -> Result<()> + 'f) {
        self.construct.insert(ty.into(), Box::new(f));
    }

    pub fn register_post_prim_construct(
        &mut self,
        ty: impl Into<String>,
        f: impl FnMut(&sdf::Path, i64, i64) -> Result<()> + 'f,
    ) {
        self.post_construct.insert(ty.into(), Box::new(f));
    }

    /// Registered prim types, sorted.
    pub fn prim_types(&self) -> Vec<&str> {
        let mut types = self.construct.keys().map(String::as_str).collect::<Vec<_>>();
        types.sort_unstable();
        types
    }
}

impl Builder for Callbacks<'_> {
    fn assign_prim_index(&mut self, parent: i64) -> i64 {
        match self.assign.as_mut() {
            Some(assign) => assign(parent),
            None => {
                let index = self.next_index;
                self.next_index += 1;
                index
            }
        }
    }

    fn accept_stage_metas(&mut self, metas: &StageMetas) -> Result<()> {
        match self.stage_metas.as_mut() {
            Some(accept) => accept(metas),
            None => Ok(()),
        }
    }

    fn has_prim_type(&self, ty: &str) -> bool {
        self.construct.contains_key(ty)
    }

    fn construct_prim(&mut self, ty: &str, spec: &PrimSpec) -> Result<()> {
        let construct = self
            .construct
            .get_mut(ty)
            .with_context(|| format!("No construct function registered for {}", ty))?;

        construct(spec)
    }

    fn post_construct_prim(&mut self, ty: &str, path: &sdf::Path, index: i64, parent: i64) -> Result<()> {
        match self.post_construct.get_mut(ty) {
            Some(post) => post(path, index, parent),
            None => Ok(()),
        }
    }
}
