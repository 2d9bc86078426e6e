//! Variant sets and variant selections.

use std::collections::BTreeMap;

use anyhow::{bail, ensure, Context, Result};
use tracing::debug;

use super::{
    block::Properties,
    builder::Builder,
    meta::{PrimMetaMap, Scope},
    parser::{string_literal, Parser},
    token::Token,
};

/// Fully parsed body of one variant.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VariantContent {
    pub metas: PrimMetaMap,
    /// Prims declared inside of the variant, already constructed.
    pub child_prim_indices: Vec<i64>,
    pub properties: Properties,
    /// Variant sets nested inside of the variant.
    pub variant_sets: VariantSets,
}

/// Variants of one set by name.
pub type VariantSet = BTreeMap<String, VariantContent>;

/// Variant sets of a prim by name.
pub type VariantSets = BTreeMap<String, VariantSet>;

impl<'a> Parser<'a> {
    /// `{ string set = "variant" ... }`
    pub(super) fn parse_variant_selection(&mut self) -> Result<BTreeMap<String, String>> {
        let mut selection = BTreeMap::new();

        self.ensure_pun('{').context("Variant selection must start with {")?;

        loop {
            while self.eat_pun(';')? {}

            if self.eat_pun('}')? {
                break;
            }

            let ty = self.fetch_identifier()?;
            ensure!(ty == "string", "Variant selections must be strings, got {}", ty);

            let set = match self.fetch_next()? {
                Token::Identifier(name) => name.to_string(),
                Token::String(raw) => string_literal(raw)?.value,
                other => bail!("Variant set name expected, got {:?}", other),
            };

            self.ensure_pun('=')?;
            let variant = self.fetch_str()?.value;

            ensure!(!selection.contains_key(&set), "Duplicate variant selection: {}", set);
            selection.insert(set, variant);
        }

        Ok(selection)
    }

    /// `variantSet "name" = { "variant" [( metas )] { body } ... }`
    ///
    /// Every variant body is parsed like a prim body under the `{set=variant}` path.
    pub(super) fn parse_variant_set(&mut self, builder: &mut dyn Builder, index: i64) -> Result<(String, VariantSet)> {
        ensure!(self.eat(Token::VariantSet)?, "variantSet expected");

        let set_name = self.fetch_str().context("Variant set name expected")?.value;
        self.ensure_pun('=')?;
        self.ensure_pun('{').context("Variant set must start with {")?;

        let mut set = VariantSet::new();

        while !self.eat_pun('}')? {
            let variant = self.fetch_str().context("Variant name expected")?.value;

            let metas = if self.is_next_pun('(') {
                self.parse_meta_list(Scope::Prim)?.0
            } else {
                PrimMetaMap::new()
            };

            let path = self.current_path().append_variant_selection(&set_name, &variant)?;
            debug!("Parsing variant {}", path);

            let body = self
                .with_path(path, |p| p.parse_block_body(builder, index))
                .with_context(|| format!("Unable to parse variant {} of set {}", variant, set_name))?;

            let content = VariantContent {
                metas,
                child_prim_indices: body.children,
                properties: body.properties,
                variant_sets: body.variant_sets,
            };

            ensure!(
                set.insert(variant.clone(), content).is_none(),
                "Duplicate variant {} in set {}",
                variant,
                set_name
            );
        }

        Ok((set_name, set))
    }
}
