//! Metadata and dictionaries.
//!
//! Every scope (stage, prim, property) has its own table of recognized keys.
//! Keys missing from the table are kept as custom metadata.

use std::{collections::BTreeMap, str::FromStr};

use anyhow::{bail, ensure, Context, Result};
use tracing::debug;

use crate::sdf::{
    AssetPath, Axis, Dictionary, Kind, LayerOffset, ListEditQual, MetaVariable, Reference, StringData, TypeName, Value,
    ValueType,
};

use super::{
    parser::{string_literal, Parser},
    token::Token,
    LoadState,
};

/// Where a metadatum is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    Stage,
    Prim,
    Property,
}

/// Validates the textual value of a metadatum after it has been parsed.
pub type Validator = fn(&str) -> Result<bool, String>;

/// Recognized metadata key.
#[derive(Debug, Clone, Copy)]
pub struct VariableDef {
    pub declared_type: &'static str,
    pub name: &'static str,
    pub allow_array: bool,
    pub validator: Validator,
}

impl VariableDef {
    const fn new(name: &'static str, declared_type: &'static str) -> Self {
        Self {
            declared_type,
            name,
            allow_array: false,
            validator: accept_any,
        }
    }

    const fn array(name: &'static str, declared_type: &'static str) -> Self {
        Self {
            allow_array: true,
            ..Self::new(name, declared_type)
        }
    }

    const fn validated(self, validator: Validator) -> Self {
        Self { validator, ..self }
    }

    pub fn value_type(&self) -> Result<ValueType> {
        ValueType::from_name(self.declared_type)
            .with_context(|| format!("Metadatum {} declares unknown type {}", self.name, self.declared_type))
    }
}

fn accept_any(_: &str) -> Result<bool, String> {
    Ok(true)
}

fn validate_kind(value: &str) -> Result<bool, String> {
    Kind::from_str(value)
        .map(|_| true)
        .map_err(|_| format!("Invalid kind: {value}"))
}

fn validate_axis(value: &str) -> Result<bool, String> {
    Axis::from_str(value)
        .map(|_| true)
        .map_err(|_| format!("Invalid upAxis: {value} (must be X, Y or Z)"))
}

fn validate_interpolation(value: &str) -> Result<bool, String> {
    Ok(matches!(
        value,
        "constant" | "uniform" | "varying" | "vertex" | "faceVarying"
    ))
}

static STAGE_METAS: &[VariableDef] = &[
    VariableDef::new("doc", "string"),
    VariableDef::new("comment", "string"),
    VariableDef::new("defaultPrim", "token"),
    VariableDef::new("upAxis", "token").validated(validate_axis),
    VariableDef::new("metersPerUnit", "double"),
    VariableDef::new("timeCodesPerSecond", "double"),
    VariableDef::new("startTimeCode", "double"),
    VariableDef::new("endTimeCode", "double"),
    VariableDef::new("framesPerSecond", "double"),
    VariableDef::new("customLayerData", "dictionary"),
    VariableDef::array("subLayers", "asset"),
];

static PRIM_METAS: &[VariableDef] = &[
    VariableDef::new("kind", "token").validated(validate_kind),
    VariableDef::array("references", "reference"),
    VariableDef::array("payload", "reference"),
    VariableDef::array("inherits", "path"),
    VariableDef::array("specializes", "path"),
    VariableDef::array("variantSets", "string"),
    VariableDef::new("variants", "dictionary"),
    VariableDef::new("active", "bool"),
    VariableDef::new("hidden", "bool"),
    VariableDef::new("instanceable", "bool"),
    VariableDef::new("assetInfo", "dictionary"),
    VariableDef::new("customData", "dictionary"),
    VariableDef::array("apiSchemas", "token"),
    VariableDef::new("doc", "string"),
    VariableDef::new("comment", "string"),
    VariableDef::new("displayName", "string"),
    VariableDef::new("sceneName", "string"),
];

static PROPERTY_METAS: &[VariableDef] = &[
    VariableDef::new("interpolation", "token").validated(validate_interpolation),
    VariableDef::new("elementSize", "int"),
    VariableDef::new("customData", "dictionary"),
    VariableDef::new("hidden", "bool"),
    VariableDef::new("doc", "string"),
    VariableDef::new("comment", "string"),
    VariableDef::new("displayName", "string"),
    VariableDef::new("displayGroup", "string"),
    VariableDef::new("bindMaterialAs", "token"),
    VariableDef::new("connectability", "token"),
    VariableDef::new("renderType", "token"),
    VariableDef::new("outputName", "token"),
    VariableDef::new("sdrMetadata", "dictionary"),
    VariableDef::new("weight", "double"),
    VariableDef::new("colorSpace", "token"),
    VariableDef::array("allowedTokens", "token"),
];

/// Recognized metadata, one table per [Scope].
#[derive(Debug)]
pub struct MetaTables {
    stage: BTreeMap<&'static str, VariableDef>,
    prim: BTreeMap<&'static str, VariableDef>,
    property: BTreeMap<&'static str, VariableDef>,
}

impl MetaTables {
    pub fn new() -> Self {
        fn table(defs: &[VariableDef]) -> BTreeMap<&'static str, VariableDef> {
            defs.iter().map(|def| (def.name, *def)).collect()
        }

        Self {
            stage: table(STAGE_METAS),
            prim: table(PRIM_METAS),
            property: table(PROPERTY_METAS),
        }
    }

    pub fn lookup(&self, scope: Scope, name: &str) -> Option<VariableDef> {
        let table = match scope {
            Scope::Stage => &self.stage,
            Scope::Prim => &self.prim,
            Scope::Property => &self.property,
        };

        table.get(name).copied()
    }
}

impl Default for MetaTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata by name, each paired with its list edit qualifier.
pub type MetaMap = BTreeMap<String, (ListEditQual, MetaVariable)>;
pub type PrimMetaMap = MetaMap;

/// Frequently used prim metadata extracted from a [PrimMetaMap].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PrimMetas {
    pub kind: Option<Kind>,
    pub custom_data: Dictionary,
    pub unregistered_strings: Vec<StringData>,
}

impl PrimMetas {
    pub fn from_meta_map(metas: &PrimMetaMap, strings: &[StringData]) -> Result<Self> {
        let kind = match metas.get("kind").and_then(|(_, var)| var.value.as_str()) {
            Some(kind) => Some(Kind::from_str(kind).with_context(|| format!("Invalid kind: {kind}"))?),
            None => None,
        };

        let custom_data = metas
            .get("customData")
            .and_then(|(_, var)| var.value.as_dict())
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            kind,
            custom_data,
            unregistered_strings: strings.to_vec(),
        })
    }
}

/// Layer wide metadata declared right after the magic header.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StageMetas {
    pub sub_layers: Vec<AssetPath>,
    /// Parallel to `sub_layers`.
    pub sub_layer_offsets: Vec<Option<LayerOffset>>,
    pub default_prim: String,
    pub doc: StringData,
    pub comment: StringData,
    pub up_axis: Option<Axis>,
    pub meters_per_unit: Option<f64>,
    pub time_codes_per_second: Option<f64>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub frames_per_second: Option<f64>,
    pub custom_layer_data: Dictionary,
    /// Custom metadata not known to the stage scope.
    pub unregistered: MetaMap,
    pub unregistered_strings: Vec<StringData>,
}

impl StageMetas {
    fn apply(&mut self, name: String, qual: ListEditQual, var: MetaVariable) -> Result<()> {
        let number = |var: &MetaVariable| var.value.as_f64();

        match name.as_str() {
            "doc" => self.doc = string_data(&var.value),
            "comment" => self.comment = string_data(&var.value),
            "defaultPrim" => self.default_prim = var.value.as_str().unwrap_or_default().to_string(),
            "upAxis" => {
                let axis = var.value.as_str().context("upAxis must be a token")?;
                self.up_axis = Some(Axis::from_str(axis).with_context(|| format!("Invalid upAxis: {axis}"))?);
            }
            "metersPerUnit" => self.meters_per_unit = number(&var),
            "timeCodesPerSecond" => self.time_codes_per_second = number(&var),
            "startTimeCode" => self.start_time_code = number(&var),
            "endTimeCode" => self.end_time_code = number(&var),
            "framesPerSecond" => self.frames_per_second = number(&var),
            "customLayerData" => {
                if let Value::Dictionary(dict) = var.value {
                    self.custom_layer_data = dict;
                }
            }
            "subLayers" => match var.value {
                Value::ReferenceVec(layers) => {
                    for layer in layers {
                        self.sub_layers.push(layer.asset_path);
                        self.sub_layer_offsets.push(layer.layer_offset);
                    }
                }
                Value::Blocked => {
                    self.sub_layers.clear();
                    self.sub_layer_offsets.clear();
                }
                other => bail!("Unexpected subLayers value: {:?}", other),
            },
            _ => {
                self.unregistered.insert(name, (qual, var));
            }
        }

        Ok(())
    }
}

fn string_data(value: &Value) -> StringData {
    StringData::new(value.as_str().unwrap_or_default())
}

impl<'a> Parser<'a> {
    /// Optional leading `prepend`, `append`, `add` or `delete`.
    pub(super) fn parse_list_edit_qual(&mut self) -> Result<ListEditQual> {
        let qual = match self.peek_next() {
            Some(Token::Prepend) => ListEditQual::Prepend,
            Some(Token::Append) => ListEditQual::Append,
            Some(Token::Add) => ListEditQual::Add,
            Some(Token::Delete) => ListEditQual::Delete,
            _ => return Ok(ListEditQual::Unqualified),
        };

        self.fetch_next()?;
        Ok(qual)
    }

    /// `'(' { string | [qual] name '=' value | type name '=' value } ')'`
    ///
    /// Entries may be separated by `;`. Bare strings are collected separately.
    pub(super) fn parse_meta_list(&mut self, scope: Scope) -> Result<(MetaMap, Vec<StringData>)> {
        let mut metas = MetaMap::new();
        let mut strings = Vec::new();

        self.ensure_pun('(').context("Metadata must start with (")?;

        loop {
            while self.eat_pun(';')? {}

            if self.eat_pun(')')? {
                break;
            }

            if matches!(self.try_peek()?, Some(Token::String(_))) {
                strings.push(self.fetch_str()?);
                continue;
            }

            let (name, qual, var) = self
                .parse_meta_entry(scope)
                .with_context(|| format!("Unable to parse {} metadata", scope))?;

            ensure!(!metas.contains_key(&name), "Duplicate {} metadata: {}", scope, name);
            metas.insert(name, (qual, var));
        }

        Ok((metas, strings))
    }

    fn parse_meta_entry(&mut self, scope: Scope) -> Result<(String, ListEditQual, MetaVariable)> {
        let qual = self.parse_list_edit_qual()?;

        if qual == ListEditQual::Unqualified {
            if let Some((type_name, ty, name)) = self.attempt(|p| p.parse_typed_meta_header()) {
                let var = self.parse_typed_meta_value(scope, type_name, ty, name)?;
                return Ok((name.to_string(), qual, var));
            }
        }

        let name = self.fetch_identifier()?;
        self.ensure_pun('=')?;

        let Some(def) = self.tables.lookup(scope, name) else {
            ensure!(!self.options.strict, "Unsupported {} metadata: {}", scope, name);

            let raw = self.skip_value()?;
            debug!("Custom {} metadata: {} = {}", scope, name, raw);

            return Ok((name.to_string(), qual, MetaVariable::new("", Value::Unregistered(raw.to_string()))));
        };

        let (qual, var) = self.parse_registered_meta(def, qual)?;
        Ok((name.to_string(), qual, var))
    }

    /// `type name =`
    fn parse_typed_meta_header(&mut self) -> Result<(&'a str, TypeName, &'a str)> {
        let type_name = self.fetch_identifier()?;
        let ty = TypeName::from_str(type_name)?;
        let name = self.fetch_identifier()?;
        self.ensure_pun('=')?;

        Ok((type_name, ty, name))
    }

    /// Value of `type name = value`.
    ///
    /// A recognized key must be declared with its registered type and goes through
    /// the same readers and validator as the untyped form.
    fn parse_typed_meta_value(
        &mut self,
        scope: Scope,
        type_name: &str,
        ty: TypeName,
        name: &str,
    ) -> Result<MetaVariable> {
        if let Some(def) = self.tables.lookup(scope, name) {
            ensure!(
                ty.ty == def.value_type()? && (!ty.array || def.allow_array),
                "{} metadata {} must be declared as {}, got {}",
                scope,
                name,
                def.declared_type,
                type_name
            );

            return Ok(self.parse_registered_meta(def, ListEditQual::Unqualified)?.1);
        }

        ensure!(!self.options.strict, "Unsupported {} metadata: {}", scope, name);

        let value = match self.parse_optional(|p| p.parse_typed_value(ty))? {
            Some(value) => value,
            None => Value::Blocked,
        };

        Ok(MetaVariable::new(type_name, value))
    }

    fn parse_registered_meta(&mut self, def: VariableDef, qual: ListEditQual) -> Result<(ListEditQual, MetaVariable)> {
        // `None` resets any inherited list.
        if self.eat(Token::None)? {
            let qual = if def.allow_array && qual == ListEditQual::Unqualified {
                ListEditQual::ExplicitReset
            } else {
                qual
            };

            return Ok((qual, MetaVariable::new(def.declared_type, Value::Blocked)));
        }

        let var = self
            .parse_meta_value(def)
            .with_context(|| format!("Invalid value for {}", def.name))?;

        Ok((qual, var))
    }

    /// Value of a recognized metadatum, checked by its validator.
    fn parse_meta_value(&mut self, def: VariableDef) -> Result<MetaVariable> {
        let start = self.next_token_start();
        let ty = def.value_type()?;

        let (type_name, value) = match def.name {
            "variants" => (def.declared_type.to_string(), Value::VariantSelection(self.parse_variant_selection()?)),
            "subLayers" => {
                let layers = self.parse_array_with(|p| {
                    let asset_path = p.fetch_asset_path()?;
                    let layer_offset = if p.is_next_pun('(') {
                        Some(p.parse_layer_offset()?)
                    } else {
                        None
                    };

                    Ok(Reference {
                        asset_path,
                        prim_path: None,
                        layer_offset,
                    })
                })?;

                (TypeName::array(ty).to_string(), Value::ReferenceVec(layers))
            }
            _ if def.allow_array => match self.attempt(|p| p.parse_typed_value(TypeName::array(ty))) {
                Some(array) => (TypeName::array(ty).to_string(), array),
                None => (def.declared_type.to_string(), self.parse_value(ty)?),
            },
            _ => (def.declared_type.to_string(), self.parse_value(ty)?),
        };

        let raw = match value.as_str() {
            Some(str) => str.to_string(),
            None => self.stream.slice(start, self.offset()).trim().to_string(),
        };

        match (def.validator)(&raw) {
            Ok(true) => {}
            Ok(false) => bail!("Invalid value for {}: {}", def.name, raw),
            Err(message) => bail!(message),
        }

        if def.name == "apiSchemas" {
            self.check_api_schemas(&value);
        }

        Ok(MetaVariable::new(type_name, value))
    }

    /// Reports API schemas missing from [super::Options::api_schemas].
    fn check_api_schemas(&mut self, value: &Value) {
        let schemas: Vec<String> = value.clone().into();

        for schema in schemas {
            // Multiple-apply schemas carry an instance name: `CollectionAPI:lightLink`.
            let base = schema.split(':').next().unwrap_or_default();
            if self.options.api_schemas.contains(base) {
                continue;
            }

            let message = format!("Unsupported API schema: {}", schema);
            if self.options.strict {
                self.push_error(message);
            } else {
                self.push_warn(message);
            }
        }
    }

    /// `'{' { type name '=' value [';'] } '}'`, names may be quoted.
    pub(super) fn parse_dict(&mut self) -> Result<Dictionary> {
        let mut dict = Dictionary::new();

        self.ensure_pun('{').context("Dictionary must start with {")?;

        loop {
            while self.eat_pun(';')? {}

            if self.eat_pun('}')? {
                break;
            }

            let (name, var) = self.parse_dict_element()?;
            ensure!(!dict.contains_key(&name), "Duplicate dictionary key: {}", name);
            dict.insert(name, var);
        }

        Ok(dict)
    }

    fn parse_dict_element(&mut self) -> Result<(String, MetaVariable)> {
        let type_name = self.fetch_identifier()?;
        let ty = TypeName::from_str(type_name).context("Unable to parse dictionary element type")?;

        let name = match self.fetch_next()? {
            Token::Identifier(name) => name.to_string(),
            // Quoted keys may contain characters not allowed in identifiers.
            Token::String(raw) => string_literal(raw)?.value,
            other => bail!("Dictionary key expected, got {:?}", other),
        };

        self.ensure_pun('=')?;

        let value = self
            .parse_optional(|p| p.parse_typed_value(ty))?
            .unwrap_or(Value::Blocked);

        Ok((name, MetaVariable::new(type_name, value)))
    }

    /// Stage metadata: optional `( ... )` right after the magic header.
    pub(super) fn parse_stage_metas(&mut self) -> Result<()> {
        if !self.is_next_pun('(') {
            return Ok(());
        }

        let (metas, strings) = self.parse_meta_list(Scope::Stage)?;

        for (name, (qual, var)) in metas {
            if self.options.load_state != LoadState::Toplevel && self.options.restricted_stage_metas.contains(&name) {
                bail!(
                    "{} is not allowed to be redefined in a {} layer",
                    name,
                    self.options.load_state
                );
            }

            self.stage_metas.apply(name, qual, var)?;
        }

        self.stage_metas.unregistered_strings.extend(strings);
        Ok(())
    }
}
