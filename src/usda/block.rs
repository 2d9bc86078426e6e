//! Grammar level productions: magic header, prim blocks and properties.

use std::{collections::BTreeMap, str::FromStr};

use anyhow::{bail, ensure, Context, Result};
use tracing::{debug, trace};

use crate::sdf::{self, ListEditQual, Specifier, StringData, TimeSamples, TypeName, Value, Variability};

use super::{
    builder::{Builder, PrimSpec, ROOT_INDEX},
    meta::{MetaMap, Scope},
    parser::Parser,
    token::Token,
    variant::VariantSets,
};

/// Registry key used for prims declared without a type.
pub const TYPELESS_PRIM: &str = "Model";

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub type_name: TypeName,
    pub custom: bool,
    pub variability: Variability,
    /// Qualifier in front of the declaration, applies to `.connect` targets.
    pub list_edit: ListEditQual,
    /// Default value, [Value::Blocked] when assigned `None`.
    pub value: Option<Value>,
    /// Array elements written as `None`, the value holds a default in their place.
    pub blocked_elements: Vec<usize>,
    pub time_samples: Option<TimeSamples>,
    /// `.connect` targets, empty when connected to `None`.
    pub connections: Option<Vec<sdf::Path>>,
    pub metas: MetaMap,
    pub unregistered_strings: Vec<StringData>,
}

impl Attribute {
    pub fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            custom: false,
            variability: Variability::default(),
            list_edit: ListEditQual::default(),
            value: None,
            blocked_elements: Vec::new(),
            time_samples: None,
            connections: None,
            metas: MetaMap::new(),
            unregistered_strings: Vec::new(),
        }
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self.value, Some(Value::Blocked))
    }

    /// Merges `.timeSamples` and `.connect` statements declared for the same attribute.
    fn merge(&mut self, other: Attribute) -> Result<()> {
        ensure!(
            self.type_name == other.type_name,
            "Type mismatch ({} vs {})",
            self.type_name,
            other.type_name
        );

        if let Some(value) = other.value {
            ensure!(self.value.is_none(), "Default value is declared more than once");
            self.value = Some(value);
            self.blocked_elements = other.blocked_elements;
        }

        if let Some(samples) = other.time_samples {
            ensure!(self.time_samples.is_none(), "Time samples are declared more than once");
            self.time_samples = Some(samples);
        }

        if let Some(connections) = other.connections {
            ensure!(self.connections.is_none(), "Connections are declared more than once");
            self.connections = Some(connections);
            self.list_edit = other.list_edit;
        }

        self.custom |= other.custom;

        for (name, meta) in other.metas {
            ensure!(!self.metas.contains_key(&name), "Duplicate attribute metadata: {}", name);
            self.metas.insert(name, meta);
        }
        self.unregistered_strings.extend(other.unregistered_strings);

        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Relation {
    pub custom: bool,
    pub variability: Variability,
    pub list_edit: ListEditQual,
    /// Empty for a bare declaration.
    pub targets: Vec<sdf::Path>,
    /// Assigned `None`.
    pub blocked: bool,
    pub metas: MetaMap,
    pub unregistered_strings: Vec<StringData>,
}

#[derive(Debug, Clone, PartialEq, strum::EnumIs, strum::EnumTryAs)]
pub enum Property {
    Attribute(Attribute),
    Relation(Relation),
}

/// Properties of a prim (or a variant) by name.
pub type Properties = BTreeMap<String, Property>;

/// Contents between the braces of a prim or a variant.
#[derive(Debug, Default)]
pub(super) struct Body {
    pub properties: Properties,
    pub children: Vec<i64>,
    pub variant_sets: VariantSets,
}

impl<'a> Parser<'a> {
    /// Parses the whole buffer, reporting prims to `builder` as their blocks close.
    ///
    /// Hard failures are pushed onto the error stack and returned. Recoverable
    /// problems are left on the diagnostic stacks, see [Parser::error] and [Parser::warning].
    pub fn parse(&mut self, builder: &mut dyn Builder) -> Result<()> {
        let result = self.parse_layer(builder);

        if let Err(err) = &result {
            self.push_error(format!("{err:#}"));
        }

        result
    }

    fn parse_layer(&mut self, builder: &mut dyn Builder) -> Result<()> {
        self.parse_magic_header()?;

        self.parse_stage_metas().context("Unable to parse stage metadata")?;

        builder
            .accept_stage_metas(&self.stage_metas)
            .context("Stage metadata is rejected")?;
        debug!("Accepted stage metadata");

        while let Some(token) = self.try_peek()? {
            ensure!(
                token.is_specifier() || token == Token::Uniform,
                "Prim definition expected at top level, got {:?}",
                token
            );

            self.parse_prim_block(builder, ROOT_INDEX)?;
        }

        Ok(())
    }

    /// `#usda 1.0`, must be the first non whitespace text.
    fn parse_magic_header(&mut self) -> Result<()> {
        while let Some(ch) = self.stream.peek_char() {
            if !ch.is_whitespace() && ch != '\u{feff}' {
                break;
            }

            self.stream.read_char();
        }

        ensure!(self.stream.read_n(5) == Some("#usda"), "Magic header #usda not found");
        ensure!(
            matches!(self.stream.peek_char(), Some(' ' | '\t')),
            "Whitespace expected after #usda"
        );

        let rest = self.stream.rest();
        let line = rest.split('\n').next().unwrap_or_default();

        let version = line.split_whitespace().next().context("Version expected after #usda")?;
        self.version = f32::from_str(version).with_context(|| format!("Invalid version: {}", version))?;

        // Anything after the version till the end of the line is ignored.
        self.stream.seek(self.stream.offset() + line.len())?;

        if self.version != 1.0 {
            self.push_warn(format!("Unsupported version {}, parsing as 1.0", self.version));
        }

        Ok(())
    }

    /// `['uniform'] specifier [type] "name" [( metas )] { body }`, returns the prim index.
    fn parse_prim_block(&mut self, builder: &mut dyn Builder, parent: i64) -> Result<i64> {
        self.eat(Token::Uniform)?;

        let specifier = match self.fetch_next()? {
            Token::Def => Specifier::Def,
            Token::Over => Specifier::Over,
            Token::Class => Specifier::Class,
            other => bail!("Prim specifier expected, got {:?}", other),
        };

        let type_name = match self.peek_next() {
            Some(Token::Identifier(ty)) => {
                self.fetch_next()?;
                ty.to_string()
            }
            _ => String::new(),
        };

        let name = self.fetch_str().context("Prim name expected")?;
        let path = self.current_path().append_child(&name.value)?;
        let display_path = path.to_string();

        let index = builder.assign_prim_index(parent);
        debug!("Entering prim {} ({} {}), index {}", path, specifier, type_name, index);

        self.with_path(path.clone(), |p| {
            let (metas, unregistered_strings) = if p.is_next_pun('(') {
                p.parse_meta_list(Scope::Prim)?
            } else {
                Default::default()
            };

            let body = p.parse_block_body(builder, index)?;

            let spec = PrimSpec {
                name: path.name().to_string(),
                path,
                specifier,
                type_name,
                index,
                parent,
                properties: body.properties,
                metas,
                unregistered_strings,
                children: body.children,
                variant_sets: body.variant_sets,
            };

            p.construct_prim(builder, &spec)
        })
        .with_context(|| format!("Unable to parse prim {}", display_path))?;

        Ok(index)
    }

    fn construct_prim(&mut self, builder: &mut dyn Builder, spec: &PrimSpec) -> Result<()> {
        let key = if spec.type_name.is_empty() {
            TYPELESS_PRIM
        } else {
            spec.type_name.as_str()
        };

        if !builder.has_prim_type(key) {
            // The block is parsed anyway, siblings are not affected.
            self.push_error(format!("Unsupported prim type {} at {}", key, spec.path));
            return Ok(());
        }

        debug!("Constructing prim {} ({})", spec.path, key);

        builder
            .construct_prim(key, spec)
            .with_context(|| format!("Unable to construct {} prim {}", key, spec.path))?;

        builder
            .post_construct_prim(key, &spec.path, spec.index, spec.parent)
            .with_context(|| format!("Post construction of {} failed", spec.path))
    }

    /// `'{' { property | prim | variantSet } '}'`
    pub(super) fn parse_block_body(&mut self, builder: &mut dyn Builder, index: i64) -> Result<Body> {
        let mut body = Body::default();

        self.ensure_pun('{').context("Block must start with {")?;

        loop {
            while self.eat_pun(';')? {}

            match self.try_peek()? {
                Some(Token::Punctuation('}')) => {
                    self.fetch_next()?;
                    break;
                }
                Some(token) if token.is_specifier() => {
                    let child = self.parse_prim_block(builder, index)?;
                    body.children.push(child);
                }
                Some(Token::Uniform) if self.is_uniform_prim() => {
                    let child = self.parse_prim_block(builder, index)?;
                    body.children.push(child);
                }
                Some(Token::VariantSet) => {
                    let (name, set) = self.parse_variant_set(builder, index)?;
                    ensure!(
                        !body.variant_sets.contains_key(&name),
                        "Duplicate variant set: {}",
                        name
                    );
                    body.variant_sets.insert(name, set);
                }
                Some(_) => self.parse_property(&mut body.properties)?,
                None => bail!("Unexpected end of input, block is not closed"),
            }
        }

        Ok(body)
    }

    /// Looks past `uniform` to tell `uniform def ...` from a uniform property.
    fn is_uniform_prim(&mut self) -> bool {
        self.push_parser_state();
        let is_prim = self.fetch_next().is_ok() && self.peek_next().is_some_and(|token| token.is_specifier());
        self.pop_parser_state();

        is_prim
    }

    /// `[qual] [custom] [uniform|varying] (rel name ... | type name ...) [( metas )]`
    fn parse_property(&mut self, properties: &mut Properties) -> Result<()> {
        let list_edit = self.parse_list_edit_qual()?;
        let custom = self.eat(Token::Custom)?;

        let variability = if self.eat(Token::Uniform)? {
            Variability::Uniform
        } else {
            self.eat(Token::Varying)?;
            Variability::Varying
        };

        let (name, property) = if self.eat(Token::Rel)? {
            let (name, mut rel) = self.parse_relation()?;
            rel.custom = custom;
            rel.variability = variability;
            rel.list_edit = list_edit;

            (name, Property::Relation(rel))
        } else {
            let (name, mut attr) = self.parse_attribute()?;
            attr.custom = custom;
            attr.variability = variability;
            attr.list_edit = list_edit;

            (name, Property::Attribute(attr))
        };

        let path = self.current_path().append_property(&name)?;
        trace!("Parsed property {}", path);

        match (properties.get_mut(&name), property) {
            (None, property) => {
                properties.insert(name, property);
            }
            (Some(Property::Attribute(existing)), Property::Attribute(attr)) => {
                existing
                    .merge(attr)
                    .with_context(|| format!("Unable to merge attribute {}", path))?;
            }
            _ => bail!("Duplicate property: {}", path),
        }

        Ok(())
    }

    fn parse_relation(&mut self) -> Result<(String, Relation)> {
        let name = self.fetch_identifier()?;
        ensure!(
            sdf::Path::is_valid_namespace_identifier(name),
            "Invalid relationship name: {}",
            name
        );

        let mut rel = Relation::default();

        if self.eat_pun('=')? {
            if self.eat(Token::None)? {
                rel.blocked = true;
            } else {
                rel.targets = self.parse_targets().with_context(|| format!("Invalid targets of {}", name))?;
            }
        }

        if self.is_next_pun('(') {
            (rel.metas, rel.unregistered_strings) = self.parse_meta_list(Scope::Property)?;
        }

        Ok((name.to_string(), rel))
    }

    /// `<path>` or `[<path>, ...]`
    fn parse_targets(&mut self) -> Result<Vec<sdf::Path>> {
        if let Some(path) = self.attempt(Self::fetch_path) {
            return Ok(vec![path]);
        }

        self.parse_array_with(Self::fetch_path)
    }

    fn parse_attribute(&mut self) -> Result<(String, Attribute)> {
        let type_text = self.fetch_identifier()?;
        let type_name = TypeName::from_str(type_text)?;
        ensure!(
            type_name.ty.is_attribute_type(),
            "{} can't be used as an attribute type",
            type_name
        );

        let full_name = self.fetch_identifier()?;
        let (name, suffix) = match full_name.split_once('.') {
            Some((name, suffix)) => (name, Some(suffix)),
            None => (full_name, None),
        };

        ensure!(
            sdf::Path::is_valid_namespace_identifier(name),
            "Invalid attribute name: {}",
            name
        );

        let mut attr = Attribute::new(type_name);

        match suffix {
            None => {
                if self.eat_pun('=')? {
                    attr.value = Some(if self.eat(Token::None)? {
                        Value::Blocked
                    } else if type_name.array {
                        let (value, blocked) = self.parse_array_value(type_name.ty)?;
                        attr.blocked_elements = blocked;
                        value
                    } else {
                        self.parse_value(type_name.ty)?
                    });
                }
            }
            Some("timeSamples") => {
                self.ensure_pun('=')?;

                let samples = if type_name.array {
                    self.parse_time_samples_of_array(type_name.ty)?
                } else {
                    self.parse_time_samples(type_name.ty)?
                };

                attr.time_samples = Some(samples);
            }
            Some("connect") => {
                self.ensure_pun('=')?;

                let targets = if self.eat(Token::None)? {
                    Vec::new()
                } else {
                    self.parse_targets()?
                };

                attr.connections = Some(targets);
            }
            Some(other) => bail!("Unsupported attribute suffix: .{}", other),
        }

        if self.is_next_pun('(') {
            (attr.metas, attr.unregistered_strings) = self.parse_meta_list(Scope::Property)?;
        }

        Ok((name.to_string(), attr))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, fs, rc::Rc};

    use super::*;
    use crate::usda::{builder::Callbacks, meta::StageMetas, LoadState, Options};

    /// Records construction events in order.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        prims: Vec<PrimSpec>,
        next_index: i64,
    }

    impl Builder for Recorder {
        fn assign_prim_index(&mut self, _parent: i64) -> i64 {
            let index = self.next_index;
            self.next_index += 1;
            index
        }

        fn accept_stage_metas(&mut self, _metas: &StageMetas) -> Result<()> {
            self.events.push("stage".into());
            Ok(())
        }

        fn has_prim_type(&self, _ty: &str) -> bool {
            true
        }

        fn construct_prim(&mut self, ty: &str, spec: &PrimSpec) -> Result<()> {
            self.events
                .push(format!("construct {} {} {} {}", ty, spec.path, spec.index, spec.parent));
            self.prims.push(spec.clone());
            Ok(())
        }

        fn post_construct_prim(&mut self, _ty: &str, path: &sdf::Path, index: i64, parent: i64) -> Result<()> {
            self.events.push(format!("post {} {} {}", path, index, parent));
            Ok(())
        }
    }

    fn parse(input: &str) -> Result<(Parser, Recorder)> {
        let mut recorder = Recorder::default();
        let mut parser = Parser::new(input);
        parser.parse(&mut recorder)?;

        Ok((parser, recorder))
    }

    fn attribute<'p>(spec: &'p PrimSpec, name: &str) -> &'p Attribute {
        match &spec.properties[name] {
            Property::Attribute(attr) => attr,
            Property::Relation(_) => panic!("{} is a relationship", name),
        }
    }

    #[test]
    fn construction_order() -> Result<()> {
        let (_, recorder) = parse(
            r#"#usda 1.0
            def "A" {
                def "B" {
                }
            }
            def Xform "C" {
            }
            "#,
        )?;

        assert_eq!(
            recorder.events,
            vec![
                "stage",
                "construct Model /A/B 1 0",
                "post /A/B 1 0",
                "construct Model /A 0 -1",
                "post /A 0 -1",
                "construct Xform /C 2 -1",
                "post /C 2 -1",
            ]
        );

        let a = &recorder.prims[1];
        assert_eq!(a.children, vec![1]);
        assert_eq!(a.type_name, "");

        Ok(())
    }

    #[test]
    fn magic_header() {
        assert!(parse("#usda 1.0").is_ok());
        assert!(parse("\u{feff}\n  #usda 1.0\n(\n)").is_ok());
        // The rest of the header line is ignored, so the stage metadata must start below it.
        assert!(parse("#usda 1.0 (\n    upAxis = \"Z\"\n)").is_err());
        assert!(parse("#usd 1.0").is_err());
        assert!(parse("#usda1.0").is_err());
        assert!(parse("#usda x").is_err());
        assert!(parse("def \"A\" {}").is_err());

        let (parser, _) = parse("#usda 1.1").unwrap();
        assert_eq!(parser.version(), 1.1);
        assert!(parser.warning().contains("Unsupported version"));
    }

    #[test]
    fn parse_attributes() -> Result<()> {
        let (parser, recorder) = parse(
            r#"#usda 1.0
            def Mesh "Mesh" {
                float3 p = (1, 2, 3)
                float[] a = [1, 2, None, 4]
                uniform token[] xformOpOrder = ["xformOp:translate"]
                custom double userValue
                float radius = None
                point3f[] points = [(0, 0, 0), (1, 0, 0),] (
                    interpolation = "vertex"
                )
                double3 xformOp:translate.timeSamples = {
                    0: (0, 0, 0),
                    10: None,
                }
                color3f inputs:color.connect = </Mat/Tex.outputs:rgb>
                matrix4d xformOp:transform = ((1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (0, 0, 0, 1))
            }
            "#,
        )?;

        assert_eq!(parser.error(), "");

        let mesh = &recorder.prims[0];

        assert_eq!(attribute(mesh, "p").value, Some(Value::Float3([1.0, 2.0, 3.0])));

        let a = attribute(mesh, "a");
        assert_eq!(a.value, Some(Value::FloatVec(vec![1.0, 2.0, 0.0, 4.0])));
        assert_eq!(a.blocked_elements, vec![2]);

        let order = attribute(mesh, "xformOpOrder");
        assert_eq!(order.variability, Variability::Uniform);
        assert_eq!(order.type_name, TypeName::array(sdf::ValueType::Token));

        let user = attribute(mesh, "userValue");
        assert!(user.custom);
        assert!(user.value.is_none());

        assert!(attribute(mesh, "radius").is_blocked());

        let points = attribute(mesh, "points");
        assert_eq!(points.value, Some(Value::Float3Vec(vec![[0.0; 3], [1.0, 0.0, 0.0]])));
        assert!(points.metas.contains_key("interpolation"));

        let translate = attribute(mesh, "xformOp:translate");
        let samples = translate.time_samples.as_ref().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples.samples[1], (10.0, None));

        let color = attribute(mesh, "inputs:color");
        assert_eq!(color.connections, Some(vec![sdf::path("/Mat/Tex.outputs:rgb")?]));

        assert!(matches!(
            attribute(mesh, "xformOp:transform").value,
            Some(Value::Matrix4d(_))
        ));

        Ok(())
    }

    #[test]
    fn merge_attribute_statements() -> Result<()> {
        let (_, recorder) = parse(
            r#"#usda 1.0
            def "A" {
                float a = 1
                float a.timeSamples = { 1: 2 }
                float a.connect = </B.out>
            }
            "#,
        )?;

        let a = attribute(&recorder.prims[0], "a");
        assert_eq!(a.value, Some(Value::Float(1.0)));
        assert_eq!(a.time_samples.as_ref().map(TimeSamples::len), Some(1));
        assert_eq!(a.connections.as_ref().map(Vec::len), Some(1));

        #[rustfmt::skip]
        let cases = [
            "float a = 1\n float a = 2",
            "float a = 1\n double a.timeSamples = { 1: 2 }",
            "float a = 1\n rel a",
            "rel a\n rel a",
        ];

        for body in cases {
            let input = format!("#usda 1.0\ndef \"A\" {{\n{}\n}}", body);
            assert!(parse(&input).is_err(), "{}", body);
        }

        Ok(())
    }

    #[test]
    fn parse_relationships() -> Result<()> {
        let (_, recorder) = parse(
            r#"#usda 1.0
            def "A" {
                rel material:binding = </Materials/Red>
                prepend rel proxyPrim = [</B>, </C>,]
                custom uniform rel empty
                rel blocked = None (
                    doc = "Blocked"
                )
            }
            "#,
        )?;

        let rels = &recorder.prims[0].properties;
        let rel = |name: &str| rels[name].clone().try_as_relation().unwrap();

        assert_eq!(rel("material:binding").targets, vec![sdf::path("/Materials/Red")?]);

        let proxy = rel("proxyPrim");
        assert_eq!(proxy.list_edit, ListEditQual::Prepend);
        assert_eq!(proxy.targets.len(), 2);

        let empty = rel("empty");
        assert!(empty.custom);
        assert_eq!(empty.variability, Variability::Uniform);
        assert!(empty.targets.is_empty());

        let blocked = rel("blocked");
        assert!(blocked.blocked);
        assert!(blocked.metas.contains_key("doc"));

        Ok(())
    }

    #[test]
    fn unknown_prim_type_is_recoverable() -> Result<()> {
        let constructed = Rc::new(RefCell::new(Vec::new()));

        let mut callbacks = Callbacks::new();
        let sink = constructed.clone();
        callbacks.register_prim_construct("Xform", move |spec| {
            sink.borrow_mut().push(spec.path.to_string());
            Ok(())
        });

        let mut parser = Parser::new(
            r#"#usda 1.0
            def Xform "A" {
                def Unknown "B" {
                    float x = 1
                }
                def Xform "C" {
                }
            }
            "#,
        );

        parser.parse(&mut callbacks)?;

        assert_eq!(*constructed.borrow(), vec!["/A/C", "/A"]);
        assert_eq!(parser.diagnostics().errors().len(), 1);
        assert!(parser.error().contains("Unsupported prim type Unknown at /A/B"));

        Ok(())
    }

    #[test]
    fn path_stack_survives_failures() {
        let mut parser = Parser::new(
            r#"#usda 1.0
            def "A" {
                def "B" {
                    float x = (1, 2)
                }
            }
            "#,
        );

        let mut recorder = Recorder::default();
        assert!(parser.parse(&mut recorder).is_err());
        assert_eq!(parser.path_depth(), 0);

        // The cause is reported with its location.
        let error = parser.error();
        assert!(error.starts_with("4:"), "{}", error);
        assert!(error.contains("/A"));
    }

    #[test]
    fn rejected_stage_metas_abort() {
        let mut callbacks = Callbacks::new();
        callbacks.register_prim_construct("Model", |_| bail!("Must not be called"));
        callbacks.register_stage_metas(|metas| {
            ensure!(metas.up_axis.is_some(), "upAxis is required");
            Ok(())
        });

        let mut parser = Parser::new("#usda 1.0\ndef \"A\" {}");
        assert!(parser.parse(&mut callbacks).is_err());
        assert!(parser.error().contains("upAxis is required"));
    }

    #[test]
    fn uniform_prefix() -> Result<()> {
        let (_, recorder) = parse(
            r#"#usda 1.0
            uniform def "A" {
                uniform float x = 1
                uniform def "B" {}
            }
            "#,
        )?;

        assert_eq!(recorder.prims.len(), 2);
        assert_eq!(attribute(&recorder.prims[1], "x").variability, Variability::Uniform);

        Ok(())
    }

    #[test]
    fn variant_children() -> Result<()> {
        let (_, recorder) = parse(
            r#"#usda 1.0
            def Xform "Prim" (
                variants = {
                    string style = "red"
                }
                prepend variantSets = "style"
            ) {
                variantSet "style" = {
                    "red" {
                        def Sphere "Ball" {}
                    }
                    "blue" {
                        float size = 2
                    }
                }
            }
            "#,
        )?;

        let ball = &recorder.prims[0];
        assert_eq!(ball.path.as_str(), "/Prim{style=red}Ball");
        assert_eq!(ball.name, "Ball");
        assert_eq!(ball.parent, 0);

        let prim = &recorder.prims[1];
        assert_eq!(prim.name, "Prim");
        let style = &prim.variant_sets["style"];
        assert_eq!(style["red"].child_prim_indices, vec![ball.index]);
        assert!(style["blue"].properties.contains_key("size"));

        let (qual, _) = &prim.metas["variantSets"];
        assert_eq!(*qual, ListEditQual::Prepend);

        Ok(())
    }

    #[test]
    fn load_state_gating() {
        let input = "#usda 1.0\n( metersPerUnit = 0.01 )\n";

        let options = Options::default()
            .with_load_state(LoadState::Payload)
            .with_restricted_stage_metas(["metersPerUnit"]);

        let mut recorder = Recorder::default();
        let mut parser = Parser::with_options(input, options);
        assert!(parser.parse(&mut recorder).is_err());
        assert!(parser.error().contains("metersPerUnit is not allowed"));
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn parse_payload_fixture() -> Result<()> {
        let data = fs::read_to_string("fixtures/payload.usda")?;
        let (parser, recorder) = parse(&data)?;

        assert_eq!(parser.error(), "");
        assert_eq!(recorder.prims.len(), 2);

        let (qual, var) = &recorder.prims[1].metas["payload"];
        assert_eq!(*qual, ListEditQual::Prepend);

        let Value::Reference(payload) = &var.value else {
            panic!("Expected a single payload reference");
        };
        assert_eq!(payload.asset_path.path, "./cube_payload.usda");
        assert_eq!(payload.prim_path, Some(sdf::path("/PayloadCube")?));

        Ok(())
    }

    #[test]
    fn parse_scene_fixture() -> Result<()> {
        let data = fs::read_to_string("fixtures/scene.usda")?;
        let (parser, recorder) = parse(&data)?;

        assert_eq!(parser.error(), "");
        assert_eq!(parser.stage_metas().default_prim, "World");
        assert_eq!(parser.stage_metas().up_axis, Some(sdf::Axis::Y));

        let paths = recorder.prims.iter().map(|prim| prim.path.as_str()).collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![
                "/World/Geom/Cube",
                "/World/Geom{lod=high}Detail",
                "/World/Geom",
                "/World/Looks/Red",
                "/World/Looks",
                "/World",
            ]
        );

        let world = recorder.prims.last().unwrap();
        assert_eq!(world.prim_metas()?.kind, Some(sdf::Kind::Assembly));

        Ok(())
    }
}
