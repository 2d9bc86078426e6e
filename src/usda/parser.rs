//! Recursive descent parser core.
//!
//! Token access, backtracking, and readers for the closed set of value kinds.
//! Grammar level productions live in sibling modules as further `impl Parser` blocks.

use std::{any::type_name, fmt::Debug, ops::Range};

use anyhow::{anyhow, bail, ensure, Context, Result};
use half::f16;
use logos::Logos;
use num_traits::Float;
use tracing::{trace, warn};

use crate::sdf::{self, AssetPath, LayerOffset, Reference, StringData, TypeName, Value, ValueType};

use super::{
    diag::{Diagnostic, Diagnostics},
    meta::{MetaTables, StageMetas},
    stream::Stream,
    token::{trim_chars, Token},
    Options,
};

/// Snapshot of the stream position, see [Parser::push_parser_state].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseState {
    offset: usize,
}

impl ParseState {
    #[inline]
    pub fn offset(self) -> usize {
        self.offset
    }
}

/// Parser translates USDA text into construction events.
///
/// One instance parses one buffer. Tables of recognized metadata are built in
/// the constructor and never change afterwards.
pub struct Parser<'a> {
    pub(super) stream: Stream<'a>,
    pub(super) options: Options,
    pub(super) tables: MetaTables,
    pub(super) version: f32,
    pub(super) stage_metas: StageMetas,
    diag: Diagnostics,
    states: Vec<ParseState>,
    path_stack: Vec<sdf::Path>,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a str) -> Self {
        Self::with_options(data, Options::default())
    }

    pub fn with_options(data: &'a str, options: Options) -> Self {
        Self {
            stream: Stream::new(data),
            options,
            tables: MetaTables::new(),
            version: 0.0,
            stage_metas: StageMetas::default(),
            diag: Diagnostics::default(),
            states: Vec::new(),
            path_stack: Vec::new(),
        }
    }

    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Version from the magic header, valid after [Parser::parse].
    #[inline]
    pub fn version(&self) -> f32 {
        self.version
    }

    /// Stage metadata, valid after [Parser::parse].
    #[inline]
    pub fn stage_metas(&self) -> &StageMetas {
        &self.stage_metas
    }

    // -- Diagnostics

    pub fn push_error(&mut self, message: impl Into<String>) {
        let cursor = self.stream.cursor();
        self.diag.push_error(message, cursor);
    }

    /// Cancels the most recent error.
    pub fn pop_error(&mut self) -> Option<Diagnostic> {
        self.diag.pop_error()
    }

    pub fn push_warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);

        let cursor = self.stream.cursor();
        self.diag.push_warn(message, cursor);
    }

    /// Cancels the most recent warning.
    pub fn pop_warn(&mut self) -> Option<Diagnostic> {
        self.diag.pop_warn()
    }

    #[inline]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Accumulated errors, oldest first.
    pub fn error(&self) -> String {
        self.diag.error_report()
    }

    /// Accumulated warnings, oldest first.
    pub fn warning(&self) -> String {
        self.diag.warning_report()
    }

    // -- Backtracking

    #[inline]
    pub fn offset(&self) -> usize {
        self.stream.offset()
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.stream.seek(pos)
    }

    pub fn push_parser_state(&mut self) {
        self.states.push(ParseState {
            offset: self.stream.offset(),
        });
    }

    /// Restores the most recent snapshot, moving the stream back to it.
    pub fn pop_parser_state(&mut self) -> Option<ParseState> {
        let state = self.states.pop()?;
        self.stream.seek(state.offset).ok()?;
        Some(state)
    }

    /// Releases the most recent snapshot without moving the stream.
    pub fn discard_parser_state(&mut self) -> Option<ParseState> {
        self.states.pop()
    }

    /// Ordered alternative: runs `production` and, on failure, rewinds the
    /// stream and forgets every diagnostic it pushed.
    pub fn attempt<T>(&mut self, production: impl FnOnce(&mut Self) -> Result<T>) -> Option<T> {
        self.push_parser_state();
        let depth = self.diag.depth();

        match production(self) {
            Ok(value) => {
                self.discard_parser_state();
                Some(value)
            }
            Err(err) => {
                trace!("Backtracking from offset {}: {:#}", self.stream.offset(), err);
                self.pop_parser_state();
                self.diag.truncate(depth);
                None
            }
        }
    }

    // -- Path stack

    /// Runs `f` with `path` pushed on the path stack, popping it on every exit path.
    pub(super) fn with_path<T>(&mut self, path: sdf::Path, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.path_stack.push(path);
        let result = f(self);
        self.path_stack.pop();

        result
    }

    pub fn current_path(&self) -> sdf::Path {
        self.path_stack.last().cloned().unwrap_or_else(sdf::Path::abs_root)
    }

    #[inline]
    pub fn path_depth(&self) -> usize {
        self.path_stack.len()
    }

    // -- Tokens

    /// Lexes one token at the current offset without consuming it.
    fn lex(&self) -> Result<Option<(Token<'a>, Range<usize>)>> {
        let rest = self.stream.rest();
        let base = self.stream.offset();

        let mut lexer = Token::lexer(rest);
        match lexer.next() {
            None => Ok(None),
            Some(Ok(token)) => {
                let span = lexer.span();
                Ok(Some((token, base + span.start..base + span.end)))
            }
            Some(Err(_)) => {
                let near = rest[lexer.span().start..].chars().take(24).collect::<String>();
                bail!("Unable to parse token near {:?}", near)
            }
        }
    }

    #[inline]
    pub(super) fn peek_next(&self) -> Option<Token<'a>> {
        self.lex().ok().flatten().map(|(token, _)| token)
    }

    /// Like [Self::peek_next], but reports lexer errors.
    pub(super) fn try_peek(&self) -> Result<Option<Token<'a>>> {
        Ok(self.lex()?.map(|(token, _)| token))
    }

    pub(super) fn fetch_next(&mut self) -> Result<Token<'a>> {
        let (token, span) = self.lex()?.context("Unexpected end of input")?;
        self.stream.seek(span.end)?;

        Ok(token)
    }

    /// Offset where the next token starts (after whitespace and comments).
    pub(super) fn next_token_start(&self) -> usize {
        match self.lex() {
            Ok(Some((_, span))) => span.start,
            _ => self.stream.offset(),
        }
    }

    pub(super) fn ensure_pun(&mut self, value: char) -> Result<()> {
        let next = self.fetch_next()?;
        ensure!(
            next == Token::Punctuation(value),
            "Unexpected token (want: '{}', got: {:?})",
            value,
            next
        );

        Ok(())
    }

    #[inline]
    pub(super) fn is_next_pun(&self, value: char) -> bool {
        self.peek_next() == Some(Token::Punctuation(value))
    }

    /// Consumes `token` if it's next.
    pub(super) fn eat(&mut self, token: Token) -> Result<bool> {
        if self.peek_next() == Some(token) {
            self.fetch_next()?;
            return Ok(true);
        }

        Ok(false)
    }

    #[inline]
    pub(super) fn eat_pun(&mut self, value: char) -> Result<bool> {
        self.eat(Token::Punctuation(value))
    }

    pub(super) fn fetch_identifier(&mut self) -> Result<&'a str> {
        match self.fetch_next()? {
            Token::Identifier(name) => Ok(name),
            other => bail!("Identifier expected, got {:?}", other),
        }
    }

    pub fn fetch_str(&mut self) -> Result<StringData> {
        match self.fetch_next()? {
            Token::String(raw) => string_literal(raw),
            other => bail!("Quoted string expected, got {:?}", other),
        }
    }

    pub fn fetch_asset_path(&mut self) -> Result<AssetPath> {
        match self.fetch_next()? {
            Token::AssetRef(raw) => asset_path(raw),
            other => bail!("Asset path expected, got {:?}", other),
        }
    }

    pub fn fetch_path(&mut self) -> Result<sdf::Path> {
        match self.fetch_next()? {
            Token::PathRef(path) => sdf::Path::new(path),
            other => bail!("Path expected, got {:?}", other),
        }
    }

    // -- Basic types

    /// Parse single number-like token as `T`, accepting `inf`, `-inf` and `nan` for floating point kinds.
    pub fn parse_scalar<T: Scalar>(&mut self) -> Result<T> {
        let (signed, negative, token) = match self.fetch_next()? {
            Token::Punctuation(sign @ ('-' | '+')) => (true, sign == '-', self.fetch_next()?),
            token => (false, false, token),
        };

        match token {
            Token::Number(lexeme) if !signed => T::from_lexeme(lexeme)
                .with_context(|| format!("Failed to parse {} from '{}'", type_name::<T>(), lexeme)),
            Token::Inf | Token::Nan => T::non_finite(token == Token::Nan, negative)
                .with_context(|| format!("{} can't hold non-finite values", type_name::<T>())),
            other => bail!("Expected {} number, got {:?}", type_name::<T>(), other),
        }
    }

    pub fn parse_bool(&mut self) -> Result<bool> {
        match self.fetch_next()? {
            Token::Identifier("true") | Token::Number("1") => Ok(true),
            Token::Identifier("false") | Token::Number("0") => Ok(false),
            other => bail!("Expected bool, got {:?}", other),
        }
    }

    /// `None` yields an empty result, otherwise `read` must succeed.
    pub fn parse_optional<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        if self.eat(Token::None)? {
            return Ok(None);
        }

        read(self).map(Some)
    }

    /// One or more elements separated by `sep`.
    ///
    /// A trailing separator right before `end` is allowed. The terminator itself is not consumed.
    pub fn sep_by1<T>(&mut self, sep: char, end: char, mut read: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut items = vec![read(self)?];

        while self.eat_pun(sep)? {
            if self.is_next_pun(end) {
                break;
            }

            items.push(read(self)?);
        }

        Ok(items)
    }

    /// `'(' value (',' value)* ')'` with exactly `N` values.
    pub fn parse_tuple_with<T, const N: usize>(&mut self, read: impl FnMut(&mut Self) -> Result<T>) -> Result<[T; N]> {
        self.ensure_pun('(').context("Tuples must start with (")?;
        let items = self.sep_by1(',', ')', read)?;
        self.ensure_pun(')').context("Tuples must be closed with )")?;

        let len = items.len();
        items
            .try_into()
            .map_err(|_| anyhow!("Expected {} tuple elements, got {}", N, len))
    }

    pub fn parse_tuple<T: Scalar, const N: usize>(&mut self) -> Result<[T; N]> {
        self.parse_tuple_with(Self::parse_scalar::<T>)
    }

    /// Matrices are written as a tuple of row tuples.
    pub fn parse_matrix<const N: usize>(&mut self) -> Result<[[f64; N]; N]> {
        self.parse_tuple_with(Self::parse_tuple::<f64, N>)
    }

    /// `'[' [value (',' value)* [',']] ']'`
    pub fn parse_array_with<T>(&mut self, read: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.ensure_pun('[').context("Array must start with [")?;

        // Special case - empty array like []
        if self.eat_pun(']')? {
            return Ok(Vec::new());
        }

        let items = self.sep_by1(',', ']', read)?;
        self.ensure_pun(']').context("Array must be closed with ]")?;

        Ok(items)
    }

    pub fn parse_array<T: Scalar>(&mut self) -> Result<Vec<T>> {
        self.parse_array_with(Self::parse_scalar::<T>)
    }

    pub fn parse_tuple_array<T: Scalar, const N: usize>(&mut self) -> Result<Vec<[T; N]>> {
        self.parse_array_with(Self::parse_tuple::<T, N>)
    }

    /// Array where every element may independently be `None`.
    pub fn parse_optional_array<T>(&mut self, mut read: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<Option<T>>> {
        self.parse_array_with(|p| p.parse_optional(&mut read))
    }

    // -- Type dispatch

    /// Reads a single value of the given kind.
    pub fn parse_value(&mut self, ty: ValueType) -> Result<Value> {
        let value = match ty {
            ValueType::Bool => Value::Bool(self.parse_bool()?),
            ValueType::Uchar => Value::Uchar(self.parse_scalar()?),

            // Ints
            ValueType::Int => Value::Int(self.parse_scalar()?),
            ValueType::Int2 => Value::Int2(self.parse_tuple()?),
            ValueType::Int3 => Value::Int3(self.parse_tuple()?),
            ValueType::Int4 => Value::Int4(self.parse_tuple()?),
            ValueType::Uint => Value::Uint(self.parse_scalar()?),
            ValueType::Uint2 => Value::Uint2(self.parse_tuple()?),
            ValueType::Uint3 => Value::Uint3(self.parse_tuple()?),
            ValueType::Uint4 => Value::Uint4(self.parse_tuple()?),
            ValueType::Int64 => Value::Int64(self.parse_scalar()?),
            ValueType::Uint64 => Value::Uint64(self.parse_scalar()?),

            // Half
            ValueType::Half => Value::Half(self.parse_scalar()?),
            ValueType::Half2 | ValueType::TexCoord2h => Value::Half2(self.parse_tuple()?),
            ValueType::Half3
            | ValueType::Point3h
            | ValueType::Vector3h
            | ValueType::Normal3h
            | ValueType::Color3h
            | ValueType::TexCoord3h => Value::Half3(self.parse_tuple()?),
            ValueType::Half4 | ValueType::Quath | ValueType::Color4h => Value::Half4(self.parse_tuple()?),

            // Float
            ValueType::Float => Value::Float(self.parse_scalar()?),
            ValueType::Float2 | ValueType::TexCoord2f => Value::Float2(self.parse_tuple()?),
            ValueType::Float3
            | ValueType::Point3f
            | ValueType::Vector3f
            | ValueType::Normal3f
            | ValueType::Color3f
            | ValueType::TexCoord3f => Value::Float3(self.parse_tuple()?),
            ValueType::Float4 | ValueType::Quatf | ValueType::Color4f => Value::Float4(self.parse_tuple()?),

            // Double
            ValueType::Double | ValueType::TimeCode => Value::Double(self.parse_scalar()?),
            ValueType::Double2 | ValueType::TexCoord2d => Value::Double2(self.parse_tuple()?),
            ValueType::Double3
            | ValueType::Point3d
            | ValueType::Vector3d
            | ValueType::Normal3d
            | ValueType::Color3d
            | ValueType::TexCoord3d => Value::Double3(self.parse_tuple()?),
            ValueType::Double4 | ValueType::Quatd | ValueType::Color4d => Value::Double4(self.parse_tuple()?),

            ValueType::Matrix2d => Value::Matrix2d(self.parse_matrix()?),
            ValueType::Matrix3d => Value::Matrix3d(self.parse_matrix()?),
            ValueType::Matrix4d => Value::Matrix4d(self.parse_matrix()?),

            ValueType::String => Value::String(self.fetch_str()?.value),
            ValueType::Token => Value::Token(self.fetch_str()?.value),
            ValueType::Asset => Value::AssetPath(self.fetch_asset_path()?),
            ValueType::Path => Value::Path(self.fetch_path()?),
            ValueType::Reference => Value::Reference(self.parse_reference()?),
            ValueType::Dictionary => Value::Dictionary(self.parse_dict()?),
        };

        Ok(value)
    }

    /// Optional form of [Self::parse_value], `None` yields an empty result.
    pub fn parse_optional_value(&mut self, ty: ValueType) -> Result<Option<Value>> {
        self.parse_optional(|p| p.parse_value(ty))
    }

    /// Reads an array of the given kind.
    ///
    /// Elements may be `None`, their positions are returned next to the value
    /// and the value holds `T::default()` in their place.
    pub fn parse_array_value(&mut self, ty: ValueType) -> Result<(Value, Vec<usize>)> {
        let parsed = match ty {
            ValueType::Bool => self.read_array(Self::parse_bool, Value::BoolVec)?,
            ValueType::Uchar => self.read_array(Self::parse_scalar::<u8>, Value::UcharVec)?,

            // Ints
            ValueType::Int => self.read_array(Self::parse_scalar::<i32>, Value::IntVec)?,
            ValueType::Int2 => self.read_array(Self::parse_tuple::<i32, 2>, Value::Int2Vec)?,
            ValueType::Int3 => self.read_array(Self::parse_tuple::<i32, 3>, Value::Int3Vec)?,
            ValueType::Int4 => self.read_array(Self::parse_tuple::<i32, 4>, Value::Int4Vec)?,
            ValueType::Uint => self.read_array(Self::parse_scalar::<u32>, Value::UintVec)?,
            ValueType::Uint2 => self.read_array(Self::parse_tuple::<u32, 2>, Value::Uint2Vec)?,
            ValueType::Uint3 => self.read_array(Self::parse_tuple::<u32, 3>, Value::Uint3Vec)?,
            ValueType::Uint4 => self.read_array(Self::parse_tuple::<u32, 4>, Value::Uint4Vec)?,
            ValueType::Int64 => self.read_array(Self::parse_scalar::<i64>, Value::Int64Vec)?,
            ValueType::Uint64 => self.read_array(Self::parse_scalar::<u64>, Value::Uint64Vec)?,

            // Half
            ValueType::Half => self.read_array(Self::parse_scalar::<f16>, Value::HalfVec)?,
            ValueType::Half2 | ValueType::TexCoord2h => {
                self.read_array(Self::parse_tuple::<f16, 2>, Value::Half2Vec)?
            }
            ValueType::Half3
            | ValueType::Point3h
            | ValueType::Vector3h
            | ValueType::Normal3h
            | ValueType::Color3h
            | ValueType::TexCoord3h => self.read_array(Self::parse_tuple::<f16, 3>, Value::Half3Vec)?,
            ValueType::Half4 | ValueType::Quath | ValueType::Color4h => {
                self.read_array(Self::parse_tuple::<f16, 4>, Value::Half4Vec)?
            }

            // Float
            ValueType::Float => self.read_array(Self::parse_scalar::<f32>, Value::FloatVec)?,
            ValueType::Float2 | ValueType::TexCoord2f => {
                self.read_array(Self::parse_tuple::<f32, 2>, Value::Float2Vec)?
            }
            ValueType::Float3
            | ValueType::Point3f
            | ValueType::Vector3f
            | ValueType::Normal3f
            | ValueType::Color3f
            | ValueType::TexCoord3f => self.read_array(Self::parse_tuple::<f32, 3>, Value::Float3Vec)?,
            ValueType::Float4 | ValueType::Quatf | ValueType::Color4f => {
                self.read_array(Self::parse_tuple::<f32, 4>, Value::Float4Vec)?
            }

            // Double
            ValueType::Double | ValueType::TimeCode => self.read_array(Self::parse_scalar::<f64>, Value::DoubleVec)?,
            ValueType::Double2 | ValueType::TexCoord2d => {
                self.read_array(Self::parse_tuple::<f64, 2>, Value::Double2Vec)?
            }
            ValueType::Double3
            | ValueType::Point3d
            | ValueType::Vector3d
            | ValueType::Normal3d
            | ValueType::Color3d
            | ValueType::TexCoord3d => self.read_array(Self::parse_tuple::<f64, 3>, Value::Double3Vec)?,
            ValueType::Double4 | ValueType::Quatd | ValueType::Color4d => {
                self.read_array(Self::parse_tuple::<f64, 4>, Value::Double4Vec)?
            }

            ValueType::Matrix2d => self.read_array(Self::parse_matrix::<2>, Value::Matrix2dVec)?,
            ValueType::Matrix3d => self.read_array(Self::parse_matrix::<3>, Value::Matrix3dVec)?,
            ValueType::Matrix4d => self.read_array(Self::parse_matrix::<4>, Value::Matrix4dVec)?,

            ValueType::String => self.read_array(|p: &mut Self| Ok(p.fetch_str()?.value), Value::StringVec)?,
            ValueType::Token => self.read_array(|p: &mut Self| Ok(p.fetch_str()?.value), Value::TokenVec)?,
            ValueType::Asset => self.read_array(Self::fetch_asset_path, Value::AssetPathVec)?,
            ValueType::Path => self.read_array(Self::fetch_path, Value::PathVec)?,
            ValueType::Reference => self.read_array(Self::parse_reference, Value::ReferenceVec)?,
            ValueType::Dictionary => bail!("Arrays of dictionaries are not supported"),
        };

        Ok(parsed)
    }

    fn read_array<T: Default>(
        &mut self,
        read: impl FnMut(&mut Self) -> Result<T>,
        wrap: impl FnOnce(Vec<T>) -> Value,
    ) -> Result<(Value, Vec<usize>)> {
        let items = self.parse_optional_array(read)?;

        let mut blocked = Vec::new();
        let values = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                item.unwrap_or_else(|| {
                    blocked.push(index);
                    T::default()
                })
            })
            .collect();

        Ok((wrap(values), blocked))
    }

    /// Reads a value of a declared type where array elements can't be blocked.
    pub fn parse_typed_value(&mut self, ty: TypeName) -> Result<Value> {
        if !ty.array {
            return self.parse_value(ty.ty);
        }

        let (value, blocked) = self.parse_array_value(ty.ty)?;
        ensure!(
            blocked.is_empty(),
            "None is not allowed as an element of {} (at index {:?})",
            ty,
            blocked
        );

        Ok(value)
    }

    /// `@asset@`, `@asset@</Prim>` or `</Prim>`, optionally followed by `(offset = ..; scale = ..)`.
    pub fn parse_reference(&mut self) -> Result<Reference> {
        let mut reference = Reference::default();

        match self.peek_next() {
            Some(Token::AssetRef(_)) => {
                reference.asset_path = self.fetch_asset_path()?;
                if matches!(self.peek_next(), Some(Token::PathRef(_))) {
                    reference.prim_path = Some(self.fetch_path()?);
                }
            }
            Some(Token::PathRef(_)) => reference.prim_path = Some(self.fetch_path()?),
            other => bail!("Reference must start with an asset or a path, got {:?}", other),
        }

        if self.is_next_pun('(') {
            reference.layer_offset = Some(self.parse_layer_offset()?);
        }

        Ok(reference)
    }

    pub(super) fn parse_layer_offset(&mut self) -> Result<LayerOffset> {
        let mut layer_offset = LayerOffset::default();

        self.ensure_pun('(')?;
        while !self.eat_pun(')')? {
            let name = self.fetch_identifier()?;
            self.ensure_pun('=')?;

            match name {
                "offset" => layer_offset.offset = self.parse_scalar()?,
                "scale" => layer_offset.scale = self.parse_scalar()?,
                _ => bail!("Unexpected layer offset field: {}", name),
            }

            self.eat_pun(';')?;
        }

        Ok(layer_offset)
    }

    /// Consumes one value of unknown type and returns its source text.
    pub(super) fn skip_value(&mut self) -> Result<&'a str> {
        let start = self.next_token_start();
        let mut depth = 0_usize;

        loop {
            match self.fetch_next()? {
                Token::Punctuation('(' | '[' | '{') => depth += 1,
                Token::Punctuation(close @ (')' | ']' | '}')) => {
                    ensure!(depth > 0, "Unbalanced '{}' in value", close);
                    depth -= 1;
                }
                // Sign of a non-finite number.
                Token::Punctuation('-' | '+') if depth == 0 => continue,
                // References may carry a prim path and a layer offset.
                Token::AssetRef(_) if depth == 0 && matches!(self.peek_next(), Some(Token::PathRef(_))) => continue,
                Token::AssetRef(_) | Token::PathRef(_) if depth == 0 && self.is_next_pun('(') => continue,
                _ => {}
            }

            if depth == 0 {
                break;
            }
        }

        Ok(self.stream.slice(start, self.stream.offset()).trim())
    }
}

/// Scalar element that can be read from a single number token.
pub trait Scalar: Copy + Default + Debug {
    fn from_lexeme(lexeme: &str) -> Option<Self>;

    /// Value for `nan` / `inf` spellings, `None` for kinds that can't hold them.
    fn non_finite(_nan: bool, _negative: bool) -> Option<Self> {
        None
    }
}

macro_rules! impl_scalar {
    (int: $($ty:ty),*) => {
        $(impl Scalar for $ty {
            fn from_lexeme(lexeme: &str) -> Option<Self> {
                lexeme.parse().ok()
            }
        })*
    };
    (float: $($ty:ty),*) => {
        $(impl Scalar for $ty {
            fn from_lexeme(lexeme: &str) -> Option<Self> {
                lexeme.parse().ok()
            }

            fn non_finite(nan: bool, negative: bool) -> Option<Self> {
                Some(non_finite(nan, negative))
            }
        })*
    };
}

impl_scalar!(int: u8, i32, u32, i64, u64);
impl_scalar!(float: f16, f32, f64);

fn non_finite<T: Float>(nan: bool, negative: bool) -> T {
    let value = if nan { T::nan() } else { T::infinity() };
    if negative {
        -value
    } else {
        value
    }
}

/// Strips quotes and resolves escapes.
pub(super) fn string_literal(raw: &str) -> Result<StringData> {
    let triple_quoted = raw.len() >= 6 && (raw.starts_with("\"\"\"") || raw.starts_with("'''"));
    let inner = trim_chars(raw, if triple_quoted { 3 } else { 1 }).context("Malformed string literal")?;

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }

        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some(other) => value.push(other),
            None => value.push('\\'),
        }
    }

    Ok(StringData { value, triple_quoted })
}

pub(super) fn asset_path(raw: &str) -> Result<AssetPath> {
    let triple_delimited = raw.len() >= 6 && raw.starts_with("@@@") && raw.ends_with("@@@");
    let path = trim_chars(raw, if triple_delimited { 3 } else { 1 }).context("Malformed asset path")?;

    Ok(AssetPath {
        path: path.to_string(),
        triple_delimited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_array() {
        let mut parser = Parser::new("[]");
        let array = parser.parse_array::<u32>().unwrap();
        assert!(array.is_empty());
    }

    #[test]
    fn parse_tuple() {
        let mut parser = Parser::new("(1, 2, 3)");
        let result = parser.parse_tuple::<u32, 3>().unwrap();
        assert_eq!(result, [1_u32, 2, 3]);
    }

    #[test]
    fn parse_tuple_arity() {
        assert!(Parser::new("(1, 2)").parse_tuple::<f32, 3>().is_err());
        assert!(Parser::new("(1, 2, 3, 4)").parse_tuple::<f32, 3>().is_err());
        assert!(Parser::new("(1, 2, 3,)").parse_tuple::<f32, 3>().is_ok());
    }

    #[test]
    fn parse_array() {
        let mut parser = Parser::new("[1, 2, 3]");
        let result = parser.parse_array::<u32>().unwrap();
        assert_eq!(result, vec![1_u32, 2, 3]);
    }

    #[test]
    fn parse_array_trailing_comma() {
        let mut parser = Parser::new("[1, 2, 3,]");
        let result = parser.parse_array::<i32>().unwrap();
        assert_eq!(result, vec![1, 2, 3]);

        // A lone separator is not an element.
        assert!(Parser::new("[,]").parse_array::<i32>().is_err());
        assert!(Parser::new("[1,,]").parse_array::<i32>().is_err());
    }

    #[test]
    fn parse_array_of_tuples() {
        let mut parser = Parser::new("[(1, 2), (3, 4),]");
        let result = parser.parse_tuple_array::<u32, 2>().unwrap();
        assert_eq!(result, vec![[1_u32, 2], [3, 4]]);
    }

    #[test]
    fn parse_optional_array() -> Result<()> {
        let mut parser = Parser::new("[1, 2, None, 4]");
        let result = parser.parse_optional_array(Parser::parse_scalar::<f32>)?;
        assert_eq!(result, vec![Some(1.0), Some(2.0), None, Some(4.0)]);

        let mut parser = Parser::new("[None, (1, 2, 3), None,]");
        let result = parser.parse_optional_array(Parser::parse_tuple::<i32, 3>)?;
        assert_eq!(result, vec![None, Some([1, 2, 3]), None]);

        Ok(())
    }

    #[test]
    fn parse_optional_tuple() -> Result<()> {
        let mut parser = Parser::new("None (1, 2)");
        assert_eq!(parser.parse_optional(Parser::parse_tuple::<f64, 2>)?, None);
        assert_eq!(parser.parse_optional(Parser::parse_tuple::<f64, 2>)?, Some([1.0, 2.0]));

        Ok(())
    }

    #[test]
    fn parse_non_finite() -> Result<()> {
        let mut parser = Parser::new("inf -inf +inf nan");
        assert_eq!(parser.parse_scalar::<f32>()?, f32::INFINITY);
        assert_eq!(parser.parse_scalar::<f64>()?, f64::NEG_INFINITY);
        assert_eq!(parser.parse_scalar::<f16>()?, f16::INFINITY);
        assert!(parser.parse_scalar::<f64>()?.is_nan());

        assert!(Parser::new("inf").parse_scalar::<i32>().is_err());
        assert!(Parser::new("- 1").parse_scalar::<i32>().is_err());

        Ok(())
    }

    #[test]
    fn roundtrip_floats() -> Result<()> {
        fn render(value: f64) -> String {
            if value.is_nan() {
                "nan".to_string()
            } else if value.is_infinite() {
                if value < 0.0 { "-inf" } else { "inf" }.to_string()
            } else {
                format!("{value:?}")
            }
        }

        #[rustfmt::skip]
        let cases = [
            0.0, -0.0, 1.0, -2.5, 1e-7, -3.25e12, 6.02214076e23,
            f64::MAX, f64::MIN_POSITIVE, f64::INFINITY, f64::NEG_INFINITY,
        ];

        for value in cases {
            let text = render(value);
            let parsed = Parser::new(&text).parse_scalar::<f64>()?;
            assert_eq!(parsed, value, "Unable to roundtrip {}", text);

            let single = value as f32;
            let parsed = Parser::new(&format!("{single:?}")).parse_scalar::<f32>();
            if single.is_finite() {
                assert_eq!(parsed?, single);
            }
        }

        let half = f16::from_f32(-1.5);
        assert_eq!(Parser::new(&half.to_string()).parse_scalar::<f16>()?, half);

        Ok(())
    }

    #[test]
    fn roundtrip_integers() -> Result<()> {
        assert_eq!(Parser::new(&i64::MIN.to_string()).parse_scalar::<i64>()?, i64::MIN);
        assert_eq!(Parser::new(&u64::MAX.to_string()).parse_scalar::<u64>()?, u64::MAX);
        assert_eq!(Parser::new("255").parse_scalar::<u8>()?, 255);

        assert!(Parser::new("256").parse_scalar::<u8>().is_err());
        assert!(Parser::new("-1").parse_scalar::<u32>().is_err());
        assert!(Parser::new("1.5").parse_scalar::<i32>().is_err());

        Ok(())
    }

    #[test]
    fn parse_bool_type() -> Result<()> {
        let mut parser = Parser::new("true false 1 0");
        assert!(parser.parse_bool()?);
        assert!(!parser.parse_bool()?);
        assert!(parser.parse_bool()?);
        assert!(!parser.parse_bool()?);

        assert!(Parser::new("yes").parse_bool().is_err());
        Ok(())
    }

    #[test]
    fn parse_vector_kinds() -> Result<()> {
        #[rustfmt::skip]
        let cases = [
            (ValueType::Float3, "(1, 2, 3)", Value::Float3([1.0, 2.0, 3.0])),
            (ValueType::Color3f, "(0.5, -1e-2, 1E1)", Value::Float3([0.5, -0.01, 10.0])),
            (ValueType::Point3d, "(-1, -inf, 0)", Value::Double3([-1.0, f64::NEG_INFINITY, 0.0])),
            (ValueType::TexCoord2f, "(0.25, 0.75)", Value::Float2([0.25, 0.75])),
            (ValueType::Quatf, "(1, 0, 0, 0)", Value::Float4([1.0, 0.0, 0.0, 0.0])),
            (ValueType::Int4, "(1, -2, 3, -4)", Value::Int4([1, -2, 3, -4])),
            (ValueType::Uint2, "(7, 8)", Value::Uint2([7, 8])),
            (ValueType::Half2, "(0.5, 2)", Value::Half2([f16::from_f32(0.5), f16::from_f32(2.0)])),
            (ValueType::TimeCode, "24", Value::Double(24.0)),
        ];

        for (ty, text, expected) in cases {
            assert_eq!(Parser::new(text).parse_value(ty)?, expected, "{} = {}", ty, text);
        }

        Ok(())
    }

    #[test]
    fn parse_matrix() -> Result<()> {
        let mut parser = Parser::new("((1, 0), (0, 1))");
        assert_eq!(parser.parse_value(ValueType::Matrix2d)?, Value::Matrix2d([[1.0, 0.0], [0.0, 1.0]]));

        let mut parser = Parser::new("((1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (5, 6, 7, 1))");
        let Value::Matrix4d(matrix) = parser.parse_value(ValueType::Matrix4d)? else {
            panic!("Expected matrix4d");
        };
        assert_eq!(matrix[3], [5.0, 6.0, 7.0, 1.0]);

        assert!(Parser::new("((1, 0), (0, 1), (0, 0))")
            .parse_value(ValueType::Matrix2d)
            .is_err());

        Ok(())
    }

    #[test]
    fn parse_string_kinds() -> Result<()> {
        let mut parser = Parser::new(r#""a \"quoted\" word" 'single' """multi
line""" @@@weird@name.usda@@@ </World/Sphere.radius>"#);

        assert_eq!(parser.parse_value(ValueType::String)?, Value::String("a \"quoted\" word".into()));
        assert_eq!(parser.parse_value(ValueType::Token)?, Value::Token("single".into()));

        let multi = parser.fetch_str()?;
        assert!(multi.triple_quoted);
        assert_eq!(multi.value, "multi\nline");

        let Value::AssetPath(asset) = parser.parse_value(ValueType::Asset)? else {
            panic!("Expected asset path");
        };
        assert_eq!(asset.path, "weird@name.usda");
        assert!(asset.triple_delimited);

        assert_eq!(
            parser.parse_value(ValueType::Path)?,
            Value::Path(sdf::path("/World/Sphere.radius")?)
        );

        Ok(())
    }

    #[test]
    fn parse_array_values() -> Result<()> {
        let mut parser = Parser::new("[(0, 0, 0), None, (1, 1, 1)]");
        let (value, blocked) = parser.parse_array_value(ValueType::Point3f)?;
        assert_eq!(value, Value::Float3Vec(vec![[0.0; 3], [0.0; 3], [1.0; 3]]));
        assert_eq!(blocked, vec![1]);

        let mut parser = Parser::new(r#"["a", "b",]"#);
        assert_eq!(
            parser.parse_typed_value(TypeName::array(ValueType::Token))?,
            Value::TokenVec(vec!["a".into(), "b".into()])
        );

        let mut parser = Parser::new("[1, None]");
        assert!(parser.parse_typed_value(TypeName::array(ValueType::Int)).is_err());

        Ok(())
    }

    #[test]
    fn parse_optional_value() -> Result<()> {
        let mut parser = Parser::new("None 1.5");
        assert_eq!(parser.parse_optional_value(ValueType::Float)?, None);
        assert_eq!(parser.parse_optional_value(ValueType::Float)?, Some(Value::Float(1.5)));

        Ok(())
    }

    #[test]
    fn parse_references() -> Result<()> {
        let mut parser = Parser::new("@./a.usda@</A> </B> @b.usda@ (offset = 10; scale = 2)");

        let first = parser.parse_reference()?;
        assert_eq!(first.asset_path.path, "./a.usda");
        assert_eq!(first.prim_path, Some(sdf::path("/A")?));

        let internal = parser.parse_reference()?;
        assert!(internal.asset_path.path.is_empty());
        assert_eq!(internal.prim_path, Some(sdf::path("/B")?));

        let offset = parser.parse_reference()?;
        assert_eq!(offset.layer_offset, Some(LayerOffset { offset: 10.0, scale: 2.0 }));

        Ok(())
    }

    #[test]
    fn skip_unknown_values() -> Result<()> {
        let mut parser = Parser::new("{ a = [1, (2, 3)] } -inf @a.usda@</P> 42");
        assert_eq!(parser.skip_value()?, "{ a = [1, (2, 3)] }");
        assert_eq!(parser.skip_value()?, "-inf");
        assert_eq!(parser.skip_value()?, "@a.usda@</P>");
        assert_eq!(parser.skip_value()?, "42");

        let mut parser = Parser::new("@a.usda@ (offset = 1) </B>(scale = 2) @c.usda@</C> ( offset = 3 ) 7");
        assert_eq!(parser.skip_value()?, "@a.usda@ (offset = 1)");
        assert_eq!(parser.skip_value()?, "</B>(scale = 2)");
        assert_eq!(parser.skip_value()?, "@c.usda@</C> ( offset = 3 )");
        assert_eq!(parser.skip_value()?, "7");

        assert!(Parser::new(")").skip_value().is_err());
        Ok(())
    }

    #[test]
    fn backtracking_restores_offset() -> Result<()> {
        let mut parser = Parser::new("(1, 2) [3]");

        let before = parser.offset();
        parser.push_parser_state();
        parser.parse_tuple::<i32, 2>()?;
        assert_ne!(parser.offset(), before);

        let state = parser.pop_parser_state().unwrap();
        assert_eq!(state.offset(), before);
        assert_eq!(parser.offset(), before);

        // Nothing left to restore.
        assert!(parser.pop_parser_state().is_none());

        Ok(())
    }

    #[test]
    fn attempt_forgets_diagnostics() {
        let mut parser = Parser::new("[1, 2]");
        parser.push_error("kept");

        let tuple = parser.attempt(|p| {
            p.push_error("speculative");
            p.push_warn("speculative");
            p.parse_tuple::<i32, 2>()
        });
        assert!(tuple.is_none());
        assert_eq!(parser.offset(), 0);
        assert_eq!(parser.diagnostics().errors().len(), 1);
        assert!(parser.diagnostics().warnings().is_empty());

        let array = parser.attempt(|p| p.parse_array::<i32>());
        assert_eq!(array, Some(vec![1, 2]));
        assert_eq!(parser.error(), "1:1: kept\n");
    }

    #[test]
    fn path_stack_is_balanced() {
        let mut parser = Parser::new("");
        let root = sdf::Path::abs_root();

        let result: Result<()> = parser.with_path(root.append_child("A").unwrap(), |p| {
            assert_eq!(p.current_path().as_str(), "/A");
            bail!("failure inside of a block")
        });

        assert!(result.is_err());
        assert_eq!(parser.path_depth(), 0);
        assert_eq!(parser.current_path(), root);
    }
}
