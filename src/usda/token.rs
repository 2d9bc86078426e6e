//! Lexer for the USDA grammar.
//!
//! It uses `logos` crate under the hood. The parser runs the lexer at the
//! current stream offset to read one token at a time, which keeps backtracking
//! a matter of seeking the stream.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs, strum::EnumTryAs)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"#[^\n]*")] // Skip comments
pub enum Token<'source> {
    /// Quoted string literal, quotes included.
    /// Examples: "hello", 'hello', """multi-line""", '''multi-line'''
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| lex.slice())]
    #[regex(r#""""([^"]|"[^"]|""[^"])*""""#, |lex| lex.slice())]
    #[regex(r#"'''([^']|'[^']|''[^'])*'''"#, |lex| lex.slice())]
    String(&'source str),

    // Keywords take priority over identifiers of the same length.
    #[token("add")]
    Add,
    #[token("append")]
    Append,
    #[token("class")]
    Class,
    #[token("custom")]
    Custom,
    #[token("def")]
    Def,
    #[token("delete")]
    Delete,
    #[token("inf")]
    Inf,
    #[token("nan")]
    Nan,
    #[token("None")]
    None,
    #[token("over")]
    Over,
    #[token("prepend")]
    Prepend,
    #[token("rel")]
    Rel,
    #[token("uniform")]
    Uniform,
    #[token("variantSet")]
    VariantSet,
    #[token("varying")]
    Varying,

    /// Numbers (int, float, scientific notation)
    /// Examples: "42", "3.14", "1.23e-4", "-42", "+3.14", ".5"
    #[regex(r"[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    Number(&'source str),

    /// Path references
    /// Example: "</World/Sphere.material:surface>" -> /World/Sphere.material:surface
    #[regex(r"<[^<>\s]*>", |lex| trim_chars(lex.slice(), 1))]
    PathRef(&'source str),

    /// Asset references, delimiters included.
    /// Examples: "@./textures/wood.jpg@", "@@@path@with@ats@@@"
    #[regex(r"@[^@\n]*@", |lex| lex.slice())]
    #[regex(r"@@@([^@]|@[^@]|@@[^@])*@@@", |lex| lex.slice())]
    AssetRef(&'source str),

    /// Examples: "=", ",", ";", ":", "(", ")", "{", "}", "[", "]", "+", "-"
    #[regex(r"[=,;:()\{\}\[\]+\-]", |lex| lex.slice().chars().next())]
    Punctuation(char),

    /// Identifiers, optionally namespaced, with a property suffix or an array marker.
    /// Examples: "Sphere", "float3[]", "inputs:diffuseColor", "xformOp:translate.timeSamples"
    #[regex(
        r"[a-zA-Z_][a-zA-Z0-9_]*(:[a-zA-Z_][a-zA-Z0-9_]*)*(\.[a-zA-Z_][a-zA-Z0-9_]*)?(\[\])?",
        |lex| lex.slice()
    )]
    Identifier(&'source str),
}

impl<'source> Token<'source> {
    /// Specifier keyword that opens a prim block.
    pub fn is_specifier(&self) -> bool {
        matches!(self, Token::Def | Token::Over | Token::Class)
    }

    pub fn is_list_edit_qual(&self) -> bool {
        matches!(self, Token::Prepend | Token::Append | Token::Add | Token::Delete)
    }
}

pub(super) fn trim_chars(s: &str, n: usize) -> Option<&str> {
    if s.len() < 2 * n {
        None
    } else {
        s.get(n..s.len() - n)
    }
}
