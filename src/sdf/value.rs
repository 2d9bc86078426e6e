use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{anyhow, Result};
use half::f16;

use super::Path;

/// Closed set of value kinds that can be declared in a text file.
///
/// Role types (points, normals, colors, texture coordinates) are kept
/// distinct here, while [Value] stores them by shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Uchar,

    Int,
    Int2,
    Int3,
    Int4,
    Uint,
    Uint2,
    Uint3,
    Uint4,
    Int64,
    Uint64,

    Half,
    Half2,
    Half3,
    Half4,
    Float,
    Float2,
    Float3,
    Float4,
    Double,
    Double2,
    Double3,
    Double4,

    Quath,
    Quatf,
    Quatd,

    Point3h,
    Point3f,
    Point3d,
    Vector3h,
    Vector3f,
    Vector3d,
    Normal3h,
    Normal3f,
    Normal3d,
    Color3h,
    Color3f,
    Color3d,
    Color4h,
    Color4f,
    Color4d,
    TexCoord2h,
    TexCoord2f,
    TexCoord2d,
    TexCoord3h,
    TexCoord3f,
    TexCoord3d,

    // Only double precision matrices exist in the text format.
    Matrix2d,
    Matrix3d,
    Matrix4d,

    TimeCode,
    String,
    Token,
    Asset,

    // Metadata only kinds.
    Path,
    Reference,
    Dictionary,
}

/// Spelling of each value kind as it appears in USDA.
///
/// See <https://openusd.org/release/api/_usd__page__datatypes.html>
static TYPE_NAMES: &[(&str, ValueType)] = &[
    ("bool", ValueType::Bool),
    ("uchar", ValueType::Uchar),
    ("int", ValueType::Int),
    ("int2", ValueType::Int2),
    ("int3", ValueType::Int3),
    ("int4", ValueType::Int4),
    ("uint", ValueType::Uint),
    ("uint2", ValueType::Uint2),
    ("uint3", ValueType::Uint3),
    ("uint4", ValueType::Uint4),
    ("int64", ValueType::Int64),
    ("uint64", ValueType::Uint64),
    ("half", ValueType::Half),
    ("half2", ValueType::Half2),
    ("half3", ValueType::Half3),
    ("half4", ValueType::Half4),
    ("float", ValueType::Float),
    ("float2", ValueType::Float2),
    ("float3", ValueType::Float3),
    ("float4", ValueType::Float4),
    ("double", ValueType::Double),
    ("double2", ValueType::Double2),
    ("double3", ValueType::Double3),
    ("double4", ValueType::Double4),
    ("quath", ValueType::Quath),
    ("quatf", ValueType::Quatf),
    ("quatd", ValueType::Quatd),
    ("point3h", ValueType::Point3h),
    ("point3f", ValueType::Point3f),
    ("point3d", ValueType::Point3d),
    ("vector3h", ValueType::Vector3h),
    ("vector3f", ValueType::Vector3f),
    ("vector3d", ValueType::Vector3d),
    ("normal3h", ValueType::Normal3h),
    ("normal3f", ValueType::Normal3f),
    ("normal3d", ValueType::Normal3d),
    ("color3h", ValueType::Color3h),
    ("color3f", ValueType::Color3f),
    ("color3d", ValueType::Color3d),
    ("color4h", ValueType::Color4h),
    ("color4f", ValueType::Color4f),
    ("color4d", ValueType::Color4d),
    ("texCoord2h", ValueType::TexCoord2h),
    ("texCoord2f", ValueType::TexCoord2f),
    ("texCoord2d", ValueType::TexCoord2d),
    ("texCoord3h", ValueType::TexCoord3h),
    ("texCoord3f", ValueType::TexCoord3f),
    ("texCoord3d", ValueType::TexCoord3d),
    ("matrix2d", ValueType::Matrix2d),
    ("matrix3d", ValueType::Matrix3d),
    ("matrix4d", ValueType::Matrix4d),
    ("timecode", ValueType::TimeCode),
    ("string", ValueType::String),
    ("token", ValueType::Token),
    ("asset", ValueType::Asset),
    ("path", ValueType::Path),
    ("reference", ValueType::Reference),
    ("dictionary", ValueType::Dictionary),
];

impl ValueType {
    pub fn from_name(name: &str) -> Option<Self> {
        TYPE_NAMES.iter().find(|(n, _)| *n == name).map(|(_, ty)| *ty)
    }

    pub fn name(self) -> &'static str {
        TYPE_NAMES
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    /// Whether an attribute may be declared with this type.
    pub fn is_attribute_type(self) -> bool {
        !matches!(self, ValueType::Path | ValueType::Reference)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of an attribute or metadatum, e.g. `float3[]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub ty: ValueType,
    pub array: bool,
}

impl TypeName {
    pub const fn scalar(ty: ValueType) -> Self {
        Self { ty, array: false }
    }

    pub const fn array(ty: ValueType) -> Self {
        Self { ty, array: true }
    }
}

impl FromStr for TypeName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, array) = match s.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (s, false),
        };

        let ty = ValueType::from_name(name).ok_or_else(|| anyhow!("Unsupported data type: {}", s))?;
        if array && ty == ValueType::Dictionary {
            return Err(anyhow!("Arrays of dictionaries are not supported"));
        }

        Ok(Self { ty, array })
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "{}[]", self.ty)
        } else {
            write!(f, "{}", self.ty)
        }
    }
}

/// Quoted string literal.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct StringData {
    pub value: String,
    /// `"""` or `'''` delimited, may span multiple lines.
    pub triple_quoted: bool,
}

impl StringData {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            triple_quoted: false,
        }
    }
}

/// Reference to an external resource: `@path@` or `@@@path@@@`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct AssetPath {
    pub path: String,
    /// `@@@` delimited, used when the path itself contains `@`.
    pub triple_delimited: bool,
}

impl AssetPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            triple_delimited: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOffset {
    pub offset: f64,
    pub scale: f64,
}

impl Default for LayerOffset {
    fn default() -> Self {
        Self { offset: 0.0, scale: 1.0 }
    }
}

/// Composition arc target used by `references` and `payload`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reference {
    /// Empty for internal references (`</Prim>`).
    pub asset_path: AssetPath,
    pub prim_path: Option<Path>,
    pub layer_offset: Option<LayerOffset>,
}

/// Type erased metadata value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaVariable {
    /// Declared type as written (or implied by a registered metadatum).
    pub type_name: String,
    pub value: Value,
}

impl MetaVariable {
    pub fn new(type_name: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

pub type Dictionary = BTreeMap<String, MetaVariable>;

/// Animation curve samples in file order. `None` marks a blocked sample.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TimeSamples {
    pub samples: Vec<(f64, Option<Value>)>,
}

impl TimeSamples {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|(time, _)| *time)
    }
}

/// Parsed value storage.
///
/// Values are stored by shape: `point3f`, `color3f`, `normal3f` all land in
/// [Value::Float3], quaternions are stored as 4 component tuples in `(w, x, y, z)`
/// order, `timecode` is stored as [Value::Double].
#[derive(Debug, Clone, PartialEq, strum::EnumIs, strum::EnumTryAs)]
pub enum Value {
    /// `None`, blocks any weaker opinion.
    Blocked,

    Bool(bool),
    Uchar(u8),
    Int(i32),
    Int2([i32; 2]),
    Int3([i32; 3]),
    Int4([i32; 4]),
    Uint(u32),
    Uint2([u32; 2]),
    Uint3([u32; 3]),
    Uint4([u32; 4]),
    Int64(i64),
    Uint64(u64),

    Half(f16),
    Half2([f16; 2]),
    Half3([f16; 3]),
    Half4([f16; 4]),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Double(f64),
    Double2([f64; 2]),
    Double3([f64; 3]),
    Double4([f64; 4]),

    Matrix2d([[f64; 2]; 2]),
    Matrix3d([[f64; 3]; 3]),
    Matrix4d([[f64; 4]; 4]),

    String(String),
    Token(String),
    AssetPath(AssetPath),
    Path(Path),
    Reference(Reference),

    BoolVec(Vec<bool>),
    UcharVec(Vec<u8>),
    IntVec(Vec<i32>),
    Int2Vec(Vec<[i32; 2]>),
    Int3Vec(Vec<[i32; 3]>),
    Int4Vec(Vec<[i32; 4]>),
    UintVec(Vec<u32>),
    Uint2Vec(Vec<[u32; 2]>),
    Uint3Vec(Vec<[u32; 3]>),
    Uint4Vec(Vec<[u32; 4]>),
    Int64Vec(Vec<i64>),
    Uint64Vec(Vec<u64>),

    HalfVec(Vec<f16>),
    Half2Vec(Vec<[f16; 2]>),
    Half3Vec(Vec<[f16; 3]>),
    Half4Vec(Vec<[f16; 4]>),
    FloatVec(Vec<f32>),
    Float2Vec(Vec<[f32; 2]>),
    Float3Vec(Vec<[f32; 3]>),
    Float4Vec(Vec<[f32; 4]>),
    DoubleVec(Vec<f64>),
    Double2Vec(Vec<[f64; 2]>),
    Double3Vec(Vec<[f64; 3]>),
    Double4Vec(Vec<[f64; 4]>),

    Matrix2dVec(Vec<[[f64; 2]; 2]>),
    Matrix3dVec(Vec<[[f64; 3]; 3]>),
    Matrix4dVec(Vec<[[f64; 4]; 4]>),

    StringVec(Vec<String>),
    TokenVec(Vec<String>),
    AssetPathVec(Vec<AssetPath>),
    PathVec(Vec<Path>),
    ReferenceVec(Vec<Reference>),

    Dictionary(Dictionary),
    /// `variants = { string set = "selection" }`
    VariantSelection(BTreeMap<String, String>),
    /// Raw source text of a metadatum that is not registered for its scope.
    Unregistered(String),
}

impl Value {
    /// Textual payload of string-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(str) | Value::Token(str) | Value::Unregistered(str) => Some(str.as_str()),
            Value::AssetPath(asset) => Some(asset.path.as_str()),
            Value::Path(path) => Some(path.as_str()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(value) => Some(value),
            Value::Float(value) => Some(value as f64),
            Value::Half(value) => Some(value.to_f64()),
            Value::Int(value) => Some(value as f64),
            Value::Uint(value) => Some(value as f64),
            Value::Int64(value) => Some(value as f64),
            Value::Uint64(value) => Some(value as f64),
            _ => None,
        }
    }
}

impl From<Value> for Vec<String> {
    fn from(value: Value) -> Self {
        match value {
            Value::String(str) | Value::Token(str) => vec![str],
            Value::StringVec(vec) | Value::TokenVec(vec) => vec,
            Value::AssetPath(asset) => vec![asset.path],
            Value::AssetPathVec(assets) => assets.into_iter().map(|asset| asset.path).collect(),
            _ => Vec::new(),
        }
    }
}
