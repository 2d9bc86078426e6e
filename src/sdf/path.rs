use std::{fmt, result, str::FromStr};

use anyhow::{ensure, Result};

#[inline]
pub fn path(str: impl AsRef<str>) -> Result<Path> {
    let path = str.as_ref();
    Path::new(path)
}

/// `SdfPath` implementation.
///
/// # Syntax
/// - A slash ("/") following an identifier is used to introduce a namespace child.
/// - A period (".") following an identifier is used to introduce a property.
/// - A property may also have several non-sequential colons (':') in its name
/// to provide a rudimentary namespace within properties but may not end or
/// begin with a colon.
/// - Braces ("{" and "}") hold a variant selection (`/Prim{set=variant}`),
/// children of a variant are appended without a slash (`/Prim{set=variant}Child`).
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    path: String,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl FromStr for Path {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> result::Result<Path, Self::Err> {
        ensure!(!s.contains(char::is_whitespace), "Path must not contain whitespace: {:?}", s);
        Ok(Path { path: s.to_string() })
    }
}

impl Path {
    pub const NS_DELIMITER_CHAR: char = ':';

    pub fn new(path: &str) -> Result<Self> {
        Path::from_str(path)
    }

    #[inline]
    pub fn abs_root() -> Path {
        Path { path: "/".to_string() }
    }

    #[inline]
    pub fn is_abs(&self) -> bool {
        self.path.starts_with('/')
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Appends a prim name.
    ///
    /// "/" + "foo" => "/foo", "/foo" + "bar" => "/foo/bar", "/foo{v=a}" + "bar" => "/foo{v=a}bar".
    pub fn append_child(&self, name: &str) -> Result<Path> {
        ensure!(Self::is_valid_identifier(name), "Invalid prim name: {:?}", name);
        ensure!(!self.is_property_path(), "Cannot append prim to property path: {}", self);

        let path = if self.path == "/" || self.path.ends_with('}') {
            format!("{}{}", self.path, name)
        } else {
            format!("{}/{}", self.path, name)
        };

        Ok(Path { path })
    }

    pub fn append_property(&self, property: &str) -> Result<Path> {
        ensure!(
            Self::is_valid_namespace_identifier(property),
            "Invalid property name: {:?}",
            property
        );
        ensure!(!self.is_property_path(), "Cannot append property to property path");

        Ok(Path {
            path: format!("{}.{}", self.path, property),
        })
    }

    pub fn append_variant_selection(&self, set: &str, variant: &str) -> Result<Path> {
        ensure!(Self::is_valid_identifier(set), "Invalid variant set name: {:?}", set);
        ensure!(self.path != "/", "Root path cannot hold a variant selection");
        ensure!(!self.is_property_path(), "Cannot select a variant on property path");

        Ok(Path {
            path: format!("{}{{{}={}}}", self.path, set, variant),
        })
    }

    pub fn is_property_path(&self) -> bool {
        let Some(pos) = self.path.rfind('.') else {
            return false;
        };

        // Make sure path ends with a valid property name (e.g. "xyz.chars").
        let tail = &self.path[pos + 1..];
        !tail.is_empty() && tail.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ':')
    }

    /// Last element of the path, without variant selections.
    pub fn name(&self) -> &str {
        let tail = match self.path.rfind(&['/', '}'][..]) {
            Some(pos) => &self.path[pos + 1..],
            None => self.path.as_str(),
        };

        tail.rsplit('.').next().unwrap_or(tail)
    }

    /// Validate identifier
    ///
    /// Rules are:
    /// - Must be at least 1 char long
    /// - Must start with a letter or underscore
    /// - Must contain only letters, underscores, and numbers.
    pub fn is_valid_identifier(name: &str) -> bool {
        if name.is_empty() {
            return false;
        }

        name.chars()
            .enumerate()
            .all(|(i, c)| c == '_' || if i == 0 { c.is_alphabetic() } else { c.is_alphanumeric() })
    }

    pub fn is_valid_namespace_identifier(name: &str) -> bool {
        name.split(Self::NS_DELIMITER_CHAR).all(Self::is_valid_identifier)
    }
}

impl TryFrom<&str> for Path {
    type Error = anyhow::Error;

    fn try_from(s: &str) -> result::Result<Path, Self::Error> {
        Path::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_child() -> Result<()> {
        assert_eq!(Path::abs_root().append_child("World")?.as_str(), "/World");
        assert_eq!(Path::new("/World")?.append_child("Geom")?.as_str(), "/World/Geom");

        let variant = Path::new("/World")?.append_variant_selection("style", "red")?;
        assert_eq!(variant.as_str(), "/World{style=red}");
        assert_eq!(variant.append_child("Ball")?.as_str(), "/World{style=red}Ball");

        assert!(Path::abs_root().append_child("1abc").is_err());
        assert!(Path::abs_root().append_child("").is_err());
        assert!(Path::new("/World.attr")?.append_child("Geom").is_err());

        Ok(())
    }

    #[test]
    fn test_append_property() -> Result<()> {
        let base = Path::new("/foo")?;

        assert_eq!(base.append_property("prop")?.as_str(), "/foo.prop");
        assert_eq!(base.append_property("prop:foo:bar")?.as_str(), "/foo.prop:foo:bar");
        assert!(base.append_property(":prop").is_err());
        assert!(base.append_property("prop:").is_err());

        let base = Path::new("/foo.prop")?;
        assert!(base.append_property("prop2").is_err());

        Ok(())
    }

    #[test]
    fn test_name() -> Result<()> {
        #[rustfmt::skip]
        let cases = [
            ("/A/B/C", "C"),
            ("/A", "A"),
            ("/A{set=sel}B", "B"),
            ("/A/B.attr", "attr"),
            ("/A/B.ns:attr", "ns:attr"),
        ];

        for (path, expected) in cases {
            assert_eq!(Path::new(path)?.name(), expected, "Unable to parse: {}", path);
        }

        Ok(())
    }

    #[test]
    fn test_is_property() {
        #[rustfmt::skip]
        let cases = [
            ("/Foo/Bar.baz", true),
            ("Foo", false),
            ("Foo/Bar", false),
            ("Foo.bar", true),
            ("/Foo/Bar.ns:bar", true),
            ("/Some/Kinda/Long/Path/Just/To/Make/Sure", false),
            ("../Some/Kinda/Long/Path/Just/To/Make/Sure", false),
        ];

        for (path, expected) in cases {
            assert_eq!(Path::new(path).unwrap().is_property_path(), expected, "{}", path);
        }
    }

    #[test]
    fn validate_identifier() {
        assert!(Path::is_valid_identifier("_"));
        assert!(Path::is_valid_identifier("x"));
        assert!(Path::is_valid_identifier("_1"));
        assert!(Path::is_valid_identifier("Test123"));

        assert!(!Path::is_valid_identifier(""));
        assert!(!Path::is_valid_identifier(" "));
        assert!(!Path::is_valid_identifier("1"));
        assert!(!Path::is_valid_identifier("x!"));
        assert!(!Path::is_valid_identifier("te st"));
        assert!(!Path::is_valid_identifier("te.st"));
        assert!(!Path::is_valid_identifier("te:st"));

        assert!(Path::is_valid_namespace_identifier("inputs:diffuseColor"));
        assert!(!Path::is_valid_namespace_identifier("inputs::diffuseColor"));
    }

    #[test]
    fn reject_whitespace() {
        assert!(Path::new("/A B").is_err());
        assert!(path("/A/B").is_ok());
    }
}
