// src/descriptor.rs

//! Java type names and their JVM descriptor encoding
//!
//! Patch lists name types the way Java source does (`java.nio.file.Path`,
//! `int`, `byte[]`), with `$` separating nested types (`pkg.Outer$Inner`)
//! as in binary class names. Both pipelines compare signatures through
//! [`JavaType`], so a name means the same thing in a class file and in
//! source.

use std::fmt;

/// The eight JVM primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "boolean" => Some(Self::Boolean),
            "byte" => Some(Self::Byte),
            "char" => Some(Self::Char),
            "short" => Some(Self::Short),
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    fn descriptor_char(&self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    fn from_descriptor_char(c: char) -> Option<Self> {
        match c {
            'Z' => Some(Self::Boolean),
            'B' => Some(Self::Byte),
            'C' => Some(Self::Char),
            'S' => Some(Self::Short),
            'I' => Some(Self::Int),
            'J' => Some(Self::Long),
            'F' => Some(Self::Float),
            'D' => Some(Self::Double),
            _ => None,
        }
    }
}

/// A parameter type as it appears in a constructor signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaType {
    Primitive(Primitive),
    /// Qualified binary name with dots between packages, `$` for nesting
    Class(String),
    Array(Box<JavaType>),
}

impl JavaType {
    /// Parse a type name from a patch list
    ///
    /// Reference types must be qualified; an unqualified name such as
    /// `Path` is ambiguous without a classpath and is rejected. Generic
    /// arguments are not accepted: signatures are compared after erasure.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(element) = name.strip_suffix("[]") {
            return Self::parse(element).map(|t| Self::Array(Box::new(t)));
        }
        if let Some(p) = Primitive::from_keyword(name) {
            return Some(Self::Primitive(p));
        }
        if !name.contains('.') {
            return None;
        }
        let valid = name.split('.').all(|segment| {
            !segment.is_empty() && segment.split('$').all(is_java_identifier)
        });
        valid.then(|| Self::Class(name.to_string()))
    }

    /// Decode one field descriptor, e.g. `Ljava/lang/String;` or `[I`
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let (ty, rest) = Self::decode_prefix(descriptor)?;
        rest.is_empty().then_some(ty)
    }

    fn decode_prefix(input: &str) -> Option<(Self, &str)> {
        let mut chars = input.chars();
        let first = chars.next()?;
        match first {
            '[' => {
                let (element, rest) = Self::decode_prefix(&input[1..])?;
                Some((Self::Array(Box::new(element)), rest))
            }
            'L' => {
                let end = input.find(';')?;
                let internal = &input[1..end];
                if internal.is_empty() {
                    return None;
                }
                Some((Self::Class(internal.replace('/', ".")), &input[end + 1..]))
            }
            c => Primitive::from_descriptor_char(c).map(|p| (Self::Primitive(p), &input[1..])),
        }
    }

    /// JVM field descriptor for this type
    pub fn descriptor(&self) -> String {
        match self {
            Self::Primitive(p) => p.descriptor_char().to_string(),
            Self::Class(name) => format!("L{};", name.replace('.', "/")),
            Self::Array(element) => format!("[{}", element.descriptor()),
        }
    }

    /// Number of local variable / operand stack slots a value occupies
    pub fn slot_size(&self) -> u16 {
        match self {
            Self::Primitive(Primitive::Long) | Self::Primitive(Primitive::Double) => 2,
            _ => 1,
        }
    }

    /// Java source spelling with the qualified name (`java.util.Map.Entry[]`)
    pub fn source_name(&self) -> String {
        match self {
            Self::Primitive(p) => p.keyword().to_string(),
            Self::Class(name) => name.replace('$', "."),
            Self::Array(element) => format!("{}[]", element.source_name()),
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p.keyword()),
            Self::Class(name) => write!(f, "{}", name),
            Self::Array(element) => write!(f, "{}[]", element),
        }
    }
}

/// Method descriptor of a constructor taking `params`
pub fn constructor_descriptor(params: &[JavaType]) -> String {
    let mut out = String::from("(");
    for p in params {
        out.push_str(&p.descriptor());
    }
    out.push_str(")V");
    out
}

/// Decode the parameter list of a method descriptor
///
/// Returns `None` for anything that is not a well-formed method descriptor.
pub fn parse_method_params(descriptor: &str) -> Option<Vec<JavaType>> {
    let inner = descriptor.strip_prefix('(')?;
    let close = inner.find(')')?;
    let mut rest = &inner[..close];
    let mut params = Vec::new();
    while !rest.is_empty() {
        let (ty, remaining) = JavaType::decode_prefix(rest)?;
        params.push(ty);
        rest = remaining;
    }
    Some(params)
}

/// Human-readable signature, e.g. `(java.nio.file.Path, int)`
pub fn display_signature(params: &[JavaType]) -> String {
    let names: Vec<String> = params.iter().map(|p| p.to_string()).collect();
    format!("({})", names.join(", "))
}

/// Check a single Java identifier (ASCII letters, digits, `_` and `$`,
/// plus any non-ASCII alphabetic character)
pub fn is_java_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified_and_primitive() {
        assert_eq!(
            JavaType::parse("java.nio.file.Path"),
            Some(JavaType::Class("java.nio.file.Path".to_string()))
        );
        assert_eq!(JavaType::parse("long"), Some(JavaType::Primitive(Primitive::Long)));
        assert_eq!(
            JavaType::parse("int[][]"),
            Some(JavaType::Array(Box::new(JavaType::Array(Box::new(
                JavaType::Primitive(Primitive::Int)
            )))))
        );
    }

    #[test]
    fn test_parse_rejects_unqualified_and_generic() {
        assert_eq!(JavaType::parse("Path"), None);
        assert_eq!(JavaType::parse("java.util.List<String>"), None);
        assert_eq!(JavaType::parse("java..Path"), None);
        assert_eq!(JavaType::parse(""), None);
    }

    #[test]
    fn test_descriptor_encoding() {
        let t = JavaType::parse("java.util.Map$Entry[]").unwrap();
        assert_eq!(t.descriptor(), "[Ljava/util/Map$Entry;");
        assert_eq!(JavaType::from_descriptor("[Ljava/util/Map$Entry;"), Some(t));
        assert_eq!(JavaType::from_descriptor("Ljava/lang/String;x"), None);
    }

    #[test]
    fn test_constructor_descriptor() {
        let params = vec![
            JavaType::parse("java.time.Duration").unwrap(),
            JavaType::parse("double").unwrap(),
        ];
        assert_eq!(constructor_descriptor(&params), "(Ljava/time/Duration;D)V");
        assert_eq!(parse_method_params("(Ljava/time/Duration;D)V"), Some(params));
        assert_eq!(parse_method_params("()V"), Some(vec![]));
        assert_eq!(parse_method_params("(Q)V"), None);
    }

    #[test]
    fn test_slot_sizes() {
        assert_eq!(JavaType::parse("long").unwrap().slot_size(), 2);
        assert_eq!(JavaType::parse("double").unwrap().slot_size(), 2);
        assert_eq!(JavaType::parse("long[]").unwrap().slot_size(), 1);
        assert_eq!(JavaType::parse("java.lang.Object").unwrap().slot_size(), 1);
    }

    #[test]
    fn test_source_name_uses_dots_for_nesting() {
        let t = JavaType::parse("java.util.Map$Entry").unwrap();
        assert_eq!(t.source_name(), "java.util.Map.Entry");
        assert_eq!(t.to_string(), "java.util.Map$Entry");
    }
}
