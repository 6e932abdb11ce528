// types.rs — Type descriptors and canonical type names
//
// Host registration and device code may describe the same type through
// different raw identifiers (`class Foo` vs `Foo`, `__int64` vs
// `long long int`, `f32` vs `float`). Everything that reaches generated code
// or a diagnostic goes through `normalize_type_name` first so those spellings
// converge.
//
// Preconditions: none.
// Postconditions: output contains no qualifier keywords and no leading or
//                 trailing whitespace; runs of whitespace collapse to one space.
// Failure modes: none; unrecognized characters are copied through verbatim.
// Side effects: none.

use logos::Logos;

/// Tokens of a raw type identifier.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum TypeToken {
    // ── Dropped qualifiers ──
    #[token("class")]
    #[token("struct")]
    #[token("enum")]
    #[token("union")]
    Qualifier,

    // ── Platform spellings rewritten to portable ones ──
    #[token("__int64")]
    Int64,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,
    #[regex(r"[0-9]+[uUlL]*")]
    Number,

    #[token("::")]
    Scope,
    #[token(",")]
    Comma,
    #[token("<")]
    #[token(">")]
    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token("*")]
    #[token("&")]
    Punct,
}

/// Rust primitive spellings (as produced by `std::any::type_name`) and the
/// device spelling they correspond to.
const RUST_PRIMITIVES: &[(&str, &str)] = &[
    ("f32", "float"),
    ("f64", "double"),
    ("i8", "signed char"),
    ("u8", "unsigned char"),
    ("i16", "short"),
    ("u16", "unsigned short"),
    ("i32", "int"),
    ("u32", "unsigned int"),
    ("i64", "long long int"),
    ("u64", "unsigned long long int"),
    ("bool", "bool"),
];

/// Convert a platform-specific type identifier into its canonical name.
pub fn normalize_type_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((_, device)) = RUST_PRIMITIVES.iter().find(|(rust, _)| *rust == trimmed) {
        return (*device).to_string();
    }

    let mut out = String::with_capacity(trimmed.len());
    // Whether the previous emitted token was word-like and needs a separator.
    let mut prev_word = false;
    let mut lex = TypeToken::lexer(trimmed);
    while let Some(tok) = lex.next() {
        let text = lex.slice();
        match tok {
            Ok(TypeToken::Qualifier) => {}
            Ok(TypeToken::Int64) => {
                if prev_word {
                    out.push(' ');
                }
                out.push_str("long long int");
                prev_word = true;
            }
            Ok(TypeToken::Word) | Ok(TypeToken::Number) => {
                if prev_word {
                    out.push(' ');
                }
                out.push_str(text);
                prev_word = true;
            }
            Ok(TypeToken::Comma) => {
                out.push_str(", ");
                prev_word = false;
            }
            Ok(TypeToken::Scope) | Ok(TypeToken::Punct) => {
                out.push_str(text);
                prev_word = false;
            }
            Err(()) => {
                out.push_str(text);
                prev_word = false;
            }
        }
    }
    out.trim_end().to_string()
}

/// A type that may be stored in a device variable.
pub trait DeviceType: Copy + 'static {}

macro_rules! device_types {
    ($($t:ty),*) => { $(impl DeviceType for $t {})* };
}

device_types!(f32, f64, i8, u8, i16, u16, i32, u32, i64, u64, bool);

/// Canonical name and scalar size of one element of a variable's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub size: usize,
}

impl TypeDescriptor {
    /// Describe a raw identifier with an explicit element size.
    pub fn from_raw(raw: &str, size: usize) -> Self {
        TypeDescriptor {
            name: normalize_type_name(raw),
            size,
        }
    }

    /// Describe a Rust scalar type.
    pub fn of<T: DeviceType>() -> Self {
        Self::from_raw(std::any::type_name::<T>(), std::mem::size_of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_class_qualifier() {
        assert_eq!(normalize_type_name("class Foo"), "Foo");
        assert_eq!(normalize_type_name("struct glm::vec<3,float,0>"), "glm::vec<3, float, 0>");
    }

    #[test]
    fn trims_leading_whitespace() {
        assert_eq!(normalize_type_name("     float"), "float");
        assert_eq!(normalize_type_name("\tunsigned   int  "), "unsigned int");
    }

    #[test]
    fn rewrites_int64() {
        assert_eq!(normalize_type_name("__int64"), "long long int");
        assert_eq!(normalize_type_name("unsigned __int64"), "unsigned long long int");
    }

    #[test]
    fn msvc_and_gcc_spellings_converge() {
        let msvc = normalize_type_name("class flamingo::Vec< int,3 >");
        let gcc = normalize_type_name("flamingo::Vec<int, 3>");
        assert_eq!(msvc, gcc);
    }

    #[test]
    fn qualifier_prefix_inside_identifier_is_kept() {
        assert_eq!(normalize_type_name("classy_type"), "classy_type");
        assert_eq!(normalize_type_name("my_struct"), "my_struct");
    }

    #[test]
    fn rust_primitives_map_to_device_names() {
        assert_eq!(TypeDescriptor::of::<f32>(), TypeDescriptor::from_raw("float", 4));
        assert_eq!(TypeDescriptor::of::<i64>().name, "long long int");
        assert_eq!(TypeDescriptor::of::<u8>().size, 1);
        assert_eq!(TypeDescriptor::of::<f64>().name, normalize_type_name("double"));
    }

    #[test]
    fn pointer_and_reference_punctuation() {
        assert_eq!(normalize_type_name("const char *"), "const char*");
        assert_eq!(normalize_type_name("int &"), "int&");
    }
}
