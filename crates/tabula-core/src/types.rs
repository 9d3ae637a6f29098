//! Canonical column types.
//!
//! Field types are described by their Rust spelling (as produced by the
//! derive macro or written by hand). They are reduced to a small canonical
//! set that every dialect knows how to map to a native type.

use std::fmt;

use chrono::NaiveDateTime;

use crate::value::SqlValue;

/// Database-independent column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    /// `bool`
    Bool,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`, `isize`
    I64,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`, `usize`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `Decimal`
    Decimal,
    /// `String`, `&str`
    Text,
    /// `char`
    Char,
    /// `Vec<u8>`
    Bytes,
    /// `NaiveDateTime`, `DateTime<Tz>`
    DateTime,
    /// `NaiveDate`
    Date,
    /// `NaiveTime`
    Time,
    /// `Uuid`
    Uuid,
    /// Anything else, kept by name.
    Custom(String),
}

impl CanonicalType {
    /// Parses a Rust type spelling.
    ///
    /// Returns the canonical type and whether the spelling was wrapped in
    /// `Option<..>`. Whitespace and module paths are ignored, so
    /// `Option < chrono :: NaiveDateTime >` parses as a nullable
    /// [`CanonicalType::DateTime`].
    #[must_use]
    pub fn from_rust_type(rust_type: &str) -> (Self, bool) {
        let compact: String = rust_type.chars().filter(|c| !c.is_whitespace()).collect();
        let (inner, nullable) = match strip_option(&compact) {
            Some(inner) => (inner, true),
            None => (compact.as_str(), false),
        };
        (Self::from_plain(inner), nullable)
    }

    fn from_plain(ty: &str) -> Self {
        let ty = ty.strip_prefix('&').unwrap_or(ty);
        let (head, generics) = match ty.find('<') {
            Some(pos) => (&ty[..pos], &ty[pos..]),
            None => (ty, ""),
        };
        let base = head.rsplit("::").next().unwrap_or(head);
        match (base, generics) {
            ("bool", "") => Self::Bool,
            ("i8", "") => Self::I8,
            ("i16", "") => Self::I16,
            ("i32", "") => Self::I32,
            ("i64" | "isize", "") => Self::I64,
            ("u8", "") => Self::U8,
            ("u16", "") => Self::U16,
            ("u32", "") => Self::U32,
            ("u64" | "usize", "") => Self::U64,
            ("f32", "") => Self::F32,
            ("f64", "") => Self::F64,
            ("Decimal", "") => Self::Decimal,
            ("String" | "str", "") => Self::Text,
            ("char", "") => Self::Char,
            ("Vec", "<u8>") => Self::Bytes,
            ("NaiveDateTime", "") | ("DateTime", _) => Self::DateTime,
            ("NaiveDate", "") => Self::Date,
            ("NaiveTime", "") => Self::Time,
            ("Uuid", "") => Self::Uuid,
            _ => Self::Custom(format!("{base}{generics}")),
        }
    }

    /// Canonical name, stable across dialects.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Char => "char",
            Self::Bytes => "bytes",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Time => "time",
            Self::Uuid => "uuid",
            Self::Custom(name) => name,
        }
    }

    /// Whether a non-optional field of this type can never hold NULL.
    ///
    /// Strings, byte buffers and unknown types are reference-like and stay
    /// nullable unless the mapping says otherwise.
    #[must_use]
    pub const fn is_value_type(&self) -> bool {
        !matches!(self, Self::Text | Self::Bytes | Self::Custom(_))
    }

    /// Whether this is one of the integer types.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    /// Value used to fill a new NOT NULL column that has no declared default.
    #[must_use]
    pub fn zero_value(&self) -> SqlValue {
        match self {
            Self::Bool => SqlValue::Bool(false),
            Self::I8
            | Self::I16
            | Self::I32
            | Self::I64
            | Self::U8
            | Self::U16
            | Self::U32
            | Self::U64 => SqlValue::Int(0),
            Self::F32 | Self::F64 | Self::Decimal => SqlValue::Float(0.0),
            Self::Text | Self::Char => SqlValue::Text(String::new()),
            Self::Bytes => SqlValue::Blob(Vec::new()),
            Self::DateTime => SqlValue::Timestamp(NaiveDateTime::default()),
            Self::Date => SqlValue::Text(String::from("1970-01-01")),
            Self::Time => SqlValue::Text(String::from("00:00:00")),
            Self::Uuid => SqlValue::Text(String::from("00000000-0000-0000-0000-000000000000")),
            Self::Custom(_) => SqlValue::Null,
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn strip_option(rust_type: &str) -> Option<&str> {
    let inner = rust_type
        .strip_prefix("Option<")
        .or_else(|| rust_type.strip_prefix("std::option::Option<"))
        .or_else(|| rust_type.strip_prefix("core::option::Option<"))?;
    inner.strip_suffix('>')
}
