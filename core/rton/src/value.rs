use crate::rtid::Rtid;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer payload. The variant fixes the width and signedness that survive a
/// round trip; the encoder only decides between zero, varint and fixed tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Int {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

impl Int {
    /// Narrowest signed variant holding `v`.
    pub fn signed(v: i64) -> Self {
        if let Ok(v) = i8::try_from(v) {
            Int::I8(v)
        } else if let Ok(v) = i16::try_from(v) {
            Int::I16(v)
        } else if let Ok(v) = i32::try_from(v) {
            Int::I32(v)
        } else {
            Int::I64(v)
        }
    }

    /// Narrowest unsigned variant holding `v`.
    pub fn unsigned(v: u64) -> Self {
        if let Ok(v) = u8::try_from(v) {
            Int::U8(v)
        } else if let Ok(v) = u16::try_from(v) {
            Int::U16(v)
        } else if let Ok(v) = u32::try_from(v) {
            Int::U32(v)
        } else {
            Int::U64(v)
        }
    }

    pub fn width(&self) -> u8 {
        match self {
            Int::I8(_) | Int::U8(_) => 8,
            Int::I16(_) | Int::U16(_) => 16,
            Int::I32(_) | Int::U32(_) => 32,
            Int::I64(_) | Int::U64(_) => 64,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Int::I8(_) | Int::I16(_) | Int::I32(_) | Int::I64(_))
    }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Float {
    F32(f32),
    F64(f64),
}

impl Float {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Float::F32(v) => v as f64,
            Float::F64(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrEncoding {
    /// Byte-length prefixed, interned via 0x90/0x91.
    Native,
    /// Character count plus byte length prefixed, interned via 0x92/0x93.
    Unicode,
}

impl StrEncoding {
    pub fn for_text(text: &str) -> Self {
        if text.is_ascii() {
            StrEncoding::Native
        } else {
            StrEncoding::Unicode
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Str {
    pub encoding: StrEncoding,
    pub text: String,
}

impl Str {
    pub fn native(text: impl Into<String>) -> Self {
        Self {
            encoding: StrEncoding::Native,
            text: text.into(),
        }
    }

    pub fn unicode(text: impl Into<String>) -> Self {
        Self {
            encoding: StrEncoding::Unicode,
            text: text.into(),
        }
    }

    /// ASCII text is stored natively, anything else as unicode.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            encoding: StrEncoding::for_text(&text),
            text,
        }
    }

    /// True when [`Str::from_text`] would pick the same encoding, i.e. the
    /// string survives being rebuilt from its text alone.
    pub fn has_default_encoding(&self) -> bool {
        self.encoding == StrEncoding::for_text(&self.text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RtonValue {
    Null,
    Bool(bool),
    Int(Int),
    Float(Float),
    Str(Str),
    Rtid(Rtid),
    Array(Vec<RtonValue>),
    Object(Vec<(Str, RtonValue)>),
}

impl RtonValue {
    pub fn object() -> Self {
        RtonValue::Object(Vec::new())
    }

    /// First value stored under `key`; later duplicates are reachable only by
    /// iterating the entries.
    pub fn get(&self, key: &str) -> Option<&RtonValue> {
        match self {
            RtonValue::Object(entries) => entries
                .iter()
                .find(|(k, _)| k.text == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RtonValue::Str(s) => Some(&s.text),
            _ => None,
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for RtonValue {
                fn from(v: $ty) -> Self {
                    RtonValue::Int(Int::$variant(v))
                }
            }
        )*
    };
}

impl_from_int! {
    i8 => I8, u8 => U8, i16 => I16, u16 => U16,
    i32 => I32, u32 => U32, i64 => I64, u64 => U64,
}

impl From<bool> for RtonValue {
    fn from(v: bool) -> Self {
        RtonValue::Bool(v)
    }
}

impl From<f32> for RtonValue {
    fn from(v: f32) -> Self {
        RtonValue::Float(Float::F32(v))
    }
}

impl From<f64> for RtonValue {
    fn from(v: f64) -> Self {
        RtonValue::Float(Float::F64(v))
    }
}

impl From<&str> for RtonValue {
    fn from(v: &str) -> Self {
        RtonValue::Str(Str::from_text(v))
    }
}

impl From<Str> for RtonValue {
    fn from(v: Str) -> Self {
        RtonValue::Str(v)
    }
}

impl From<Rtid> for RtonValue {
    fn from(v: Rtid) -> Self {
        RtonValue::Rtid(v)
    }
}

// === JSON bridge ===

fn serialize_float<S: ser::Serializer>(serializer: S, v: f64) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() && !v.is_finite() {
        if v.is_nan() {
            serializer.serialize_str("NaN")
        } else if v == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_str("-Infinity")
        }
    } else {
        serializer.serialize_f64(v)
    }
}

impl Serialize for RtonValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match self {
            RtonValue::Null => serializer.serialize_none(),
            RtonValue::Bool(b) => serializer.serialize_bool(*b),
            RtonValue::Int(int) => match *int {
                Int::I8(v) => serializer.serialize_i8(v),
                Int::U8(v) => serializer.serialize_u8(v),
                Int::I16(v) => serializer.serialize_i16(v),
                Int::U16(v) => serializer.serialize_u16(v),
                Int::I32(v) => serializer.serialize_i32(v),
                Int::U32(v) => serializer.serialize_u32(v),
                Int::I64(v) => serializer.serialize_i64(v),
                Int::U64(v) => serializer.serialize_u64(v),
            },
            RtonValue::Float(f) => serialize_float(serializer, f.as_f64()),
            RtonValue::Str(s) => serializer.serialize_str(&s.text),
            RtonValue::Rtid(rtid) => serializer.serialize_str(&rtid.to_string()),
            RtonValue::Array(vec) => {
                let mut seq = serializer.serialize_seq(Some(vec.len()))?;
                for element in vec {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            RtonValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.text, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for RtonValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct RtonValueVisitor;
        impl<'de> Visitor<'de> for RtonValueVisitor {
            type Value = RtonValue;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("any valid RTON value")
            }
            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E> {
                Ok(RtonValue::Bool(value))
            }
            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E> {
                if value >= 0 {
                    Ok(RtonValue::Int(Int::unsigned(value as u64)))
                } else {
                    Ok(RtonValue::Int(Int::signed(value)))
                }
            }
            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E> {
                Ok(RtonValue::Int(Int::unsigned(value)))
            }
            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E> {
                Ok(RtonValue::Float(Float::F64(value)))
            }
            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                match value {
                    "NaN" => return Ok(RtonValue::Float(Float::F64(f64::NAN))),
                    "Infinity" | "+Infinity" => {
                        return Ok(RtonValue::Float(Float::F64(f64::INFINITY)));
                    }
                    "-Infinity" => return Ok(RtonValue::Float(Float::F64(f64::NEG_INFINITY))),
                    _ => {}
                }
                if value.starts_with("RTID(")
                    && let Some(rtid) = Rtid::parse(value)
                {
                    return Ok(RtonValue::Rtid(rtid));
                }
                Ok(RtonValue::Str(Str::from_text(value)))
            }
            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_str(&value)
            }
            fn visit_none<E>(self) -> Result<Self::Value, E> {
                Ok(RtonValue::Null)
            }
            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(RtonValue::Null)
            }
            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                Deserialize::deserialize(deserializer)
            }
            fn visit_seq<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
            where
                V: SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = visitor.next_element()? {
                    vec.push(elem);
                }
                Ok(RtonValue::Array(vec))
            }
            fn visit_map<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = visitor.next_entry::<String, RtonValue>()? {
                    entries.push((Str::from_text(key), value));
                }
                Ok(RtonValue::Object(entries))
            }
        }
        deserializer.deserialize_any(RtonValueVisitor)
    }
}
