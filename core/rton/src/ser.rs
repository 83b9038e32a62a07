use byteorder::{LittleEndian, WriteBytesExt};
use integer_encoding::{VarInt, VarIntWriter};
use std::io::Write;
use tracing::debug;

use crate::constants::{FILE_FOOTER, FILE_HEADER, FILE_VERSION, RtidIdentifier, RtonIdentifier};
use crate::error::{Error, Result};
use crate::rtid::Rtid;
use crate::string_table::StringPool;
use crate::value::{Float, Int, RtonValue, Str, StrEncoding};

// === Helper Functions for String Writing ===

fn write_native_payload<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    writer.write_varint(s.len() as u64)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn write_unicode_payload<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    writer.write_varint(s.chars().count() as u64)?;
    writer.write_varint(s.len() as u64)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

// === Helper Functions for Header/Footer ===

fn write_header<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(FILE_HEADER)?;
    writer.write_u32::<LittleEndian>(FILE_VERSION)?;
    Ok(())
}

fn write_footer<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(FILE_FOOTER)?;
    Ok(())
}

/// Varint tag only when it is strictly shorter than the fixed payload.
fn prefers_varint<V: VarInt>(v: V, fixed_width: usize) -> bool {
    v.required_space() < fixed_width
}

pub struct RtonSerializer<'a, W> {
    writer: W,
    strings: &'a mut StringPool,
}

impl<'a, W: Write> RtonSerializer<'a, W> {
    pub fn new(writer: W, strings: &'a mut StringPool) -> Self {
        RtonSerializer { writer, strings }
    }

    fn write_tag(&mut self, tag: RtonIdentifier) -> Result<()> {
        self.writer.write_u8(tag as u8)?;
        Ok(())
    }

    fn write_interned_string(&mut self, s: &Str) -> Result<()> {
        match s.encoding {
            StrEncoding::Native => {
                if let Some(idx) = self.strings.native.lookup(&s.text) {
                    self.write_tag(RtonIdentifier::StrNativeRef)?;
                    self.writer.write_varint(idx)?;
                } else {
                    self.write_tag(RtonIdentifier::StrNativeDef)?;
                    write_native_payload(&mut self.writer, &s.text)?;
                    self.strings.native.push(&s.text);
                }
            }
            StrEncoding::Unicode => {
                if let Some(idx) = self.strings.unicode.lookup(&s.text) {
                    self.write_tag(RtonIdentifier::StrUnicodeRef)?;
                    self.writer.write_varint(idx)?;
                } else {
                    self.write_tag(RtonIdentifier::StrUnicodeDef)?;
                    write_unicode_payload(&mut self.writer, &s.text)?;
                    self.strings.unicode.push(&s.text);
                }
            }
        }
        Ok(())
    }

    /// Keys go through here: a canonical RTID rendering is written with the
    /// RTID tag family, which the decoder turns back into the same key text.
    /// The decoder can only restore the default encoding for that text, so
    /// other keys stay plain strings.
    fn write_key(&mut self, key: &Str) -> Result<()> {
        if key.has_default_encoding()
            && Rtid::is_canonical(&key.text)
            && let Some(rtid) = Rtid::parse(&key.text)
        {
            return self.write_rtid(&rtid);
        }
        self.write_interned_string(key)
    }

    fn write_rtid(&mut self, rtid: &Rtid) -> Result<()> {
        match rtid {
            Rtid::Null => self.write_tag(RtonIdentifier::RtidZero)?,
            Rtid::Uid {
                first,
                middle,
                last,
                group,
            } => {
                self.write_tag(RtonIdentifier::Rtid)?;
                self.writer.write_u8(RtidIdentifier::Uid as u8)?;
                write_unicode_payload(&mut self.writer, group)?;
                self.writer.write_varint(*middle)?;
                self.writer.write_varint(*first)?;
                self.writer.write_u32::<LittleEndian>(*last)?;
            }
            Rtid::Alias { name, group } => {
                self.write_tag(RtonIdentifier::Rtid)?;
                self.writer.write_u8(RtidIdentifier::Alias as u8)?;
                write_unicode_payload(&mut self.writer, group)?;
                write_unicode_payload(&mut self.writer, name)?;
            }
        }
        Ok(())
    }

    fn write_int(&mut self, int: Int) -> Result<()> {
        match int {
            Int::I8(0) => self.write_tag(RtonIdentifier::Int8Zero)?,
            Int::I8(v) => {
                self.write_tag(RtonIdentifier::Int8)?;
                self.writer.write_i8(v)?;
            }
            Int::U8(0) => self.write_tag(RtonIdentifier::UInt8Zero)?,
            Int::U8(v) => {
                self.write_tag(RtonIdentifier::UInt8)?;
                self.writer.write_u8(v)?;
            }
            Int::I16(0) => self.write_tag(RtonIdentifier::Int16Zero)?,
            Int::I16(v) => {
                self.write_tag(RtonIdentifier::Int16)?;
                self.writer.write_i16::<LittleEndian>(v)?;
            }
            Int::U16(0) => self.write_tag(RtonIdentifier::UInt16Zero)?,
            Int::U16(v) => {
                self.write_tag(RtonIdentifier::UInt16)?;
                self.writer.write_u16::<LittleEndian>(v)?;
            }
            Int::I32(0) => self.write_tag(RtonIdentifier::Int32Zero)?,
            Int::I32(v) if prefers_varint(v, 4) => {
                self.write_tag(RtonIdentifier::VarIntI32)?;
                self.writer.write_varint(v)?;
            }
            Int::I32(v) => {
                self.write_tag(RtonIdentifier::Int32)?;
                self.writer.write_i32::<LittleEndian>(v)?;
            }
            Int::U32(0) => self.write_tag(RtonIdentifier::UInt32Zero)?,
            Int::U32(v) if prefers_varint(v, 4) => {
                self.write_tag(RtonIdentifier::VarIntU32)?;
                self.writer.write_varint(v)?;
            }
            Int::U32(v) => {
                self.write_tag(RtonIdentifier::UInt32)?;
                self.writer.write_u32::<LittleEndian>(v)?;
            }
            Int::I64(0) => self.write_tag(RtonIdentifier::Int64Zero)?,
            Int::I64(v) if prefers_varint(v, 8) => {
                self.write_tag(RtonIdentifier::VarIntI64)?;
                self.writer.write_varint(v)?;
            }
            Int::I64(v) => {
                self.write_tag(RtonIdentifier::Int64)?;
                self.writer.write_i64::<LittleEndian>(v)?;
            }
            Int::U64(0) => self.write_tag(RtonIdentifier::UInt64Zero)?,
            Int::U64(v) if prefers_varint(v, 8) => {
                self.write_tag(RtonIdentifier::VarIntU64)?;
                self.writer.write_varint(v)?;
            }
            Int::U64(v) => {
                self.write_tag(RtonIdentifier::UInt64)?;
                self.writer.write_u64::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }

    fn write_float(&mut self, float: Float) -> Result<()> {
        // only +0.0 takes the zero tag; -0.0 keeps its sign bit
        match float {
            Float::F32(v) if v.to_bits() == 0 => self.write_tag(RtonIdentifier::FloatZero)?,
            Float::F32(v) => {
                self.write_tag(RtonIdentifier::Float)?;
                self.writer.write_f32::<LittleEndian>(v)?;
            }
            Float::F64(v) if v.to_bits() == 0 => self.write_tag(RtonIdentifier::DoubleZero)?,
            Float::F64(v) => {
                self.write_tag(RtonIdentifier::Double)?;
                self.writer.write_f64::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }

    /// Writes entries and `object_end`; the caller decides whether an
    /// `object_begin` precedes them (the root has none).
    pub fn write_object_body(&mut self, entries: &[(Str, RtonValue)]) -> Result<()> {
        for (key, value) in entries {
            self.write_key(key)?;
            self.write_value(value)?;
        }
        self.write_tag(RtonIdentifier::ObjectEnd)
    }

    pub fn write_value(&mut self, value: &RtonValue) -> Result<()> {
        match value {
            RtonValue::Null => self.write_tag(RtonIdentifier::StrNull),
            RtonValue::Bool(true) => self.write_tag(RtonIdentifier::BoolTrue),
            RtonValue::Bool(false) => self.write_tag(RtonIdentifier::BoolFalse),
            RtonValue::Int(int) => self.write_int(*int),
            RtonValue::Float(float) => self.write_float(*float),
            RtonValue::Str(s) => self.write_interned_string(s),
            RtonValue::Rtid(rtid) => self.write_rtid(rtid),
            RtonValue::Array(elements) => {
                self.write_tag(RtonIdentifier::ArrayStart)?;
                self.write_tag(RtonIdentifier::ArrayCapacity)?;
                self.writer.write_varint(elements.len() as u64)?;
                for element in elements {
                    self.write_value(element)?;
                }
                self.write_tag(RtonIdentifier::ArrayEnd)
            }
            RtonValue::Object(entries) => {
                self.write_tag(RtonIdentifier::ObjectStart)?;
                self.write_object_body(entries)
            }
        }
    }
}

/// Serializes a document as RTON into the IO stream.
pub fn to_writer<W: Write>(mut writer: W, value: &RtonValue) -> Result<()> {
    let RtonValue::Object(entries) = value else {
        return Err(Error::RootNotObject);
    };

    write_header(&mut writer)?;

    let mut strings = StringPool::new();
    {
        let mut serializer = RtonSerializer::new(&mut writer, &mut strings);
        serializer.write_object_body(entries)?;
    }

    write_footer(&mut writer)?;
    debug!(
        native_strings = strings.native.len(),
        unicode_strings = strings.unicode.len(),
        "encoded RTON document"
    );
    Ok(())
}

/// Serializes a document to a RTON byte vector.
pub fn encode(value: &RtonValue) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    to_writer(&mut data, value)?;
    Ok(data)
}
