use byteorder::{LittleEndian, ReadBytesExt};
use integer_encoding::VarIntReader;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

use crate::constants::{
    FILE_FOOTER, FILE_HEADER, FILE_VERSION, MAX_DEPTH, RtidIdentifier, RtonIdentifier,
};
use crate::error::{Error, Result};
use crate::rtid::Rtid;
use crate::string_table::StringPool;
use crate::value::{Float, Int, RtonValue, Str};

/// Knobs for [`from_reader`] and [`from_bytes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Accept documents whose `DONE` footer is missing or damaged.
    pub lenient: bool,
}

impl DecodeOptions {
    pub fn lenient() -> Self {
        Self { lenient: true }
    }
}

pub struct RtonDeserializer<'a, R> {
    reader: R,
    strings: &'a mut StringPool,
    depth: usize,
}

macro_rules! read_primitive {
    ($reader:expr, $read_fn:ident) => {
        $reader.$read_fn::<LittleEndian>().map_err(Error::Io)?
    };
}

// Helper: Read a native string by byte length
fn read_native_string<R: Read>(reader: &mut R) -> Result<String> {
    let len: u64 = reader.read_varint()?;
    let mut buf = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(Error::StringLengthMismatch {
            expected: len,
            actual: buf.len() as u64,
        });
    }
    Ok(String::from_utf8(buf)?)
}

// Helper: Read a unicode string: character count, byte length, UTF-8 bytes
fn read_unicode_string<R: Read>(reader: &mut R) -> Result<String> {
    let char_count: u64 = reader.read_varint()?;
    let byte_len: u64 = reader.read_varint()?;
    let mut buf = Vec::new();
    reader.by_ref().take(byte_len).read_to_end(&mut buf)?;
    if buf.len() as u64 != byte_len {
        return Err(Error::StringLengthMismatch {
            expected: byte_len,
            actual: buf.len() as u64,
        });
    }
    let s = String::from_utf8(buf)?;
    let actual = s.chars().count() as u64;
    if actual != char_count {
        return Err(Error::StringLengthMismatch {
            expected: char_count,
            actual,
        });
    }
    Ok(s)
}

fn resolve(table: &crate::string_table::StringTable, idx: u64) -> Result<String> {
    table
        .get(idx)
        .map(str::to_string)
        .ok_or(Error::RefIndexOutOfBounds {
            index: idx,
            len: table.len(),
        })
}

fn validate_header<R: Read>(reader: &mut R) -> Result<()> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;
    if header != FILE_HEADER {
        return Err(Error::InvalidHeader);
    }
    let ver = reader.read_u32::<LittleEndian>()?;
    if ver != FILE_VERSION {
        return Err(Error::UnsupportedVersion(ver));
    }
    Ok(())
}

fn validate_footer<R: Read>(reader: &mut R, options: &DecodeOptions) -> Result<()> {
    let mut footer = Vec::with_capacity(FILE_FOOTER.len());
    reader
        .by_ref()
        .take(FILE_FOOTER.len() as u64)
        .read_to_end(&mut footer)?;
    if footer == FILE_FOOTER {
        return Ok(());
    }
    if options.lenient {
        warn!(found = ?footer, "RTON footer missing, accepted in lenient mode");
        return Ok(());
    }
    Err(Error::MissingFooter)
}

/// Decodes a complete RTON document. The root is always an object.
pub fn from_reader<R: Read>(mut reader: R, options: &DecodeOptions) -> Result<RtonValue> {
    validate_header(&mut reader)?;
    let mut strings = StringPool::new();
    let root = {
        let mut deserializer = RtonDeserializer::new(&mut reader, &mut strings);
        deserializer.read_object_body()?
    };
    validate_footer(&mut reader, options)?;
    debug!(
        native_strings = strings.native.len(),
        unicode_strings = strings.unicode.len(),
        "decoded RTON document"
    );
    Ok(root)
}

pub fn from_bytes(bytes: &[u8], options: &DecodeOptions) -> Result<RtonValue> {
    from_reader(Cursor::new(bytes), options)
}

/// Strict decode: the `DONE` footer is required.
pub fn decode(bytes: &[u8]) -> Result<RtonValue> {
    from_bytes(bytes, &DecodeOptions::default())
}

impl<'a, R: Read> RtonDeserializer<'a, R> {
    pub fn new(reader: R, strings: &'a mut StringPool) -> Self {
        RtonDeserializer {
            reader,
            strings,
            depth: 0,
        }
    }

    fn read_tag(&mut self) -> Result<u8> {
        Ok(self.reader.read_u8()?)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::NestingTooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    /// Reads key/value pairs up to and including `object_end`.
    pub fn read_object_body(&mut self) -> Result<RtonValue> {
        self.enter()?;
        let mut entries = Vec::new();
        loop {
            let tag_byte = self.read_tag()?;
            if tag_byte == RtonIdentifier::ObjectEnd as u8 {
                break;
            }
            let key = match self.read_value(tag_byte)? {
                RtonValue::Str(s) => s,
                RtonValue::Rtid(rtid) => Str::from_text(rtid.to_string()),
                _ => return Err(Error::InvalidKey(tag_byte)),
            };
            let value_tag = self.read_tag()?;
            let value = self.read_value(value_tag)?;
            entries.push((key, value));
        }
        self.depth -= 1;
        Ok(RtonValue::Object(entries))
    }

    fn read_array_body(&mut self) -> Result<RtonValue> {
        self.enter()?;
        let mut tag_byte = self.read_tag()?;
        let mut declared = None;
        if tag_byte == RtonIdentifier::ArrayCapacity as u8 {
            let capacity: u64 = self.reader.read_varint()?;
            declared = Some(capacity);
            tag_byte = self.read_tag()?;
        }

        let mut elements = Vec::with_capacity(declared.unwrap_or(0).min(1024) as usize);
        while tag_byte != RtonIdentifier::ArrayEnd as u8 {
            elements.push(self.read_value(tag_byte)?);
            tag_byte = self.read_tag()?;
        }

        if let Some(capacity) = declared
            && capacity != elements.len() as u64
        {
            debug!(
                declared = capacity,
                actual = elements.len(),
                "array size hint does not match element count"
            );
        }
        self.depth -= 1;
        Ok(RtonValue::Array(elements))
    }

    fn read_rtid(&mut self) -> Result<Rtid> {
        let sub_byte = self.reader.read_u8()?;
        let sub_id =
            RtidIdentifier::try_from(sub_byte).map_err(|_| Error::UnknownRtidSubId(sub_byte))?;
        match sub_id {
            RtidIdentifier::Zero => Ok(Rtid::Null),
            RtidIdentifier::UidNoString => {
                let middle: u32 = self.reader.read_varint()?;
                let first: u32 = self.reader.read_varint()?;
                let last = read_primitive!(self.reader, read_u32);
                Ok(Rtid::Uid {
                    first,
                    middle,
                    last,
                    group: String::new(),
                })
            }
            RtidIdentifier::Uid => {
                let group = read_unicode_string(&mut self.reader)?;
                let middle: u32 = self.reader.read_varint()?;
                let first: u32 = self.reader.read_varint()?;
                let last = read_primitive!(self.reader, read_u32);
                Ok(Rtid::Uid {
                    first,
                    middle,
                    last,
                    group,
                })
            }
            RtidIdentifier::Alias => {
                let group = read_unicode_string(&mut self.reader)?;
                let name = read_unicode_string(&mut self.reader)?;
                Ok(Rtid::Alias { name, group })
            }
        }
    }

    fn read_binary_blob(&mut self) -> Result<RtonValue> {
        let _ = self.reader.read_u8()?;
        let hex_str = read_native_string(&mut self.reader)?;
        let len: u64 = self.reader.read_varint()?;
        Ok(RtonValue::Str(Str::native(format!(
            "$BINARY(\"{}\", {})",
            hex_str, len
        ))))
    }

    /// Dispatches on an already consumed tag byte.
    pub fn read_value(&mut self, tag_byte: u8) -> Result<RtonValue> {
        let tag = RtonIdentifier::try_from(tag_byte).map_err(|_| Error::UnknownTag(tag_byte))?;

        let value = match tag {
            RtonIdentifier::BoolFalse => RtonValue::Bool(false),
            RtonIdentifier::BoolTrue => RtonValue::Bool(true),

            RtonIdentifier::Int8Zero => RtonValue::Int(Int::I8(0)),
            RtonIdentifier::UInt8Zero => RtonValue::Int(Int::U8(0)),
            RtonIdentifier::Int16Zero => RtonValue::Int(Int::I16(0)),
            RtonIdentifier::UInt16Zero => RtonValue::Int(Int::U16(0)),
            RtonIdentifier::Int32Zero => RtonValue::Int(Int::I32(0)),
            RtonIdentifier::UInt32Zero => RtonValue::Int(Int::U32(0)),
            RtonIdentifier::Int64Zero => RtonValue::Int(Int::I64(0)),
            RtonIdentifier::UInt64Zero => RtonValue::Int(Int::U64(0)),

            RtonIdentifier::Int8 => RtonValue::Int(Int::I8(self.reader.read_i8()?)),
            RtonIdentifier::UInt8 => RtonValue::Int(Int::U8(self.reader.read_u8()?)),
            RtonIdentifier::Int16 => RtonValue::Int(Int::I16(read_primitive!(self.reader, read_i16))),
            RtonIdentifier::UInt16 => {
                RtonValue::Int(Int::U16(read_primitive!(self.reader, read_u16)))
            }
            RtonIdentifier::Int32 => RtonValue::Int(Int::I32(read_primitive!(self.reader, read_i32))),
            RtonIdentifier::UInt32 => {
                RtonValue::Int(Int::U32(read_primitive!(self.reader, read_u32)))
            }
            RtonIdentifier::Int64 => RtonValue::Int(Int::I64(read_primitive!(self.reader, read_i64))),
            RtonIdentifier::UInt64 => {
                RtonValue::Int(Int::U64(read_primitive!(self.reader, read_u64)))
            }

            RtonIdentifier::VarIntU32 | RtonIdentifier::VarIntU32Alt => {
                RtonValue::Int(Int::U32(self.reader.read_varint::<u32>()?))
            }
            RtonIdentifier::VarIntI32 => RtonValue::Int(Int::I32(self.reader.read_varint::<i32>()?)),
            RtonIdentifier::VarIntU64 | RtonIdentifier::VarIntU64Alt => {
                RtonValue::Int(Int::U64(self.reader.read_varint::<u64>()?))
            }
            RtonIdentifier::VarIntI64 => RtonValue::Int(Int::I64(self.reader.read_varint::<i64>()?)),

            RtonIdentifier::Float => {
                RtonValue::Float(Float::F32(read_primitive!(self.reader, read_f32)))
            }
            RtonIdentifier::FloatZero => RtonValue::Float(Float::F32(0.0)),
            RtonIdentifier::Double => {
                RtonValue::Float(Float::F64(read_primitive!(self.reader, read_f64)))
            }
            RtonIdentifier::DoubleZero => RtonValue::Float(Float::F64(0.0)),

            RtonIdentifier::StrNative => {
                RtonValue::Str(Str::native(read_native_string(&mut self.reader)?))
            }
            RtonIdentifier::StrNativeDef => {
                let s = read_native_string(&mut self.reader)?;
                self.strings.native.push(&s);
                RtonValue::Str(Str::native(s))
            }
            RtonIdentifier::StrNativeRef => {
                let idx: u64 = self.reader.read_varint()?;
                RtonValue::Str(Str::native(resolve(&self.strings.native, idx)?))
            }

            RtonIdentifier::StrUnicode => {
                RtonValue::Str(Str::unicode(read_unicode_string(&mut self.reader)?))
            }
            RtonIdentifier::StrUnicodeDef => {
                let s = read_unicode_string(&mut self.reader)?;
                self.strings.unicode.push(&s);
                RtonValue::Str(Str::unicode(s))
            }
            RtonIdentifier::StrUnicodeRef => {
                let idx: u64 = self.reader.read_varint()?;
                RtonValue::Str(Str::unicode(resolve(&self.strings.unicode, idx)?))
            }

            RtonIdentifier::Rtid => RtonValue::Rtid(self.read_rtid()?),
            RtonIdentifier::RtidZero => RtonValue::Rtid(Rtid::Null),

            RtonIdentifier::ObjectStart => self.read_object_body()?,
            RtonIdentifier::ArrayStart => self.read_array_body()?,

            RtonIdentifier::ArrayCapacity
            | RtonIdentifier::ArrayEnd
            | RtonIdentifier::ObjectEnd => return Err(Error::UnexpectedMarker(tag_byte)),

            RtonIdentifier::StrNull => RtonValue::Null,
            RtonIdentifier::BinaryBlob => self.read_binary_blob()?,
            RtonIdentifier::BoolX1 => RtonValue::Bool(self.reader.read_u8()? != 0),

            RtonIdentifier::StrNativeX1
            | RtonIdentifier::StrNativeX2
            | RtonIdentifier::StrUnicodeX1
            | RtonIdentifier::StrUnicodeX2
            | RtonIdentifier::StrNativeOrUnicodeX1
            | RtonIdentifier::StrNativeOrUnicodeX2
            | RtonIdentifier::StrNativeOrUnicodeX3
            | RtonIdentifier::StrNativeOrUnicodeX4
            | RtonIdentifier::ObjectStartX1
            | RtonIdentifier::ArrayStartX1
            | RtonIdentifier::StrNativeX3
            | RtonIdentifier::StrBinaryBlobX1 => return Err(Error::ReservedTag(tag_byte)),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn document(body: &[u8]) -> Vec<u8> {
        let mut bytes = b"RTON\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(body);
        bytes.extend_from_slice(b"DONE");
        bytes
    }

    #[test]
    fn test_empty_object() {
        let v = decode(&document(&[0xff])).unwrap();
        assert_eq!(v, RtonValue::Object(vec![]));
    }

    #[test]
    fn test_indexed_string() {
        // {"a": "a"} with the value as a back reference
        let v = decode(&document(&[0x90, 0x01, b'a', 0x91, 0x00, 0xff])).unwrap();
        assert_eq!(
            v,
            RtonValue::Object(vec![(Str::native("a"), RtonValue::Str(Str::native("a")))])
        );
    }

    #[test]
    fn test_out_of_range_index() {
        let err = decode(&document(&[0x90, 0x01, b'a', 0x91, 0x01, 0xff])).unwrap_err();
        assert!(matches!(
            err,
            Error::RefIndexOutOfBounds { index: 1, len: 1 }
        ));
        assert_eq!(err.kind(), ErrorKind::Format);

        // the unicode table is separate from the native one
        let err = decode(&document(&[0x90, 0x01, b'a', 0x93, 0x00, 0xff])).unwrap_err();
        assert!(matches!(err, Error::RefIndexOutOfBounds { .. }));
    }

    #[test]
    fn test_zero_tags_and_varints() {
        let body = [
            0x90, 0x01, b'a', 0x21, // a: i32 zero
            0x90, 0x01, b'b', 0x25, 0x03, // b: zig-zag -2
            0x90, 0x01, b'c', 0x28, 0xac, 0x02, // c: u32 equivalent 300
            0x90, 0x01, b'd', 0x23, // d: f32 zero
            0xff,
        ];
        let v = decode(&document(&body)).unwrap();
        assert_eq!(v.get("a"), Some(&RtonValue::Int(Int::I32(0))));
        assert_eq!(v.get("b"), Some(&RtonValue::Int(Int::I32(-2))));
        assert_eq!(v.get("c"), Some(&RtonValue::Int(Int::U32(300))));
        assert_eq!(v.get("d"), Some(&RtonValue::Float(Float::F32(0.0))));
    }

    #[test]
    fn test_array_size_hint_is_optional() {
        let with_hint = [0x90, 0x01, b'a', 0x86, 0xfd, 0x05, 0x01, 0xfe, 0xff];
        let without_hint = [0x90, 0x01, b'a', 0x86, 0x01, 0xfe, 0xff];
        let expected = RtonValue::Array(vec![RtonValue::Bool(true)]);
        assert_eq!(decode(&document(&with_hint)).unwrap().get("a"), Some(&expected));
        assert_eq!(
            decode(&document(&without_hint)).unwrap().get("a"),
            Some(&expected)
        );
    }

    #[test]
    fn test_rtid_tags() {
        let body = [
            0x90, 0x01, b'u', 0x83, 0x02, 0x01, 0x01, b'g', 0x02, 0x01, 0x2a, 0, 0, 0, //
            0x90, 0x01, b'a', 0x83, 0x03, 0x01, 0x01, b'g', 0x01, 0x01, b'n', //
            0x90, 0x01, b'z', 0x84, //
            0xff,
        ];
        let v = decode(&document(&body)).unwrap();
        let rendered = |k: &str| match v.get(k) {
            Some(RtonValue::Rtid(r)) => r.to_string(),
            other => panic!("{k}: {other:?}"),
        };
        assert_eq!(rendered("u"), "RTID(1.2.0000002a@g)");
        assert_eq!(rendered("a"), "RTID(n@g)");
        assert_eq!(rendered("z"), "RTID(0)");
    }

    #[test]
    fn test_rtid_key_becomes_string() {
        let body = [0x84, 0x01, 0xff];
        let v = decode(&document(&body)).unwrap();
        assert_eq!(
            v,
            RtonValue::Object(vec![(Str::native("RTID(0)"), RtonValue::Bool(true))])
        );
    }

    fn decode_err(body: &[u8]) -> Error {
        let err = decode(&document(body)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "{err:?}");
        err
    }

    #[test]
    fn test_format_errors() {
        let err = decode_err(&[0x90, 0x01, b'a', 0x30, 0xff]);
        assert!(matches!(err, Error::UnknownTag(0x30)));
        let err = decode_err(&[0x90, 0x01, b'a', 0xb0, 0xff]);
        assert!(matches!(err, Error::ReservedTag(0xb0)));
        let err = decode_err(&[0x90, 0x01, b'a', 0xfe, 0xff]);
        assert!(matches!(err, Error::UnexpectedMarker(0xfe)));
        let err = decode_err(&[0x01, 0x01, 0xff]);
        assert!(matches!(err, Error::InvalidKey(0x01)));
        let err = decode_err(&[0x90, 0x01, b'a', 0x83, 0x07, 0xff]);
        assert!(matches!(err, Error::UnknownRtidSubId(0x07)));
    }

    #[test]
    fn test_native_string_must_be_utf8() {
        let err = decode_err(&[0x90, 0x01, b'k', 0x90, 0x02, 0xe9, 0x41, 0xff]);
        assert!(matches!(err, Error::Utf8(_)));
        let err = decode_err(&[0x81, 0x01, 0xff, 0x01, 0xff]);
        assert!(matches!(err, Error::Utf8(_)));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = b"RTON\x01\x00\x00\x00\x90\x05ab".to_vec();
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_header_and_version() {
        assert!(matches!(decode(b"RTOX\x01\x00\x00\x00\xffDONE"), Err(Error::InvalidHeader)));
        assert!(matches!(
            decode(b"RTON\x02\x00\x00\x00\xffDONE"),
            Err(Error::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_footer_leniency() {
        let bytes = b"RTON\x01\x00\x00\x00\xff".to_vec();
        assert!(matches!(decode(&bytes), Err(Error::MissingFooter)));
        let v = from_bytes(&bytes, &DecodeOptions::lenient()).unwrap();
        assert_eq!(v, RtonValue::Object(vec![]));

        let damaged = b"RTON\x01\x00\x00\x00\xffDON".to_vec();
        assert!(matches!(decode(&damaged), Err(Error::MissingFooter)));
        assert!(from_bytes(&damaged, &DecodeOptions::lenient()).is_ok());
    }

    #[test]
    fn test_nesting_limit() {
        let mut body = vec![0x90, 0x01, b'a'];
        body.extend(std::iter::repeat_n(0x85, MAX_DEPTH + 1));
        let err = decode(&document(&body)).unwrap_err();
        assert!(matches!(err, Error::NestingTooDeep(_)));
    }

    #[test]
    fn test_reserved_but_known_tags() {
        let body = [
            0x90, 0x01, b'n', 0x02, //
            0x90, 0x01, b'b', 0x87, 0x00, 0x02, b'A', b'B', 0x01, //
            0x90, 0x01, b'x', 0xbc, 0x01, //
            0xff,
        ];
        let v = decode(&document(&body)).unwrap();
        assert_eq!(v.get("n"), Some(&RtonValue::Null));
        assert_eq!(v.get("b").and_then(RtonValue::as_str), Some("$BINARY(\"AB\", 1)"));
        assert_eq!(v.get("x"), Some(&RtonValue::Bool(true)));
    }
}
