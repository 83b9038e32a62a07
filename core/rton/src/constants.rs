use num_enum::TryFromPrimitive;

pub const FILE_HEADER: &[u8] = b"RTON";
pub const FILE_FOOTER: &[u8] = b"DONE";
pub const FILE_VERSION: u32 = 1;

/// Header that precedes Rijndael-CBC ciphertext in encrypted files.
pub const CIPHER_HEADER: [u8; 2] = [0x10, 0x00];

/// Containers nested deeper than this are rejected by the decoder.
pub const MAX_DEPTH: usize = 512;

/// Leading byte of every value slot.
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum RtonIdentifier {
    BoolFalse = 0x00,
    BoolTrue = 0x01,

    // fixed-width little-endian payloads; the *Zero tags carry none
    Int8 = 0x08,
    Int8Zero = 0x09,
    UInt8 = 0x0a,
    UInt8Zero = 0x0b,

    Int16 = 0x10,
    Int16Zero = 0x11,
    UInt16 = 0x12,
    UInt16Zero = 0x13,

    Int32 = 0x20,
    Int32Zero = 0x21,
    UInt32 = 0x26,
    UInt32Zero = 0x27,

    Int64 = 0x40,
    Int64Zero = 0x41,
    UInt64 = 0x46,
    UInt64Zero = 0x47,

    // LEB128, zig-zag for the signed forms
    VarIntU32 = 0x24,
    VarIntI32 = 0x25,
    VarIntU32Alt = 0x28,

    VarIntU64 = 0x44,
    VarIntI64 = 0x45,
    VarIntU64Alt = 0x48,

    Float = 0x22,
    FloatZero = 0x23,
    Double = 0x42,
    DoubleZero = 0x43,

    // native: varint byte length + bytes
    // unicode: varint char count + varint byte length + UTF-8
    StrNative = 0x81,
    StrUnicode = 0x82,
    StrNativeDef = 0x90,
    StrNativeRef = 0x91,
    StrUnicodeDef = 0x92,
    StrUnicodeRef = 0x93,

    Rtid = 0x83,
    RtidZero = 0x84,

    ObjectStart = 0x85,
    ArrayStart = 0x86,

    /// Followed by a varint element count.
    ArrayCapacity = 0xfd,
    ArrayEnd = 0xfe,
    ObjectEnd = 0xff,

    // Never seen in shipped files. 0x02, 0x87 and 0xBC are decoded, the rest rejected.
    StrNull = 0x02,
    BinaryBlob = 0x87,
    StrNativeX1 = 0xB0,
    StrNativeX2 = 0xB1,
    StrUnicodeX1 = 0xB2,
    StrUnicodeX2 = 0xB3,
    StrNativeOrUnicodeX1 = 0xB4,
    StrNativeOrUnicodeX2 = 0xB5,
    StrNativeOrUnicodeX3 = 0xB6,
    StrNativeOrUnicodeX4 = 0xB7,
    ObjectStartX1 = 0xB8,
    ArrayStartX1 = 0xB9,
    StrNativeX3 = 0xBA,
    StrBinaryBlobX1 = 0xBB,
    BoolX1 = 0xBC,
}

/// Byte after the 0x83 tag.
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum RtidIdentifier {
    Zero = 0x00,
    /// uid without a group string
    UidNoString = 0x01,
    Uid = 0x02,
    Alias = 0x03,
}
