pub mod batch;
mod constants;
pub mod crypto;
mod de;
mod error;
pub mod process;
mod rtid;
mod ser;
mod string_table;
mod value;

pub use error::{Error, ErrorKind, Result};
pub use rtid::Rtid;
pub use string_table::{StringPool, StringTable};
pub use value::{Float, Int, RtonValue, Str, StrEncoding};

pub use de::{DecodeOptions, RtonDeserializer, decode, from_bytes, from_reader};
pub use ser::{RtonSerializer, encode, to_writer};

pub use constants::{CIPHER_HEADER, FILE_VERSION, RtidIdentifier, RtonIdentifier};
pub use crypto::CipherKey;
