use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::crypto::{self, CipherKey};
use crate::de::{DecodeOptions, from_bytes};
use crate::error::{Error, Result};
use crate::ser::encode;
use crate::value::RtonValue;

fn output_path(input: &Path, output: Option<&Path>, extension: &str) -> PathBuf {
    match output {
        Some(p) => p.to_path_buf(),
        None => input.with_extension(extension),
    }
}

/// Decodes RTON bytes, stripping the cipher envelope when present.
pub fn decode_bytes(
    data: &[u8],
    key: Option<&CipherKey>,
    options: &DecodeOptions,
) -> Result<RtonValue> {
    if crypto::is_encrypted(data) {
        let key = key.ok_or(Error::MissingKey)?;
        let plain = key.decrypt(data)?;
        return from_bytes(&plain, options);
    }
    from_bytes(data, options)
}

/// Encodes a document, wrapping it in the cipher envelope when a key is given.
pub fn encode_bytes(value: &RtonValue, key: Option<&CipherKey>) -> Result<Vec<u8>> {
    let data = encode(value)?;
    match key {
        Some(key) => key.encrypt(&data),
        None => Ok(data),
    }
}

/// Decode RTON -> JSON
pub fn decode_file(
    input: &Path,
    output: Option<&Path>,
    key: Option<&CipherKey>,
    options: &DecodeOptions,
) -> Result<PathBuf> {
    let data = fs::read(input)?;
    let value = decode_bytes(&data, key, options)?;

    let out_path = output_path(input, output, "json");
    let json = serde_json::to_string_pretty(&value)?;
    fs::write(&out_path, json)?;
    info!(input = %input.display(), output = %out_path.display(), "decoded RTON");
    Ok(out_path)
}

/// Encode JSON -> RTON
pub fn encode_file(input: &Path, output: Option<&Path>, key: Option<&CipherKey>) -> Result<PathBuf> {
    let content = fs::read_to_string(input)?;
    let value: RtonValue = serde_json::from_str(&content)?;

    let out_path = output_path(input, output, "rton");
    let data = encode_bytes(&value, key)?;
    fs::write(&out_path, data)?;
    info!(input = %input.display(), output = %out_path.display(), "encoded RTON");
    Ok(out_path)
}

pub fn encrypt_file(input: &Path, output: Option<&Path>, key: &CipherKey) -> Result<PathBuf> {
    let data = fs::read(input)?;
    let encrypted = key.encrypt(&data)?;

    let out_path = output_path(input, output, "encrypted");
    fs::write(&out_path, encrypted)?;
    info!(input = %input.display(), output = %out_path.display(), "encrypted");
    Ok(out_path)
}

pub fn decrypt_file(input: &Path, output: Option<&Path>, key: &CipherKey) -> Result<PathBuf> {
    let data = fs::read(input)?;
    let decrypted = key.decrypt(&data)?;

    let out_path = output_path(input, output, "decrypted");
    fs::write(&out_path, decrypted)?;
    info!(input = %input.display(), output = %out_path.display(), "decrypted");
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::Str;
    use tempfile::tempdir;

    fn sample() -> RtonValue {
        RtonValue::Object(vec![
            (Str::native("a"), 0i32.into()),
            (Str::native("b"), "x".into()),
        ])
    }

    #[test]
    fn test_encrypted_input_needs_key() {
        let key = CipherKey::from_seed("seed");
        let data = encode_bytes(&sample(), Some(&key)).unwrap();

        let err = decode_bytes(&data, None, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingKey));
        assert_eq!(err.kind(), ErrorKind::Crypto);

        let value = decode_bytes(&data, Some(&key), &DecodeOptions::default()).unwrap();
        assert_eq!(value, sample());
    }

    #[test]
    fn test_plain_input_ignores_key() {
        let key = CipherKey::from_seed("seed");
        let data = encode_bytes(&sample(), None).unwrap();
        let value = decode_bytes(&data, Some(&key), &DecodeOptions::default()).unwrap();
        assert_eq!(value, sample());
    }

    #[test]
    fn test_file_pipeline() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("doc.json");
        fs::write(&json_path, r#"{"a": 0, "b": "x", "c": "RTID(0)"}"#).unwrap();

        let rton_path = encode_file(&json_path, None, None).unwrap();
        assert_eq!(rton_path, dir.path().join("doc.rton"));

        let back = dir.path().join("back.json");
        decode_file(&rton_path, Some(&back), None, &DecodeOptions::default()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&back).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"a": 0, "b": "x", "c": "RTID(0)"}));
    }

    #[test]
    fn test_encrypt_decrypt_files() {
        let dir = tempdir().unwrap();
        let key = CipherKey::from_seed("seed");
        let input = dir.path().join("doc.rton");
        let plain = encode(&sample()).unwrap();
        fs::write(&input, &plain).unwrap();

        let encrypted = encrypt_file(&input, None, &key).unwrap();
        assert_eq!(encrypted, dir.path().join("doc.encrypted"));
        let decrypted = fs::read(decrypt_file(&encrypted, None, &key).unwrap()).unwrap();
        assert_eq!(decrypted.len() % 24, 0);
        assert_eq!(&decrypted[..plain.len()], plain);
        // the zero padding after DONE does not bother the decoder
        let value = decode_bytes(&decrypted, None, &DecodeOptions::default()).unwrap();
        assert_eq!(value, sample());
    }
}
