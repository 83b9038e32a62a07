use crate::constants::CIPHER_HEADER;
use crate::error::{Error, Result};
use simple_rijndael::impls::RijndaelCbc;
use simple_rijndael::paddings::ZeroPadding;

const VALID_SIZES: [usize; 3] = [16, 24, 32];

/// Key material for the cipher envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherKey {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl CipherKey {
    pub fn new(key: impl Into<Vec<u8>>, iv: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        let iv = iv.into();
        check_sizes(&key, &iv)?;
        Ok(Self { key, iv })
    }

    /// Derive Key and IV from a seed string using MD5.
    ///
    /// The key is the 32 hex characters of the digest, the IV is characters
    /// 4..28 of the same string.
    pub fn from_seed(seed: &str) -> Self {
        let digest = md5::compute(seed).0;
        let hex_string = hex::encode(digest);
        let hex_bytes = hex_string.as_bytes();

        Self {
            key: hex_bytes.to_vec(),
            iv: hex_bytes[4..28].to_vec(),
        }
    }

    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>> {
        encrypt(plain, &self.key, &self.iv)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        decrypt(data, &self.key, &self.iv)
    }
}

fn check_sizes(key: &[u8], iv: &[u8]) -> Result<()> {
    if !VALID_SIZES.contains(&key.len()) {
        return Err(Error::InvalidKeySize(key.len()));
    }
    if !VALID_SIZES.contains(&iv.len()) {
        return Err(Error::InvalidIvSize(iv.len()));
    }
    Ok(())
}

fn cipher(key: &[u8], block_size: usize) -> Result<RijndaelCbc<ZeroPadding>> {
    RijndaelCbc::<ZeroPadding>::new(key, block_size)
        .map_err(|e| Error::Cipher(format!("cipher init failed: {:?}", e)))
}

/// True when `data` starts with the envelope header.
pub fn is_encrypted(data: &[u8]) -> bool {
    data.starts_with(&CIPHER_HEADER)
}

/// Encrypts with Rijndael-CBC, block size equal to the IV length.
///
/// The plaintext is zero-padded to the block boundary and the result is
/// prefixed with the two-byte envelope header.
pub fn encrypt(plain: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_sizes(key, iv)?;
    let block_size = iv.len();

    let mut padded = plain.to_vec();
    let rem = padded.len() % block_size;
    if rem != 0 {
        padded.resize(padded.len() + block_size - rem, 0);
    }

    let encrypted = cipher(key, block_size)?
        .encrypt(iv, padded)
        .map_err(|e| Error::Cipher(format!("encryption failed: {:?}", e)))?;

    let mut out = Vec::with_capacity(CIPHER_HEADER.len() + encrypted.len());
    out.extend_from_slice(&CIPHER_HEADER);
    out.extend_from_slice(&encrypted);
    Ok(out)
}

/// Inverse of [`encrypt`].
///
/// Returns the whole block-aligned plaintext: input that was not a multiple of
/// the block size comes back with the zero padding [`encrypt`] appended.
pub fn decrypt(data: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_sizes(key, iv)?;
    let block_size = iv.len();

    let body = data
        .strip_prefix(&CIPHER_HEADER[..])
        .ok_or(Error::MissingCipherHeader)?;
    if body.is_empty() || body.len() % block_size != 0 {
        return Err(Error::MisalignedCiphertext {
            len: body.len(),
            block_size,
        });
    }

    let mut decrypted = cipher(key, block_size)?
        .decrypt(iv, body.to_vec())
        .map_err(|e| Error::Cipher(format!("decryption failed: {:?}", e)))?;

    // CBC plaintext is exactly as long as the body; restore any trailing
    // zeros the padding scheme dropped
    decrypted.resize(body.len(), 0);
    Ok(decrypted)
}
