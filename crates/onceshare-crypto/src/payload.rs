//! Canonical plaintext encoding for text and file secrets
//!
//! Text is stored as its UTF-8 bytes. Files carry a small header so the
//! recipient gets the original name back:
//! ```text
//! [2 bytes: name length, BE, 1..=255][name UTF-8][1 byte: MIME length][MIME ASCII][file bytes]
//! ```

use onceshare_core::{Format, ShareError, ShareResult};
use std::path::Path;
use zeroize::Zeroizing;

/// Longest filename carried in a file header, in bytes.
pub const MAX_NAME_LEN: usize = 255;

const DEFAULT_NAME: &str = "secret.bin";
const DEFAULT_MIME: &str = "application/octet-stream";

/// What the producer typed or picked, and what the recipient gets back.
pub enum OriginalInput {
    Text(Zeroizing<String>),
    File {
        name: String,
        mime: String,
        bytes: Zeroizing<Vec<u8>>,
    },
}

impl OriginalInput {
    pub fn text(s: impl Into<String>) -> Self {
        OriginalInput::Text(Zeroizing::new(s.into()))
    }

    /// File input; the MIME hint is guessed from the name's extension.
    pub fn file(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = mime_from_name(&name);
        OriginalInput::File {
            name,
            mime,
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            OriginalInput::Text(_) => Format::Text,
            OriginalInput::File { .. } => Format::File,
        }
    }

    /// Size of the user-visible content (excluding any header).
    pub fn content_len(&self) -> usize {
        match self {
            OriginalInput::Text(s) => s.len(),
            OriginalInput::File { bytes, .. } => bytes.len(),
        }
    }
}

impl std::fmt::Debug for OriginalInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginalInput::Text(s) => f
                .debug_struct("Text")
                .field("len", &s.len())
                .finish(),
            OriginalInput::File { name, mime, bytes } => f
                .debug_struct("File")
                .field("name", name)
                .field("mime", mime)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Normalizes producer input into plaintext bytes and back.
#[derive(Debug, Clone, Copy)]
pub struct PayloadCodec {
    max_bytes: usize,
}

impl PayloadCodec {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Encode input into its canonical byte stream plus format tag.
    ///
    /// The size ceiling is checked first, before any allocation or key work.
    pub fn encode(&self, input: &OriginalInput) -> ShareResult<(Zeroizing<Vec<u8>>, Format)> {
        let size = input.content_len();
        if size > self.max_bytes {
            return Err(ShareError::PayloadTooLarge {
                size,
                max: self.max_bytes,
            });
        }

        match input {
            OriginalInput::Text(s) => Ok((Zeroizing::new(s.as_bytes().to_vec()), Format::Text)),
            OriginalInput::File { name, mime, bytes } => {
                let name = normalize_name(name);
                let mime = normalize_mime(mime);

                let mut out = Zeroizing::new(Vec::with_capacity(
                    2 + name.len() + 1 + mime.len() + bytes.len(),
                ));
                out.extend_from_slice(&(name.len() as u16).to_be_bytes());
                out.extend_from_slice(name.as_bytes());
                out.push(mime.len() as u8);
                out.extend_from_slice(mime.as_bytes());
                out.extend_from_slice(bytes);
                Ok((out, Format::File))
            }
        }
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(&self, plaintext: &[u8], format: Format) -> ShareResult<OriginalInput> {
        match format {
            Format::Text => {
                let s = std::str::from_utf8(plaintext)
                    .map_err(|_| ShareError::CorruptPayload("text is not valid UTF-8".into()))?;
                Ok(OriginalInput::Text(Zeroizing::new(s.to_string())))
            }
            Format::File => decode_file(plaintext),
        }
    }
}

fn decode_file(plaintext: &[u8]) -> ShareResult<OriginalInput> {
    let corrupt = |what: &str| ShareError::CorruptPayload(format!("file header: {what}"));

    if plaintext.len() < 2 {
        return Err(corrupt("truncated name length"));
    }
    let name_len = u16::from_be_bytes([plaintext[0], plaintext[1]]) as usize;
    if name_len == 0 || name_len > MAX_NAME_LEN {
        return Err(corrupt("name length out of range"));
    }
    let rest = &plaintext[2..];
    if rest.len() < name_len + 1 {
        return Err(corrupt("truncated name"));
    }
    let name = std::str::from_utf8(&rest[..name_len]).map_err(|_| corrupt("name is not UTF-8"))?;

    let rest = &rest[name_len..];
    let mime_len = rest[0] as usize;
    let rest = &rest[1..];
    if rest.len() < mime_len {
        return Err(corrupt("truncated MIME type"));
    }
    let mime = std::str::from_utf8(&rest[..mime_len])
        .ok()
        .filter(|m| m.is_ascii())
        .ok_or_else(|| corrupt("MIME type is not ASCII"))?;

    Ok(OriginalInput::File {
        name: name.to_string(),
        mime: mime.to_string(),
        bytes: Zeroizing::new(rest[mime_len..].to_vec()),
    })
}

/// Keep only the final path component, bounded to [`MAX_NAME_LEN`] bytes.
fn normalize_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NAME);

    if base.len() <= MAX_NAME_LEN {
        return base.to_string();
    }
    let mut end = MAX_NAME_LEN;
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    base[..end].to_string()
}

fn normalize_mime(mime: &str) -> &str {
    if mime.is_empty() || mime.len() > u8::MAX as usize || !mime.is_ascii() {
        DEFAULT_MIME
    } else {
        mime
    }
}

/// File name safe to create inside a chosen output directory.
pub fn safe_file_name(name: &str) -> String {
    let base = normalize_name(name);
    if base == "." || base == ".." {
        DEFAULT_NAME.to_string()
    } else {
        base
    }
}

/// MIME hint from a filename extension.
pub fn mime_from_name(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
