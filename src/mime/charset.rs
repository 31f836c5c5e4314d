//! Text payload decoding with a best-effort fallback.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::borrow::Cow;

/// Outcome of decoding a text part.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<'a> {
  /// Bytes were valid for the declared (or assumed) charset.
  Exact(Cow<'a, str>),
  /// Bytes were invalid; decoded byte-for-byte as windows-1252 instead.
  Fallback(Cow<'a, str>),
}

impl<'a> Decoded<'a> {
  pub fn is_fallback(&self) -> bool {
    matches!(self, Decoded::Fallback(_))
  }

  pub fn into_text(self) -> Cow<'a, str> {
    match self {
      Decoded::Exact(s) | Decoded::Fallback(s) => s,
    }
  }
}

/// Resolve the encoding for a declared charset label.
///
/// `us-ascii` is the MIME default when nothing is declared; real-world mail
/// labelled that way is routinely 8-bit UTF-8, so it is treated as UTF-8, as
/// are unknown labels.
pub fn encoding_for(charset: &str) -> &'static Encoding {
  let label = charset.trim().trim_matches('"');
  if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
    return UTF_8;
  }
  Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8)
}

/// Decode `bytes` strictly in `charset`, falling back to windows-1252 on
/// malformed input. Never fails.
pub fn decode_text<'a>(bytes: &'a [u8], charset: &str) -> Decoded<'a> {
  let encoding = encoding_for(charset);
  if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
    return Decoded::Exact(text);
  }
  let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
  Decoded::Fallback(text)
}
