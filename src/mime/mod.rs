//! MIME extraction: subject, text/HTML bodies and attachment metadata.
//!
//! The walk is depth-first over the part tree. `multipart/*` parts are only
//! containers; every other part is a leaf. Text leaves are concatenated in
//! document order, other leaves become attachments when they carry a filename.
//! Any structural error aborts the whole extraction so the caller can record
//! the raw message as failed.

pub mod charset;

use crate::{
  error::ExtractionError,
  models::{
    attachment::attachment_meta::AttachmentMeta, content::extracted_content::ExtractedContent,
  },
};
use charset::decode_text;
use mailparse::{MailHeaderMap, MailParseError, ParsedMail, parse_header, parse_mail};
use tracing::debug;

/// Decode `raw` into an [`ExtractedContent`].
pub fn extract(raw: &[u8]) -> Result<ExtractedContent, ExtractionError> {
  let parsed = parse_mail(raw).map_err(|e| ExtractionError::new(e.to_string(), raw))?;
  let subject = parsed.headers.get_first_value("Subject");
  let mut content = ExtractedContent::new(subject, raw.len());
  walk(&parsed, &mut content).map_err(|e| ExtractionError::new(e.to_string(), raw))?;
  Ok(content)
}

fn walk(part: &ParsedMail<'_>, out: &mut ExtractedContent) -> Result<(), MailParseError> {
  let mimetype = part.ctype.mimetype.to_ascii_lowercase();
  if mimetype.starts_with("multipart/") {
    for sub in &part.subparts {
      walk(sub, out)?;
    }
    return Ok(());
  }

  match mimetype.as_str() {
    "text/plain" => append_text(part, &mut out.text_body)?,
    "text/html" => append_text(part, &mut out.html_body)?,
    _ => {
      if let Some(filename) = part_filename(part) {
        let size = part.get_body_raw()?.len() as i64;
        out.attachments.push(AttachmentMeta {
          filename,
          content_type: mimetype,
          size,
        });
      }
    }
  }
  Ok(())
}

fn append_text(part: &ParsedMail<'_>, acc: &mut String) -> Result<(), MailParseError> {
  let bytes = part.get_body_raw()?;
  let decoded = decode_text(&bytes, &part.ctype.charset);
  if decoded.is_fallback() {
    debug!(
      "{} part not valid {}, used fallback decoding",
      part.ctype.mimetype, part.ctype.charset
    );
  }
  acc.push_str(&decoded.into_text());
  Ok(())
}

/// Filename from Content-Disposition, else the Content-Type `name` parameter.
fn part_filename(part: &ParsedMail<'_>) -> Option<String> {
  let disposition = part.get_content_disposition();
  disposition
    .params
    .get("filename")
    .or_else(|| part.ctype.params.get("name"))
    .map(|f| decode_words(f.trim().trim_matches(['"', '\''])))
    .filter(|f| !f.is_empty())
}

/// Decode RFC 2047 encoded words left inside a parameter value.
fn decode_words(value: &str) -> String {
  if !value.contains("=?") {
    return value.to_string();
  }
  let line = format!("X: {value}");
  match parse_header(line.as_bytes()) {
    Ok((header, _)) => header.get_value(),
    Err(_) => value.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::content::extracted_content::NO_SUBJECT;
  use base64::Engine;
  use base64::engine::general_purpose::STANDARD as B64;

  fn multipart_fixture() -> Vec<u8> {
    let pdf = B64.encode([0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    format!(
      concat!(
        "From: dev@example.test\r\n",
        "To: you@example.com\r\n",
        "Subject: =?utf-8?B?SGVsbG8g?= =?utf-8?Q?W=C3=B6rld?=\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=OUTER\r\n",
        "\r\n",
        "--OUTER\r\n",
        "Content-Type: multipart/alternative; boundary=INNER\r\n",
        "\r\n",
        "--INNER\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Plain body\r\n",
        "--INNER\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<p>HTML body</p>\r\n",
        "--INNER--\r\n",
        "--OUTER\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
        "\r\n",
        "{pdf}\r\n",
        "--OUTER\r\n",
        "Content-Type: image/png; name=\"logo.png\"\r\n",
        "\r\n",
        "PNG\r\n",
        "--OUTER\r\n",
        "Content-Type: application/octet-stream\r\n",
        "\r\n",
        "no filename, ignored\r\n",
        "--OUTER--\r\n",
      ),
      pdf = pdf
    )
    .into_bytes()
  }

  #[test]
  fn extracts_nested_multipart() {
    let raw = multipart_fixture();
    let c = extract(&raw).unwrap();
    assert_eq!(c.subject, "Hello Wörld");
    assert_eq!(c.text_body.trim_end(), "Plain body");
    assert_eq!(c.html_body.trim_end(), "<p>HTML body</p>");
    assert_eq!(c.raw_size, raw.len());
    assert_eq!(c.attachments.len(), 2);
    assert_eq!(
      c.attachments[0],
      AttachmentMeta {
        filename: "report.pdf".into(),
        content_type: "application/pdf".into(),
        size: 10,
      }
    );
    assert_eq!(c.attachments[1].filename, "logo.png");
    assert_eq!(c.attachments[1].content_type, "image/png");
  }

  #[test]
  fn missing_subject_uses_placeholder() {
    let c = extract(b"From: a@b.c\r\n\r\nbody\r\n").unwrap();
    assert_eq!(c.subject, NO_SUBJECT);
    assert_eq!(c.text_body, "body\r\n");
  }

  #[test]
  fn multiple_text_parts_concatenate_in_order() {
    let raw = concat!(
      "Content-Type: multipart/mixed; boundary=B\r\n",
      "\r\n",
      "--B\r\n",
      "Content-Type: text/plain\r\n",
      "\r\n",
      "one\r\n",
      "--B\r\n",
      "Content-Type: text/plain\r\n",
      "\r\n",
      "two\r\n",
      "--B--\r\n",
    );
    let c = extract(raw.as_bytes()).unwrap();
    assert!(c.text_body.find("one").unwrap() < c.text_body.find("two").unwrap());
    assert!(c.html_body.is_empty());
  }

  #[test]
  fn quoted_printable_latin1_body() {
    let raw = concat!(
      "Subject: caf\r\n",
      "Content-Type: text/plain; charset=iso-8859-1\r\n",
      "Content-Transfer-Encoding: quoted-printable\r\n",
      "\r\n",
      "caf=E9 cr=E8me\r\n",
    );
    let c = extract(raw.as_bytes()).unwrap();
    assert_eq!(c.text_body.trim_end(), "café crème");
  }

  #[test]
  fn invalid_bytes_fall_back_instead_of_failing() {
    let mut raw = b"Subject: broken\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nabc ".to_vec();
    raw.extend_from_slice(&[0xff, 0xc3, 0x28]);
    raw.extend_from_slice(b" xyz\r\n");
    let c = extract(&raw).unwrap();
    assert!(c.text_body.starts_with("abc "));
    assert!(c.text_body.contains("xyz"));
  }

  #[test]
  fn encoded_attachment_name_is_decoded() {
    let raw = concat!(
      "Content-Type: multipart/mixed; boundary=B\r\n",
      "\r\n",
      "--B\r\n",
      "Content-Type: application/zip; name=\"=?utf-8?B?5paH5Lu2LnppcA==?=\"\r\n",
      "\r\n",
      "PK\r\n",
      "--B--\r\n",
    );
    let c = extract(raw.as_bytes()).unwrap();
    assert_eq!(c.attachments.len(), 1);
    assert_eq!(c.attachments[0].filename, "文件.zip");
  }

  #[test]
  fn structural_error_keeps_raw_bytes() {
    let raw = b" leading whitespace is a continuation with no header\r\n\r\nbody";
    let err = extract(raw).unwrap_err();
    assert_eq!(err.raw, raw.to_vec());
    assert!(!err.cause.is_empty());
  }
}
