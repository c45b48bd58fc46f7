use encoding_rs::{Encoding, UTF_8};
use tracing::warn;

/// Decode a response body using a WHATWG encoding label (`utf-8`, `gbk`,
/// `iso-8859-1`, ...). Unknown labels fall back to UTF-8; malformed sequences
/// are replaced rather than rejected.
pub fn decode_body(bytes: &[u8], label: &str) -> String {
  let label = label.trim();
  let encoding = if label.is_empty() {
    UTF_8
  } else {
    Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
      warn!(encoding = %label, "unknown response encoding, using utf-8");
      UTF_8
    })
  };

  let (text, _, _) = encoding.decode(bytes);
  text.into_owned()
}
