use base64::{Engine, engine::general_purpose::{STANDARD, STANDARD_NO_PAD}};
use sha2::{Digest, Sha256};

const NATIVE_ALGORITHMS: &[&str] = &[
    "ssh-rsa",
    "ssh-dss",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "ssh-ed25519",
];

const WRAPPED_ALGORITHMS: &[&str] = &[
    "sk-ssh-ed25519@openssh.com",
    "sk-ecdsa-sha2-nistp256@openssh.com",
];

/// Decoded public key. Only `Native` and `Wrapped` count as valid key
/// material; anything else is reported by its type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyObject {
    Native(NativeKey),
    Wrapped(WrappedKey),
    RawText(String),
    Missing,
}

/// Key accepted by the OpenSSH wire-format parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeKey {
    pub algorithm: String,
    pub blob: Vec<u8>,
    pub comment: Option<String>,
}

/// Security-key (FIDO) algorithm that only the wrapper type understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub algorithm: String,
    pub blob: Vec<u8>,
    pub comment: Option<String>,
}

impl KeyObject {
    pub fn parse(text: Option<&str>) -> Self {
        let text = match text.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return KeyObject::Missing,
        };

        let mut parts = text.split_whitespace();
        let (Some(algorithm), Some(encoded)) = (parts.next(), parts.next()) else {
            return KeyObject::RawText(text.to_string());
        };
        let comment = {
            let rest: Vec<&str> = parts.collect();
            if rest.is_empty() { None } else { Some(rest.join(" ")) }
        };

        let Ok(blob) = STANDARD.decode(encoded) else {
            return KeyObject::RawText(text.to_string());
        };

        // The blob repeats the algorithm name; a mismatch means a mangled key.
        if embedded_algorithm(&blob).as_deref() != Some(algorithm) {
            return KeyObject::RawText(text.to_string());
        }

        let algorithm = algorithm.to_string();
        if NATIVE_ALGORITHMS.contains(&algorithm.as_str()) {
            KeyObject::Native(NativeKey { algorithm, blob, comment })
        } else if WRAPPED_ALGORITHMS.contains(&algorithm.as_str()) {
            KeyObject::Wrapped(WrappedKey { algorithm, blob, comment })
        } else {
            KeyObject::RawText(text.to_string())
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            KeyObject::Native(_) => "NativeKey",
            KeyObject::Wrapped(_) => "WrappedKey",
            KeyObject::RawText(_) => "RawText",
            KeyObject::Missing => "None",
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, KeyObject::Native(_) | KeyObject::Wrapped(_))
    }

    /// Best-effort textual form, whatever the variant.
    pub fn text(&self) -> Option<String> {
        match self {
            KeyObject::Native(k) => Some(render(&k.algorithm, &k.blob, k.comment.as_deref())),
            KeyObject::Wrapped(k) => Some(render(&k.algorithm, &k.blob, k.comment.as_deref())),
            KeyObject::RawText(t) => Some(t.clone()),
            KeyObject::Missing => None,
        }
    }

    pub fn fingerprint(&self) -> Option<String> {
        match self {
            KeyObject::Native(k) => Some(sha256_fingerprint(&k.blob)),
            KeyObject::Wrapped(k) => Some(sha256_fingerprint(&k.blob)),
            _ => None,
        }
    }
}

fn render(algorithm: &str, blob: &[u8], comment: Option<&str>) -> String {
    match comment {
        Some(c) => format!("{} {} {}", algorithm, STANDARD.encode(blob), c),
        None => format!("{} {}", algorithm, STANDARD.encode(blob)),
    }
}

fn sha256_fingerprint(blob: &[u8]) -> String {
    let digest = Sha256::digest(blob);
    format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
}

fn embedded_algorithm(blob: &[u8]) -> Option<String> {
    let len_bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let name = blob.get(4..4usize.checked_add(len)?)?;
    String::from_utf8(name.to_vec()).ok()
}

#[cfg(test)]
pub(crate) fn key_text(algorithm: &str, comment: Option<&str>) -> String {
    let mut blob = Vec::new();
    blob.extend_from_slice(&(algorithm.len() as u32).to_be_bytes());
    blob.extend_from_slice(algorithm.as_bytes());
    blob.extend_from_slice(&32u32.to_be_bytes());
    blob.extend_from_slice(&[7u8; 32]);
    render(algorithm, &blob, comment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_native_ed25519() {
        let text = key_text("ssh-ed25519", Some("deploy@ci"));
        let key = KeyObject::parse(Some(&text));
        assert_eq!(key.type_name(), "NativeKey");
        assert!(key.is_recognized());
        assert_eq!(key.text().unwrap(), text);
    }

    #[test]
    fn test_parse_security_key_is_wrapped() {
        let text = key_text("sk-ssh-ed25519@openssh.com", None);
        let key = KeyObject::parse(Some(&text));
        assert_eq!(key.type_name(), "WrappedKey");
        assert!(key.is_recognized());
    }

    #[test]
    fn test_parse_missing() {
        assert_eq!(KeyObject::parse(None), KeyObject::Missing);
        assert_eq!(KeyObject::parse(Some("   ")), KeyObject::Missing);
        assert_eq!(KeyObject::Missing.type_name(), "None");
        assert!(KeyObject::Missing.text().is_none());
    }

    #[test]
    fn test_parse_garbage_is_raw_text() {
        let key = KeyObject::parse(Some("ssh-rsa !!!notbase64!!!"));
        assert_eq!(key.type_name(), "RawText");
        assert!(!key.is_recognized());
        assert_eq!(key.text().unwrap(), "ssh-rsa !!!notbase64!!!");
    }

    #[test]
    fn test_parse_algorithm_mismatch_is_raw_text() {
        let text = key_text("ssh-ed25519", None).replacen("ssh-ed25519", "ssh-rsa", 1);
        assert_eq!(KeyObject::parse(Some(&text)).type_name(), "RawText");
    }

    #[test]
    fn test_parse_unknown_algorithm_is_raw_text() {
        let text = key_text("ssh-foo", None);
        assert_eq!(KeyObject::parse(Some(&text)).type_name(), "RawText");
    }

    #[test]
    fn test_single_token_is_raw_text() {
        assert_eq!(KeyObject::parse(Some("AAAAB3Nza")).type_name(), "RawText");
    }

    #[test]
    fn test_fingerprint_format() {
        let text = key_text("ssh-ed25519", None);
        let fingerprint = KeyObject::parse(Some(&text)).fingerprint().unwrap();
        assert!(fingerprint.starts_with("SHA256:"));
        assert!(!fingerprint.ends_with('='));
        assert!(KeyObject::RawText("x".into()).fingerprint().is_none());
    }
}
