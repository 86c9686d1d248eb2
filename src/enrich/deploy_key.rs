use std::fmt;
use std::sync::Arc;
use regex::Regex;
use tracing::debug;
use crate::engine::{Failure, FailureSubject, RecordSource};
use crate::report::FailureRecord;
use crate::secret::KeyObject;
use super::Enricher;

pub const DEFAULT_PREVIEW_LEN: usize = 40;

const ELLIPSIS: &str = "...";
const PROJECT_SEPARATOR: &str = ", ";

/// Identity of a deploy key as it appears in log lines:
/// `Deploy Key ID <id> – Title: <title> – Projects: [<a>, <b>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployKeyContext {
    pub id: i64,
    pub title: String,
    pub projects: Vec<String>,
}

impl DeployKeyContext {
    /// Recover the identity from a rendered context line. Only used for
    /// failures that arrive without a structured subject.
    pub fn parse(pattern: &Regex, context: &str) -> Option<Self> {
        let caps = pattern.captures(context)?;
        let id = caps.get(1)?.as_str().parse().ok()?;
        let title = caps.get(2)?.as_str().to_string();
        let projects = match caps.get(3)?.as_str() {
            "" => Vec::new(),
            list => list.split(PROJECT_SEPARATOR).map(String::from).collect(),
        };
        Some(Self { id, title, projects })
    }

    pub fn pattern() -> Regex {
        Regex::new(r"^Deploy Key ID (\d+) – Title: (.*) – Projects: \[(.*)\]$")
            .expect("deploy key context pattern is valid")
    }

    pub fn into_subject(self) -> FailureSubject {
        FailureSubject::DeployKey {
            id: self.id,
            title: self.title,
            projects: self.projects,
        }
    }
}

impl fmt::Display for DeployKeyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deploy Key ID {} – Title: {} – Projects: [{}]",
            self.id,
            self.title,
            self.projects.join(PROJECT_SEPARATOR)
        )
    }
}

/// Records that can hand back their decoded public key, whatever its type.
pub trait HasPublicKey {
    fn public_key(&self) -> KeyObject;
}

/// First `len` characters of the key text followed by `...`.
pub fn key_preview(text: &str, len: usize) -> String {
    let head: String = text.chars().take(len).collect();
    format!("{head}{ELLIPSIS}")
}

/// Turns deploy-key failures into `deploy_key` records with a key preview
/// taken from a fresh lookup of the key by id.
pub struct DeployKeyEnricher<R> {
    keys: Arc<dyn RecordSource<Record = R>>,
    preview_len: usize,
    pattern: Regex,
}

impl<R: HasPublicKey> DeployKeyEnricher<R> {
    pub fn new(keys: Arc<dyn RecordSource<Record = R>>) -> Self {
        Self {
            keys,
            preview_len: DEFAULT_PREVIEW_LEN,
            pattern: DeployKeyContext::pattern(),
        }
    }

    pub fn with_preview_len(mut self, preview_len: usize) -> Self {
        self.preview_len = preview_len;
        self
    }

    fn fingerprint(&self, id: i64) -> Option<String> {
        let record = match self.keys.find(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(id, "deploy key vanished before enrichment");
                return None;
            }
            Err(e) => {
                debug!(id, error = %e, "deploy key lookup failed during enrichment");
                return None;
            }
        };

        let text = record.public_key().text()?;
        Some(key_preview(&text, self.preview_len))
    }
}

impl<R: HasPublicKey> Enricher for DeployKeyEnricher<R> {
    fn enrich(&self, failure: Failure) -> FailureRecord {
        let subject = failure.subject.clone().or_else(|| {
            DeployKeyContext::parse(&self.pattern, &failure.context).map(DeployKeyContext::into_subject)
        });

        match subject {
            Some(FailureSubject::DeployKey { id, title, projects }) => FailureRecord::DeployKey {
                id,
                title,
                projects,
                error: failure.message,
                fingerprint: self.fingerprint(id),
            },
            None => FailureRecord::from(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Identified, RecordIter};
    use crate::error::{AuditError, Result};
    use crate::secret::ssh::key_text;

    #[derive(Debug, Clone)]
    struct Key {
        id: i64,
        text: Option<String>,
    }

    impl Identified for Key {
        fn id(&self) -> i64 {
            self.id
        }
    }

    impl HasPublicKey for Key {
        fn public_key(&self) -> KeyObject {
            KeyObject::parse(self.text.as_deref())
        }
    }

    struct Keys(Vec<Key>);

    impl RecordSource for Keys {
        type Record = Key;

        fn records(&self) -> Result<RecordIter<'_, Key>> {
            Ok(Box::new(self.0.iter().cloned().map(Ok)))
        }

        fn find(&self, id: i64) -> Result<Option<Key>> {
            if id < 0 {
                return Err(AuditError::Source("lookup timed out".into()));
            }
            Ok(self.0.iter().find(|k| k.id == id).cloned())
        }
    }

    fn enricher(keys: Vec<Key>) -> DeployKeyEnricher<Key> {
        DeployKeyEnricher::new(Arc::new(Keys(keys)))
    }

    #[test]
    fn test_parse_context() {
        let pattern = DeployKeyContext::pattern();
        let ctx = DeployKeyContext::parse(
            &pattern,
            "Deploy Key ID 42 – Title: deploy,prod – Projects: [group/a,b, group/c]",
        )
        .unwrap();
        assert_eq!(ctx.id, 42);
        assert_eq!(ctx.title, "deploy,prod");
        assert_eq!(ctx.projects, vec!["group/a,b", "group/c"]);
    }

    #[test]
    fn test_parse_context_empty_projects() {
        let pattern = DeployKeyContext::pattern();
        let ctx = DeployKeyContext::parse(&pattern, "Deploy Key ID 1 – Title: t – Projects: []").unwrap();
        assert!(ctx.projects.is_empty());
    }

    #[test]
    fn test_parse_context_rejects_other_shapes() {
        let pattern = DeployKeyContext::pattern();
        assert!(DeployKeyContext::parse(&pattern, "Deploy Token ID 1 – Name: x").is_none());
        assert!(DeployKeyContext::parse(&pattern, "Checking Deploy Keys").is_none());
    }

    #[test]
    fn test_display_matches_parse() {
        let ctx = DeployKeyContext {
            id: 5,
            title: "ci".into(),
            projects: vec!["a/b".into(), "c/d".into()],
        };
        let pattern = DeployKeyContext::pattern();
        assert_eq!(DeployKeyContext::parse(&pattern, &ctx.to_string()), Some(ctx));
    }

    #[test]
    fn test_key_preview_is_bounded() {
        let long = "x".repeat(500);
        let preview = key_preview(&long, 40);
        assert_eq!(preview.chars().count(), 43);
        assert!(preview.ends_with("..."));
        assert_eq!(key_preview("short", 40), "short...");
    }

    #[test]
    fn test_key_preview_respects_char_boundaries() {
        let preview = key_preview("ключ-ключ-ключ", 4);
        assert_eq!(preview, "ключ...");
    }

    #[test]
    fn test_enrich_uses_structured_subject() {
        let text = key_text("ssh-ed25519", None);
        let failure = Failure::new("anything", "Unrecognized SSH key object type: RawText").with_subject(
            FailureSubject::DeployKey { id: 3, title: "t, x".into(), projects: vec!["p, q".into()] },
        );
        let record = enricher(vec![Key { id: 3, text: Some(text.clone()) }]).enrich(failure);

        match record {
            FailureRecord::DeployKey { id, title, projects, fingerprint, .. } => {
                assert_eq!(id, 3);
                assert_eq!(title, "t, x");
                assert_eq!(projects, vec!["p, q"]);
                assert_eq!(fingerprint, Some(key_preview(&text, 40)));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_enrich_parses_context_without_subject() {
        let failure = Failure::new(
            "Deploy Key ID 8 – Title: ops – Projects: [a/b, c/d]",
            "Top-level error: boom",
        );
        let record = enricher(vec![Key { id: 8, text: Some("garbage-key".into()) }]).enrich(failure);

        assert_eq!(record.kind(), "deploy_key");
        assert_eq!(record.fingerprint(), Some("garbage-key..."));
        assert_eq!(record.error(), "Top-level error: boom");
    }

    #[test]
    fn test_enrich_missing_key_has_no_fingerprint() {
        let failure = Failure::new("Deploy Key ID 99 – Title: gone – Projects: []", "err");
        let record = enricher(vec![]).enrich(failure);
        assert_eq!(record.kind(), "deploy_key");
        assert!(record.fingerprint().is_none());
        assert_eq!(serde_json::to_value(&record).unwrap()["key"], "Unavailable");
    }

    #[test]
    fn test_enrich_lookup_error_has_no_fingerprint() {
        let failure = Failure::new("Deploy Key ID -1 – Title: x – Projects: []", "err");
        assert!(DeployKeyContext::parse(&DeployKeyContext::pattern(), &failure.context).is_none());

        let failure = Failure::new("ctx", "err").with_subject(FailureSubject::DeployKey {
            id: -1,
            title: "x".into(),
            projects: vec![],
        });
        let record = enricher(vec![]).enrich(failure);
        assert!(record.fingerprint().is_none());
    }

    #[test]
    fn test_enrich_nil_key_has_no_fingerprint() {
        let failure = Failure::new("Deploy Key ID 4 – Title: x – Projects: [p]", "err");
        let record = enricher(vec![Key { id: 4, text: None }]).enrich(failure);
        assert!(record.fingerprint().is_none());
    }

    #[test]
    fn test_non_matching_failure_is_generic() {
        let record = enricher(vec![]).enrich(Failure::new("Checking Deploy Keys", "Top-level error: x"));
        assert_eq!(record, FailureRecord::generic("Checking Deploy Keys", "Top-level error: x"));
    }

    #[test]
    fn test_custom_preview_len() {
        let failure = Failure::new("Deploy Key ID 1 – Title: a – Projects: []", "err");
        let record = enricher(vec![Key { id: 1, text: Some("abcdefgh".into()) }])
            .with_preview_len(3)
            .enrich(failure);
        assert_eq!(record.fingerprint(), Some("abc..."));
    }
}
