use serde::{Serialize, Deserialize};
use std::fmt;

/// Hard byte limit for a stored term, prefix included.
pub const TERM_SIZE_LIMIT: usize = 245;

/// Field name that expands to every searchable slot at query time.
pub const WILDCARD_FIELD: &str = "*";

/// Mailbox item identifier (the message UID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Boolean term that identifies the document in the store: `Q<id>`.
    pub fn unique_key(&self) -> String {
        format!("{}{}", FieldSlot::Uid.prefix(), self.0)
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical document fields eligible for indexing and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldSlot {
    Uid,
    Subject,
    From,
    To,
    Cc,
    Bcc,
    MessageId,
    ListId,
    Body,
    ContentType,
}

impl FieldSlot {
    pub const ALL: [FieldSlot; 10] = [
        FieldSlot::Uid,
        FieldSlot::Subject,
        FieldSlot::From,
        FieldSlot::To,
        FieldSlot::Cc,
        FieldSlot::Bcc,
        FieldSlot::MessageId,
        FieldSlot::ListId,
        FieldSlot::Body,
        FieldSlot::ContentType,
    ];

    /// Short storage code prepended to every stem of this field.
    pub fn prefix(&self) -> &'static str {
        match self {
            FieldSlot::Uid => "Q",
            FieldSlot::Subject => "S",
            FieldSlot::From => "A",
            FieldSlot::To => "XTO",
            FieldSlot::Cc => "XCC",
            FieldSlot::Bcc => "XBCC",
            FieldSlot::MessageId => "XMID",
            FieldSlot::ListId => "XLIST",
            FieldSlot::Body => "XBDY",
            FieldSlot::ContentType => "XCT",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldSlot::Uid => "uid",
            FieldSlot::Subject => "subject",
            FieldSlot::From => "from",
            FieldSlot::To => "to",
            FieldSlot::Cc => "cc",
            FieldSlot::Bcc => "bcc",
            FieldSlot::MessageId => "messageid",
            FieldSlot::ListId => "listid",
            FieldSlot::Body => "body",
            FieldSlot::ContentType => "contenttype",
        }
    }

    /// Message-ids are indexed as one stem instead of n-grams.
    pub fn is_single_token(&self) -> bool {
        matches!(self, FieldSlot::MessageId)
    }

    /// Largest stem (in bytes) that fits under the term limit once prefixed.
    pub fn stem_size_limit(&self) -> usize {
        TERM_SIZE_LIMIT - self.prefix().len()
    }

    /// The identifier only exists as the `Q<id>` key; it never carries stems.
    pub fn is_indexable(&self) -> bool {
        !matches!(self, FieldSlot::Uid)
    }

    /// Slots the wildcard field expands to: everything but the identifier.
    pub fn searchable() -> impl Iterator<Item = FieldSlot> {
        FieldSlot::ALL.into_iter().filter(FieldSlot::is_indexable)
    }

    /// Resolve a header or field name such as `Message-ID` or `subject`.
    /// Case and `-`/`_` are ignored; unknown names yield `None`.
    pub fn from_header(name: &str) -> Option<FieldSlot> {
        let key: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        FieldSlot::ALL.into_iter().find(|slot| slot.name() == key)
    }
}

impl fmt::Display for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_key_uses_identifier_prefix() {
        assert_eq!(DocId(42).unique_key(), "Q42");
    }

    #[test]
    fn header_names_resolve_loosely() {
        assert_eq!(FieldSlot::from_header("Message-ID"), Some(FieldSlot::MessageId));
        assert_eq!(FieldSlot::from_header("List-Id"), Some(FieldSlot::ListId));
        assert_eq!(FieldSlot::from_header("content_type"), Some(FieldSlot::ContentType));
        assert_eq!(FieldSlot::from_header("SUBJECT"), Some(FieldSlot::Subject));
        assert_eq!(FieldSlot::from_header("X-Mailer"), None);
        assert_eq!(FieldSlot::from_header(""), None);
    }

    #[test]
    fn searchable_slots_skip_identifier() {
        let slots: Vec<_> = FieldSlot::searchable().collect();
        assert_eq!(slots.len(), FieldSlot::ALL.len() - 1);
        assert!(!slots.contains(&FieldSlot::Uid));
    }

    #[test]
    fn stem_limit_accounts_for_prefix() {
        assert_eq!(FieldSlot::Subject.stem_size_limit(), 244);
        assert_eq!(FieldSlot::MessageId.stem_size_limit(), 241);
    }

    #[test]
    fn prefixes_are_distinct() {
        let mut prefixes: Vec<_> = FieldSlot::ALL.iter().map(|s| s.prefix()).collect();
        prefixes.sort();
        prefixes.dedup();
        assert_eq!(prefixes.len(), FieldSlot::ALL.len());
    }
}
