//! Sample index: members grouped by timestamp prefix.
//!
//! A member named `2022/11/01/0015.aia_0171.npy` splits on its first `.`
//! into the prefix `2022/11/01/0015` and the postfix `aia_0171.npy`. All
//! members sharing a prefix form one logical multi-channel sample.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use super::member_index::MemberIndex;
use crate::util::Result;

/// Separator between prefix and postfix in member names.
pub const NAME_SEPARATOR: char = '.';

#[derive(Clone, Debug, Default)]
struct Bucket {
    ordinal: usize,
    postfixes: SmallVec<[String; 8]>,
}

/// Prefix -> postfixes view over a [`MemberIndex`].
#[derive(Clone, Debug)]
pub struct SampleIndex {
    members: Arc<MemberIndex>,
    prefixes: Vec<String>,
    buckets: HashMap<String, Bucket>,
    ignored: usize,
}

impl SampleIndex {
    /// Group the member names of `members` by prefix.
    ///
    /// Names without a separator are ignored.
    pub fn new(members: Arc<MemberIndex>) -> Self {
        let mut prefixes = Vec::new();
        let mut buckets: HashMap<String, Bucket> = HashMap::new();
        let mut ignored = 0;

        for name in members.names() {
            let Some((prefix, postfix)) = name.split_once(NAME_SEPARATOR) else {
                ignored += 1;
                continue;
            };
            let bucket = buckets.entry(prefix.to_string()).or_insert_with(|| {
                prefixes.push(prefix.to_string());
                Bucket {
                    ordinal: prefixes.len() - 1,
                    postfixes: SmallVec::new(),
                }
            });
            bucket.postfixes.push(postfix.to_string());
        }

        if ignored > 0 {
            debug!("Ignored {} member names without '{}'", ignored, NAME_SEPARATOR);
        }

        Self {
            members,
            prefixes,
            buckets,
            ignored,
        }
    }

    /// Number of distinct prefixes.
    #[inline]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Check if no prefix was found.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Prefixes in first-seen order.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Prefix at an ordinal.
    pub fn prefix_at(&self, ordinal: usize) -> Option<&str> {
        self.prefixes.get(ordinal).map(String::as_str)
    }

    /// Ordinal of a prefix.
    pub fn ordinal_of(&self, prefix: &str) -> Option<usize> {
        self.buckets.get(prefix).map(|b| b.ordinal)
    }

    /// Check if the prefix has any member.
    #[inline]
    pub fn contains(&self, prefix: &str) -> bool {
        self.buckets.contains_key(prefix)
    }

    /// Postfixes present for a prefix, in first-seen order.
    pub fn postfixes(&self, prefix: &str) -> Option<&[String]> {
        self.buckets.get(prefix).map(|b| b.postfixes.as_slice())
    }

    /// True iff the prefix exists and every required postfix is present.
    pub fn has_channels<S: AsRef<str>>(&self, prefix: &str, required: &[S]) -> bool {
        match self.buckets.get(prefix) {
            Some(bucket) => required
                .iter()
                .all(|r| bucket.postfixes.iter().any(|p| p == r.as_ref())),
            None => false,
        }
    }

    /// Raw bytes of `prefix.postfix`, `Ok(None)` when no such member exists.
    pub fn get_raw(&self, prefix: &str, postfix: &str) -> Result<Option<Vec<u8>>> {
        let name = format!("{}{}{}", prefix, NAME_SEPARATOR, postfix);
        self.members.extract(&name)
    }

    /// Member names skipped for lacking a separator.
    #[inline]
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    /// The underlying member index.
    pub fn members(&self) -> &Arc<MemberIndex> {
        &self.members
    }
}
