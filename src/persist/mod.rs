//! No-regression write rule for accepted transcripts.

use std::fmt;

use crate::adapters::{QualityTier, TranscriptResult};
use crate::store::{StoreError, StoredTranscript, TranscriptStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Stored transcript has a higher tier
    LowerTier { stored: QualityTier, new: QualityTier },
    /// Same tier and the new text is not longer
    NotLonger { stored_len: usize, new_len: usize },
    /// Higher tier but shorter, and shrinking is not allowed
    WouldShrink { stored_len: usize, new_len: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LowerTier { stored, new } => write!(f, "stored tier {} outranks {}", stored, new),
            SkipReason::NotLonger { stored_len, new_len } => {
                write!(f, "same tier and {} chars is not longer than {}", new_len, stored_len)
            }
            SkipReason::WouldShrink { stored_len, new_len } => {
                write!(f, "would shrink stored text from {} to {} chars", stored_len, new_len)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Skipped(SkipReason),
}

/// Decides whether an accepted transcript may replace what is stored.
#[derive(Debug, Clone, Copy)]
pub struct PersistencePolicy {
    /// Stored text shorter than this is treated as absent
    pub min_chars: usize,
    /// Let a higher tier replace longer text
    pub allow_shrink: bool,
}

impl PersistencePolicy {
    pub fn new(min_chars: usize, allow_shrink: bool) -> Self {
        Self {
            min_chars,
            allow_shrink,
        }
    }

    /// Pure decision: `None` means write.
    pub fn decide(&self, stored: Option<&StoredTranscript>, new: &TranscriptResult) -> Option<SkipReason> {
        let stored = match stored {
            Some(stored) if stored.char_len() >= self.min_chars => stored,
            _ => return None,
        };

        let stored_tier = stored.effective_tier();
        let stored_len = stored.char_len();
        let new_len = new.char_len;

        if new.tier > stored_tier {
            if new_len < stored_len && !self.allow_shrink {
                return Some(SkipReason::WouldShrink { stored_len, new_len });
            }
            None
        } else if new.tier == stored_tier {
            if new_len > stored_len {
                None
            } else {
                Some(SkipReason::NotLonger { stored_len, new_len })
            }
        } else {
            Some(SkipReason::LowerTier {
                stored: stored_tier,
                new: new.tier,
            })
        }
    }

    /// Read what is stored, apply the rule and write when it allows.
    pub async fn commit(
        &self,
        store: &dyn TranscriptStore,
        video_id: &str,
        result: &TranscriptResult,
    ) -> Result<CommitOutcome, StoreError> {
        let stored = store.stored_transcript(video_id).await?;

        if let Some(reason) = self.decide(stored.as_ref(), result) {
            tracing::debug!("{}: keeping stored transcript ({})", video_id, reason);
            return Ok(CommitOutcome::Skipped(reason));
        }

        store.upsert_transcript(video_id, result).await?;
        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MethodKind, RawTranscript};
    use crate::store::{MemoryStore, VideoCandidate};

    fn result(len: usize, tier: QualityTier) -> TranscriptResult {
        let raw = RawTranscript::new(String::new(), tier, tier.as_str());
        TranscriptResult::new("w".repeat(len), MethodKind::Structured, raw, 0).unwrap()
    }

    fn stored(len: usize, tier: Option<QualityTier>) -> StoredTranscript {
        StoredTranscript {
            text: "s".repeat(len),
            tier,
            method: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_writes_when_nothing_usable_stored() {
        let policy = PersistencePolicy::new(100, false);
        assert_eq!(policy.decide(None, &result(100, QualityTier::BestEffort)), None);
        assert_eq!(
            policy.decide(Some(&stored(99, Some(QualityTier::Manual))), &result(100, QualityTier::BestEffort)),
            None
        );
    }

    #[test]
    fn test_tier_comparison() {
        let policy = PersistencePolicy::new(100, false);
        let auto = stored(500, Some(QualityTier::Auto));

        assert_eq!(policy.decide(Some(&auto), &result(600, QualityTier::Manual)), None);
        assert_eq!(
            policy.decide(Some(&auto), &result(400, QualityTier::Manual)),
            Some(SkipReason::WouldShrink {
                stored_len: 500,
                new_len: 400
            })
        );
        assert!(matches!(
            policy.decide(Some(&auto), &result(900, QualityTier::Translated)),
            Some(SkipReason::LowerTier { .. })
        ));

        let shrinking = PersistencePolicy::new(100, true);
        assert_eq!(shrinking.decide(Some(&auto), &result(400, QualityTier::Manual)), None);
    }

    #[test]
    fn test_equal_tier_needs_strictly_longer() {
        let policy = PersistencePolicy::new(100, true);
        let auto = stored(500, Some(QualityTier::Auto));

        assert_eq!(policy.decide(Some(&auto), &result(501, QualityTier::Auto)), None);
        assert!(policy.decide(Some(&auto), &result(500, QualityTier::Auto)).is_some());
    }

    #[test]
    fn test_unknown_tier_ranks_as_best_effort() {
        let policy = PersistencePolicy::new(100, false);
        let legacy = stored(300, None);

        assert_eq!(policy.decide(Some(&legacy), &result(300, QualityTier::Translated)), None);
        assert!(policy.decide(Some(&legacy), &result(300, QualityTier::BestEffort)).is_some());
    }

    #[tokio::test]
    async fn test_commit_is_idempotent() {
        let store = MemoryStore::with_videos(&[VideoCandidate {
            video_id: "v".to_string(),
            title: String::new(),
            channel_name: String::new(),
            view_count: 0,
        }]);
        let policy = PersistencePolicy::new(100, false);
        let manual = result(250, QualityTier::Manual);

        assert_eq!(policy.commit(&store, "v", &manual).await.unwrap(), CommitOutcome::Committed);
        assert!(matches!(
            policy.commit(&store, "v", &manual).await.unwrap(),
            CommitOutcome::Skipped(_)
        ));
        assert!(matches!(
            policy.commit(&store, "v", &result(2000, QualityTier::Auto)).await.unwrap(),
            CommitOutcome::Skipped(_)
        ));

        assert_eq!(store.writes(), 1);
        assert_eq!(store.stored_transcript("v").await.unwrap().unwrap().text, "w".repeat(250));
    }
}
