//! Question Pool Manager
//!
//! Each KP's question bank is split, per user, into four disjoint pools
//! (lesson, quiz, review, diagnostic) plus the unassigned remainder.
//! Allocation draws uniformly from the unassigned remainder only, so a
//! question committed to one context is never offered to another.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::{KnowledgePoint, KpId, PoolKind, QuestionId};

/// Picks one question uniformly from `unassigned`, reseeding from OS entropy.
///
/// `None` means the bank is exhausted for this user, which callers treat as
/// the end of practice material rather than a failure.
pub fn pick_unassigned(unassigned: &[QuestionId]) -> Option<QuestionId> {
    let mut rng = ChaCha8Rng::from_entropy();
    pick_unassigned_with(unassigned, &mut rng)
}

pub fn pick_unassigned_with<R: Rng + ?Sized>(
    unassigned: &[QuestionId],
    rng: &mut R,
) -> Option<QuestionId> {
    unassigned.choose(rng).copied()
}

/// One user's pool assignments over a set of KP banks.
///
/// The backend fills a ledger from persisted assignments, allocates, and
/// writes the new assignment back in the same transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PoolLedger {
    /// Full bank per KP in authored order
    banks: HashMap<KpId, Vec<QuestionId>>,
    /// Pool each assigned question belongs to
    assigned: HashMap<QuestionId, PoolKind>,
}

impl PoolLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bank(&mut self, kp: &KnowledgePoint) {
        self.banks
            .insert(kp.id, kp.questions.iter().map(|q| q.id).collect());
    }

    pub fn with_bank(mut self, kp_id: KpId, questions: Vec<QuestionId>) -> Self {
        self.banks.insert(kp_id, questions);
        self
    }

    /// Records an existing assignment. Returns false if the question was
    /// already assigned (to any pool), leaving the earlier assignment intact.
    pub fn record(&mut self, question_id: QuestionId, kind: PoolKind) -> bool {
        if self.assigned.contains_key(&question_id) {
            return false;
        }
        self.assigned.insert(question_id, kind);
        true
    }

    pub fn pool_of(&self, question_id: QuestionId) -> Option<PoolKind> {
        self.assigned.get(&question_id).copied()
    }

    pub fn unassigned(&self, kp_id: KpId) -> Vec<QuestionId> {
        self.banks
            .get(&kp_id)
            .map(|bank| {
                bank.iter()
                    .copied()
                    .filter(|q| !self.assigned.contains_key(q))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn questions_in(&self, kp_id: KpId, kind: PoolKind) -> Vec<QuestionId> {
        self.banks
            .get(&kp_id)
            .map(|bank| {
                bank.iter()
                    .copied()
                    .filter(|q| self.assigned.get(q) == Some(&kind))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Allocates one unassigned question of `kp_id` to `kind`.
    pub fn allocate_with<R: Rng + ?Sized>(
        &mut self,
        kp_id: KpId,
        kind: PoolKind,
        rng: &mut R,
    ) -> Option<QuestionId> {
        let picked = pick_unassigned_with(&self.unassigned(kp_id), rng)?;
        self.assigned.insert(picked, kind);
        Some(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> PoolLedger {
        PoolLedger::new().with_bank(1, vec![10, 11, 12]).with_bank(2, vec![20, 21])
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let mut ledger = ledger();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = Vec::new();
        for kind in [PoolKind::Lesson, PoolKind::Quiz, PoolKind::Review] {
            let q = ledger.allocate_with(1, kind, &mut rng).unwrap();
            assert_eq!(ledger.pool_of(q), Some(kind));
            assert!(!seen.contains(&q));
            seen.push(q);
        }
        assert_eq!(ledger.allocate_with(1, PoolKind::Diagnostic, &mut rng), None);
        assert!(ledger.unassigned(1).is_empty());
        assert_eq!(ledger.unassigned(2), vec![20, 21]);
    }

    #[test]
    fn test_record_keeps_first_assignment() {
        let mut ledger = ledger();
        assert!(ledger.record(10, PoolKind::Quiz));
        assert!(!ledger.record(10, PoolKind::Lesson));
        assert_eq!(ledger.pool_of(10), Some(PoolKind::Quiz));
        assert_eq!(ledger.unassigned(1), vec![11, 12]);
        assert_eq!(ledger.questions_in(1, PoolKind::Quiz), vec![10]);
    }

    #[test]
    fn test_unknown_kp_is_exhausted() {
        let mut ledger = ledger();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(ledger.allocate_with(99, PoolKind::Lesson, &mut rng), None);
        assert!(pick_unassigned(&[]).is_none());
    }
}
