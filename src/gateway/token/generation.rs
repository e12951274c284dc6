//! Refresh-token generation record.
//!
//! Refresh tokens are self-verifying, so without a server-side record a rotated
//! or logged-out token would stay usable until it expires. Every refresh token
//! embeds the subject's generation at the time it was minted, and only the
//! current generation may be exchanged. Rotation, login and logout replace the
//! generation, which retires every earlier refresh token of that subject.
//!
//! Generations are random, not counters. A store that lost its record (restart,
//! another replica) must not be walkable back to a retired value by replaying
//! an old token until the reuse path bumps the counter onto it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Key-value record of the current refresh generation per subject.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Whether `generation` is the subject's current one.
    async fn is_current_generation(&self, subject_id: &str, generation: u64) -> bool;

    /// Start a new chain for the subject (login) and return its generation.
    async fn advance(&self, subject_id: &str) -> u64;

    /// Atomically replace `presented` with a fresh generation.
    ///
    /// Returns `None` when `presented` is not current; the caller must treat
    /// that as token reuse.
    async fn rotate(&self, subject_id: &str, presented: u64) -> Option<u64>;

    /// Retire the subject's current chain.
    async fn revoke(&self, subject_id: &str);
}

/// In-process generation store.
#[derive(Debug, Default)]
pub struct MemoryGenerationStore {
    generations: Mutex<HashMap<String, u64>>,
}

impl MemoryGenerationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn replace(map: &mut HashMap<String, u64>, subject_id: &str) -> u64 {
        let previous = map.get(subject_id).copied();
        let next = fresh_generation(previous);
        map.insert(subject_id.to_string(), next);
        next
    }
}

/// Random generation distinct from `previous`.
fn fresh_generation(previous: Option<u64>) -> u64 {
    loop {
        let candidate = rand::random::<u64>();
        if Some(candidate) != previous {
            return candidate;
        }
    }
}

#[async_trait]
impl GenerationStore for MemoryGenerationStore {
    async fn is_current_generation(&self, subject_id: &str, generation: u64) -> bool {
        let map = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.get(subject_id) == Some(&generation)
    }

    async fn advance(&self, subject_id: &str) -> u64 {
        let mut map = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self::replace(&mut map, subject_id)
    }

    async fn rotate(&self, subject_id: &str, presented: u64) -> Option<u64> {
        let mut map = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if map.get(subject_id) != Some(&presented) {
            return None;
        }
        Some(Self::replace(&mut map, subject_id))
    }

    async fn revoke(&self, subject_id: &str) {
        let mut map = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Self::replace(&mut map, subject_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn unknown_subject_has_no_current_generation() {
        let store = MemoryGenerationStore::new();
        assert!(!store.is_current_generation("alice", 0).await);
    }

    #[tokio::test]
    async fn rotate_accepts_only_the_current_generation() {
        let store = MemoryGenerationStore::new();
        let first = store.advance("alice").await;
        assert!(store.is_current_generation("alice", first).await);

        let second = store.rotate("alice", first).await.unwrap();
        assert_ne!(second, first);
        assert!(store.is_current_generation("alice", second).await);
        assert!(!store.is_current_generation("alice", first).await);

        // Replaying the retired generation fails.
        assert_eq!(store.rotate("alice", first).await, None);
    }

    #[tokio::test]
    async fn revoke_retires_current_chain() {
        let store = MemoryGenerationStore::new();
        let generation = store.advance("bob").await;
        store.revoke("bob").await;
        assert!(!store.is_current_generation("bob", generation).await);
        assert_eq!(store.rotate("bob", generation).await, None);
    }

    #[tokio::test]
    async fn subjects_are_independent() {
        let store = MemoryGenerationStore::new();
        let alice = store.advance("alice").await;
        let bob = store.advance("bob").await;
        store.revoke("alice").await;
        assert!(!store.is_current_generation("alice", alice).await);
        assert!(store.is_current_generation("bob", bob).await);
    }

    #[tokio::test]
    async fn concurrent_rotations_have_a_single_winner() {
        let store = Arc::new(MemoryGenerationStore::new());
        let generation = store.advance("carol").await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.rotate("carol", generation).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if let Ok(Some(_)) = handle.await {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn revoke_never_lands_on_a_retired_generation() {
        let store = MemoryGenerationStore::new();
        let first = store.advance("dave").await;
        let second = store.rotate("dave", first).await.unwrap();
        assert_ne!(first.abs_diff(second), 1);

        // A store that never saw the chain keeps rejecting the old generation.
        let fresh = MemoryGenerationStore::new();
        for _ in 0..256 {
            assert_eq!(fresh.rotate("dave", first).await, None);
            fresh.revoke("dave").await;
        }
        assert!(!fresh.is_current_generation("dave", first).await);
    }
}
