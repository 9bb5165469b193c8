use super::*;
use agora_core::ID;

/// Marker for board ids carried by admin requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board;

/// Bulk revocation after a board's visibility or roster changes.
///
/// Affected users hold access tokens whose permission view is now
/// stale; killing the cached token forces their next request through a
/// refresh, which re-derives claims. The watermark is the highest user
/// id that existed when the roster was computed; later signups were
/// never granted the old view and are skipped.
pub struct Cascade;

impl Cascade {
    /// Revoke each affected user at or below the watermark. Per-user
    /// revocation is atomic; across users there is no ordering, so the
    /// fan-out runs concurrently. Store failures are logged and
    /// reported per user rather than aborting the sweep.
    pub async fn on_roster_changed<S>(
        sessions: &Sessions<S>,
        affected: &[ID<Member>],
        watermark: ID<Member>,
    ) -> Vec<(ID<Member>, Result<(), AuthError>)>
    where
        S: CredentialStore + Directory,
    {
        let sweeps = affected
            .iter()
            .copied()
            .filter(|user| *user <= watermark)
            .map(|user| async move { (user, sessions.revoke(user).await) });
        futures::future::join_all(sweeps)
            .await
            .into_iter()
            .inspect(|(user, outcome)| {
                if let Err(e) = outcome {
                    log::warn!("[cascade] revoke failed for user {}: {}", user, e);
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::Unique;

    fn member(id: i64, name: &str) -> Member {
        Member::new(
            ID::from(id),
            name.to_string(),
            format!("{}@example.com", name),
            false,
            false,
        )
    }

    #[tokio::test]
    async fn roster_change_revokes_only_affected_users() {
        let roster = [member(5, "eve"), member(6, "fay"), member(7, "gil")];
        let outsider = member(8, "hal");
        let store = MemoryStore::new();
        for m in roster.iter().chain([&outsider]) {
            store.enroll(m.clone());
        }
        let sessions = Sessions::new(Crypto::new(b"test-secret"), store);
        let mut pairs = Vec::new();
        for m in &roster {
            pairs.push(sessions.issue(m).await.unwrap());
        }
        let unaffected = sessions.issue(&outsider).await.unwrap();

        let affected: Vec<ID<Member>> = roster.iter().map(|m| m.id()).collect();
        let outcomes = Cascade::on_roster_changed(&sessions, &affected, ID::from(7)).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, outcome)| outcome.is_ok()));

        for pair in &pairs {
            assert_eq!(sessions.verify(&pair.access).await, Err(AuthError::Revoked));
        }
        assert!(sessions.verify(&unaffected.access).await.is_ok());
        // refresh path survives the cascade
        assert!(sessions.refresh(&pairs[0].refresh).await.is_ok());
    }

    #[tokio::test]
    async fn watermark_excludes_later_signups() {
        let early = member(5, "eve");
        let late = member(9, "ivy");
        let store = MemoryStore::new();
        store.enroll(early.clone());
        store.enroll(late.clone());
        let sessions = Sessions::new(Crypto::new(b"test-secret"), store);
        let old = sessions.issue(&early).await.unwrap();
        let new = sessions.issue(&late).await.unwrap();

        let affected = vec![early.id(), late.id()];
        let outcomes = Cascade::on_roster_changed(&sessions, &affected, ID::from(7)).await;
        assert_eq!(outcomes.len(), 1);

        assert_eq!(sessions.verify(&old.access).await, Err(AuthError::Revoked));
        assert!(sessions.verify(&new.access).await.is_ok());
    }
}
