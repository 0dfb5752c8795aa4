//! Process-lifetime storage for guided sessions.

use super::GuidedSession;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError,
};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One stored session plus its activity clock.
///
/// The session mutex is held for the whole of a continuation, so at most one
/// step per session is ever in flight.
#[derive(Debug)]
pub struct SessionSlot {
    session: Mutex<GuidedSession>,
    last_active: Mutex<Instant>,
}

impl SessionSlot {
    fn new(session: GuidedSession) -> Self {
        Self {
            session: Mutex::new(session),
            last_active: Mutex::new(Instant::now()),
        }
    }

    /// Take the session lock without waiting.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, GuidedSession>> {
        match self.session.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(Error::SessionBusy(
                "a continuation for this session is already running".to_owned(),
            )),
            // A panic mid-step never appended its record, so the history is
            // still consistent.
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }

    pub fn touch(&self) {
        let mut last = self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

/// Owns every live guided session.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionSlot>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    // Map updates are single insert/remove calls, so a poisoned map lock
    // never guards a half-applied change.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Arc<SessionSlot>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Arc<SessionSlot>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, session: GuidedSession) -> Uuid {
        let id = session.session_id;
        let mut sessions = self.write();
        sessions.insert(id, Arc::new(SessionSlot::new(session)));
        tracing::debug!(session_id = %id, live = sessions.len(), "Session stored");
        id
    }

    /// Look up a live session. An idle-expired session is removed and
    /// reported as not found.
    pub fn get(&self, id: &Uuid) -> Result<Arc<SessionSlot>> {
        let slot = self.read().get(id).cloned();
        let Some(slot) = slot else {
            return Err(Error::SessionNotFound(id.to_string()));
        };

        if slot.idle_for() >= self.idle_timeout {
            self.write().remove(id);
            tracing::info!(session_id = %id, "Session expired after idle timeout");
            return Err(Error::SessionNotFound(format!("{id} (expired)")));
        }
        Ok(slot)
    }

    /// Terminate a session explicitly.
    pub fn end_session(&self, id: &Uuid) -> Result<()> {
        if self.write().remove(id).is_some() {
            tracing::info!(session_id = %id, "Session ended");
            Ok(())
        } else {
            Err(Error::SessionNotFound(id.to_string()))
        }
    }

    /// Drop every idle-expired session; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, slot| slot.idle_for() < self.idle_timeout);
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::info!(purged, "Purged expired sessions");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{OptimizationLevel, OptimizationPlan};

    fn session() -> GuidedSession {
        GuidedSession::new(
            "fingerprint".to_owned(),
            "goal".to_owned(),
            OptimizationPlan {
                fingerprint: "fingerprint".to_owned(),
                level: OptimizationLevel::Production,
                columns: Vec::new(),
                total_bytes_before: 0,
                total_bytes_after: 0,
                percent_reduction: 0.0,
                monthly_cost_delta: 0.0,
                approximate: false,
            },
        )
    }

    #[test]
    fn test_insert_get_end() -> Result<()> {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert(session());
        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_ok());

        store.end_session(&id)?;
        assert_eq!(store.get(&id).unwrap_err().kind(), "session_not_found_error");
        assert_eq!(store.end_session(&id).unwrap_err().kind(), "session_not_found_error");
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_expired_sessions_are_not_found() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.insert(session());
        let err = store.get(&id).unwrap_err();
        assert_eq!(err.kind(), "session_not_found_error");
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = SessionStore::new(Duration::ZERO);
        store.insert(session());
        store.insert(session());
        assert_eq!(store.purge_expired(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_second_lock_is_busy() -> Result<()> {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert(session());
        let slot = store.get(&id)?;
        let _held = slot.try_lock()?;
        let err = store.get(&id)?.try_lock().unwrap_err();
        assert_eq!(err.kind(), "session_busy");
        Ok(())
    }
}
