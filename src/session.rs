use crate::error::{DashboardError, Result};
use crate::loader::{FileFormat, load_table};
use crate::table::Table;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Where the loaded table came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceDescriptor {
    /// Original name of the uploaded file
    pub file_name: String,

    /// Parser that was used for it
    pub format: FileFormat,
}

/// Per-user interaction scope
///
/// Holds at most one table and the descriptor of the file it came from.
/// Both are set together and cleared together.
#[derive(Debug, Clone, Default)]
pub struct Session {
    loaded: Option<(Table, SourceDescriptor)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table(&mut self, table: Table, source: SourceDescriptor) {
        self.loaded = Some((table, source));
    }

    pub fn table(&self) -> Option<&Table> {
        self.loaded.as_ref().map(|(table, _)| table)
    }

    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.loaded.as_ref().map(|(_, source)| source)
    }

    /// Clear the table and its source in one step
    pub fn reset(&mut self) {
        self.loaded = None;
    }
}

/// Identifier carried in the session cookie
pub type SessionId = Uuid;

struct Entry {
    session: Session,
    last_seen: Instant,
}

/// All live sessions, keyed by session id
///
/// Each browser session gets its own [`Session`], so one user's upload is
/// never visible to another. Sessions idle for longer than the configured
/// time-to-live are dropped.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Start a new, empty session and return its id
    pub fn create(&self) -> SessionId {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(
            id,
            Entry {
                session: Session::new(),
                last_seen: Instant::now(),
            },
        );
        log::debug!("created session {}", id);
        id
    }

    /// Whether `id` names a live session
    pub fn contains(&self, id: &SessionId) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(id)
            .is_some_and(|entry| entry.last_seen.elapsed() <= self.ttl)
    }

    /// Run `f` against the session `id`, refreshing its idle timer.
    ///
    /// Returns `None` when the session does not exist or has expired.
    pub fn with_session<T>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.get_mut(id)?;
        if entry.last_seen.elapsed() > self.ttl {
            sessions.remove(id);
            return None;
        }
        entry.last_seen = Instant::now();
        Some(f(&mut entry.session))
    }

    /// Copy of the session's table, if one is loaded
    pub fn table(&self, id: &SessionId) -> Option<Table> {
        self.with_session(id, |s| s.table().cloned()).flatten()
    }

    /// Store an already parsed table in the session
    pub fn set_table(&self, id: &SessionId, table: Table, source: SourceDescriptor) -> bool {
        self.with_session(id, |s| s.set_table(table, source)).is_some()
    }

    /// Parse an upload and, only if that succeeds, make it the session's table.
    ///
    /// Parsing runs before the lock is taken. A failed upload leaves the
    /// previously loaded table in place; an unknown or expired session
    /// yields `DashboardError::NoTable`.
    pub fn load(&self, id: &SessionId, bytes: &[u8], file_name: &str) -> Result<SourceDescriptor> {
        let table = load_table(bytes, file_name)?;
        let source = SourceDescriptor {
            file_name: file_name.to_string(),
            format: FileFormat::from_filename(file_name),
        };
        let (rows, columns) = (table.height(), table.width());

        if !self.set_table(id, table, source.clone()) {
            return Err(DashboardError::NoTable);
        }
        log::info!(
            "session {} loaded {} ({} rows, {} columns)",
            id,
            file_name,
            rows,
            columns
        );
        Ok(source)
    }

    pub fn reset(&self, id: &SessionId) -> bool {
        self.with_session(id, Session::reset).is_some()
    }

    /// Drop every session idle for longer than the time-to-live
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= self.ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            log::info!("expired {} idle session(s)", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartKind, ChartSpec, build_chart};

    const CSV: &[u8] = b"Month,Sales\nJan,100\nFeb,200\n";

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(60))
    }

    #[test]
    fn reset_clears_table_and_source() {
        let mut session = Session::new();
        session.set_table(
            load_table(CSV, "sales.csv").unwrap(),
            SourceDescriptor {
                file_name: "sales.csv".to_string(),
                format: FileFormat::Csv,
            },
        );
        assert!(session.table().is_some());
        assert_eq!(session.source().unwrap().file_name, "sales.csv");

        session.reset();
        assert!(session.table().is_none());
        assert!(session.source().is_none());
    }

    #[test]
    fn load_records_the_source() {
        let store = store();
        let id = store.create();
        let source = store.load(&id, CSV, "Sales.CSV").unwrap();
        assert_eq!(source.format, FileFormat::Csv);
        assert_eq!(store.table(&id).unwrap().height(), 2);
    }

    #[test]
    fn failed_upload_keeps_previous_table() {
        let store = store();
        let id = store.create();
        store.load(&id, CSV, "sales.csv").unwrap();

        let err = store.load(&id, b"a,b\n1\n", "broken.csv").unwrap_err();
        assert!(matches!(err, DashboardError::Parse(_)));
        assert_eq!(store.table(&id).unwrap().height(), 2);
        let file_name = store.with_session(&id, |s| s.source().map(|src| src.file_name.clone()));
        assert_eq!(file_name, Some(Some("sales.csv".to_string())));
    }

    #[test]
    fn load_into_unknown_session_is_no_table() {
        let err = store().load(&Uuid::new_v4(), CSV, "sales.csv").unwrap_err();
        assert_eq!(err, DashboardError::NoTable);
    }

    #[test]
    fn render_error_leaves_session_unchanged() {
        let store = store();
        let id = store.create();
        store.load(&id, CSV, "sales.csv").unwrap();
        let before = store.table(&id);

        let spec = ChartSpec::new(ChartKind::Line, "Sales", "Month");
        assert!(build_chart(&store.table(&id).unwrap(), &spec).is_err());
        assert_eq!(store.table(&id), before);
    }

    #[test]
    fn store_keeps_sessions_apart() {
        let store = store();
        let alice = store.create();
        let bob = store.create();

        store.load(&alice, CSV, "a.csv").unwrap();
        assert!(store.table(&alice).is_some());
        assert!(store.table(&bob).is_none());

        assert!(store.reset(&alice));
        assert!(store.table(&alice).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_session_is_none() {
        let store = store();
        assert!(store.with_session(&Uuid::new_v4(), |_| ()).is_none());
        assert!(!store.reset(&Uuid::new_v4()));
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!store.contains(&id));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }
}
