//! SQL schema for the vetting SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per candidate. Rows are never deleted.
CREATE TABLE IF NOT EXISTS cases (
    candidate_id      TEXT PRIMARY KEY,
    case_room_id      TEXT,
    created_at        TEXT NOT NULL,   -- RFC 3339 UTC
    poll_id           TEXT,
    voting_started_at TEXT,            -- RFC 3339 UTC
    vote_ended        INTEGER NOT NULL DEFAULT 0,
    decision_id       TEXT,
    CHECK ((poll_id IS NULL) = (voting_started_at IS NULL)),
    CHECK (vote_ended = 0 OR poll_id IS NOT NULL),
    CHECK (decision_id IS NULL OR vote_ended = 1)
);

CREATE INDEX IF NOT EXISTS cases_pending_idx  ON cases(vote_ended, poll_id);
CREATE INDEX IF NOT EXISTS cases_decision_idx ON cases(decision_id);

PRAGMA user_version = 1;
";
