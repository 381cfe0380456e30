pub(super) const UPSERT_RECORD: &str = r#"
    INSERT INTO records (
        id, record_status, sync_state, data,
        local_modified_at, remote_id, last_error, synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(id) DO UPDATE SET
        record_status = excluded.record_status,
        sync_state = excluded.sync_state,
        data = excluded.data,
        local_modified_at = excluded.local_modified_at,
        remote_id = excluded.remote_id,
        last_error = excluded.last_error,
        synced_at = excluded.synced_at
"#;

pub(super) const SELECT_RECORD_COLUMNS: &str = r#"
    SELECT id, record_status, sync_state, data,
           local_modified_at, remote_id, last_error, synced_at
    FROM records
"#;

pub(super) const SELECT_RECORD_BY_ID: &str = r#"
    SELECT id, record_status, sync_state, data,
           local_modified_at, remote_id, last_error, synced_at
    FROM records
    WHERE id = ?1
"#;

pub(super) const SELECT_RECORD_BY_REMOTE_ID: &str = r#"
    SELECT id, record_status, sync_state, data,
           local_modified_at, remote_id, last_error, synced_at
    FROM records
    WHERE remote_id = ?1
    LIMIT 1
"#;

pub(super) const DELETE_RECORD: &str = r#"
    DELETE FROM records WHERE id = ?1
"#;

pub(super) const DELETE_ALL_RECORDS: &str = "DELETE FROM records";

pub(super) const DELETE_ALL_QUEUE_ENTRIES: &str = "DELETE FROM sync_queue";

pub(super) const DELETE_ALL_SETTINGS: &str = "DELETE FROM settings";

pub(super) const INSERT_QUEUE_ENTRY: &str = r#"
    INSERT INTO sync_queue (operation, record_id, payload, enqueued_at, retry_count)
    VALUES (?1, ?2, ?3, ?4, 0)
"#;

pub(super) const SELECT_PENDING_QUEUE: &str = r#"
    SELECT id, operation, record_id, payload, enqueued_at,
           retry_count, last_attempt_at, last_error
    FROM sync_queue
    ORDER BY enqueued_at ASC, id ASC
"#;

pub(super) const SELECT_QUEUE_FOR_RECORD: &str = r#"
    SELECT id, operation, record_id, payload, enqueued_at,
           retry_count, last_attempt_at, last_error
    FROM sync_queue
    WHERE record_id = ?1
    ORDER BY enqueued_at ASC, id ASC
"#;

pub(super) const SELECT_QUEUE_ENTRY_BY_ID: &str = r#"
    SELECT id, operation, record_id, payload, enqueued_at,
           retry_count, last_attempt_at, last_error
    FROM sync_queue
    WHERE id = ?1
"#;

pub(super) const DELETE_QUEUE_ENTRY: &str = r#"
    DELETE FROM sync_queue WHERE id = ?1
"#;

pub(super) const DELETE_QUEUE_ENTRIES_FOR_RECORD: &str = r#"
    DELETE FROM sync_queue WHERE record_id = ?1
"#;

pub(super) const RECORD_QUEUE_FAILURE: &str = r#"
    UPDATE sync_queue
    SET retry_count = retry_count + 1,
        last_attempt_at = ?2,
        last_error = ?3
    WHERE id = ?1
"#;

pub(super) const COUNT_QUEUE_ENTRIES: &str = r#"
    SELECT COUNT(*) AS count FROM sync_queue
"#;

pub(super) const SELECT_SETTING: &str = r#"
    SELECT value FROM settings WHERE key = ?1
"#;

pub(super) const UPSERT_SETTING: &str = r#"
    INSERT INTO settings (key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
"#;
