//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_RUN_ID: &str = "run_id";

// Location fields
pub const FIELD_TECHNOLOGY: &str = "technology";
pub const FIELD_ACCOUNT: &str = "account";
pub const FIELD_REGION: &str = "region";
pub const FIELD_ITEM_NAME: &str = "item_name";

// Watcher state machine
pub const FIELD_STATE: &str = "state";

// Collection sizes
pub const FIELD_CREATED_LEN: &str = "created_len";
pub const FIELD_CHANGED_LEN: &str = "changed_len";
pub const FIELD_EPHEMERAL_LEN: &str = "ephemeral_len";
pub const FIELD_DELETED_LEN: &str = "deleted_len";
pub const FIELD_EXCEPTIONS_LEN: &str = "exceptions_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
