// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros for consistent field names and message patterns across the crate
///
/// These macros ensure:
/// - Consistent field naming conventions (`quiz_id`, `attempt_id`, `key`, `mode`)
/// - Appropriate logging levels for different scenarios
/// - Structured logging with context

// ============================================================================
// Session Lifecycle Logging Macros
// ============================================================================

/// Log a quiz session transition or mutation
#[macro_export]
macro_rules! log_session_event {
    (debug, $event:expr, quiz_id = $quiz_id:expr, attempt_id = $attempt_id:expr, $msg:expr) => {
        tracing::debug!(
            component = "session",
            event = $event,
            quiz_id = %$quiz_id,
            attempt_id = %$attempt_id,
            "Session event: {}", $msg
        );
    };
    (warn, $event:expr, quiz_id = $quiz_id:expr, $msg:expr) => {
        tracing::warn!(
            component = "session",
            event = $event,
            quiz_id = %$quiz_id,
            "Session warning: {}", $msg
        );
    };
    ($event:expr, quiz_id = $quiz_id:expr, attempt_id = $attempt_id:expr, $msg:expr) => {
        tracing::info!(
            component = "session",
            event = $event,
            quiz_id = %$quiz_id,
            attempt_id = %$attempt_id,
            "Session event: {}", $msg
        );
    };
}

// ============================================================================
// Durable Store Logging Macros
// ============================================================================

/// Log key-value store operations
#[macro_export]
macro_rules! log_store_operation {
    (debug, $operation:expr, key = $key:expr) => {
        tracing::debug!(
            component = "store",
            operation = $operation,
            key = %$key,
            "Store operation completed"
        );
    };
    (warn, $operation:expr, key = $key:expr, error = $error:expr, $msg:expr) => {
        tracing::warn!(
            component = "store",
            operation = $operation,
            key = %$key,
            error = %$error,
            "Store warning: {}", $msg
        );
    };
    (error, $operation:expr, key = $key:expr, error = $error:expr) => {
        tracing::error!(
            component = "store",
            operation = $operation,
            key = %$key,
            error = %$error,
            "Store operation failed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "store",
            operation = $operation,
            "Store operation: {}", $msg
        );
    };
}

// ============================================================================
// AI Assistant Logging Macros
// ============================================================================

/// Log AI assistant calls with mode context
#[macro_export]
macro_rules! log_assistant_operation {
    (start, $operation:expr, mode = $mode:expr, message_count = $count:expr) => {
        tracing::info!(
            component = "assistant",
            operation = $operation,
            mode = %$mode,
            message_count = $count,
            "Assistant operation started"
        );
    };
    (success, $operation:expr, mode = $mode:expr, duration_ms = $duration:expr, chars = $chars:expr) => {
        tracing::info!(
            component = "assistant",
            operation = $operation,
            mode = %$mode,
            duration_ms = $duration,
            response_chars = $chars,
            "Assistant operation completed successfully"
        );
    };
    (error, $operation:expr, mode = $mode:expr, error = $error:expr) => {
        tracing::error!(
            component = "assistant",
            operation = $operation,
            mode = %$mode,
            error = %$error,
            "Assistant operation failed"
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "assistant",
            operation = $operation,
            "Assistant operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}
