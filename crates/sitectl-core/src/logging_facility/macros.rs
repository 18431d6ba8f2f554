//! Operation boundary macros
//!
//! Each public engine operation logs exactly one start event and exactly one
//! end or end_error event.

/// Log the start of an operation
///
/// ```
/// # use sitectl_core::log_op_start;
/// log_op_start!("build");
/// log_op_start!("build", website = "sample", environment = "staging");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use sitectl_core::log_op_end;
/// log_op_end!("build", duration_ms = 42);
/// log_op_end!("build", duration_ms = 42, release_id = "r1");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log a failed operation with its error classification
///
/// ```
/// # use sitectl_core::log_op_error;
/// # use sitectl_core::errors::SiteError;
/// let err = SiteError::not_found("website sample not found");
/// log_op_error!("build", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let site_err: &$crate::errors::SiteError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?site_err.kind(),
            err.code = site_err.code(),
            error = %site_err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let site_err: &$crate::errors::SiteError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::__schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?site_err.kind(),
            err.code = site_err.code(),
            error = %site_err,
            $($field)*
        );
    }};
}
