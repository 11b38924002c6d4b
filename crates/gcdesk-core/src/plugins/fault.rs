//! Fault boundaries around calls into plug-in code.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use gcdesk_plugin_sdk::PluginResult;

/// Run `f`, converting a panic into its message.
pub(crate) fn guard<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Run a fallible plug-in call, converting both errors and panics into a
/// message.
pub(crate) fn call<T>(f: impl FnOnce() -> PluginResult<T>) -> Result<T, String> {
    guard(f)?.map_err(|e| e.to_string())
}

/// Drop a value that may run plug-in code in its destructor.
pub(crate) fn dispose<T>(value: T) -> Result<(), String> {
    guard(move || drop(value))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcdesk_plugin_sdk::PluginError;

    #[test]
    fn test_guard_passes_values_through() {
        assert_eq!(guard(|| 7), Ok(7));
    }

    #[test]
    fn test_guard_catches_panics() {
        let err = guard(|| -> u32 { panic!("boom") }).unwrap_err();
        assert_eq!(err, "panicked: boom");

        let code = 42;
        let err = guard(|| -> u32 { panic!("code {}", code) }).unwrap_err();
        assert_eq!(err, "panicked: code 42");
    }

    #[test]
    fn test_call_flattens_errors() {
        let err = call(|| -> PluginResult<()> { Err(PluginError::msg("no license")) }).unwrap_err();
        assert_eq!(err, "no license");
    }

    #[test]
    fn test_dispose_catches_panicking_drop() {
        struct Bomb;
        impl Drop for Bomb {
            fn drop(&mut self) {
                panic!("drop bomb");
            }
        }
        assert_eq!(dispose(Bomb).unwrap_err(), "panicked: drop bomb");
    }
}
