//! Assertion macros shared by integration tests.

/// Await a modem-side future and panic with contextual diagnostics on failure.
#[macro_export]
macro_rules! modem_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("mock modem failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

/// Await a call future and panic with contextual diagnostics on failure.
#[macro_export]
macro_rules! call_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("call failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

pub use crate::{call_expect, modem_expect};
