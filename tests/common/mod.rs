#![allow(unused_imports)]

pub use jobshell_test_utils::builders;
pub use jobshell_test_utils::{init_tracing, wait_until_complete, with_timeout};
