#![allow(dead_code, unused_imports)]

pub use cmdtrack_test_utils::builders;
pub use cmdtrack_test_utils::fake_operation;
pub use cmdtrack_test_utils::{
    init_tracing, read_all_lines, wait_until_finished, wait_until_started, with_timeout,
};
