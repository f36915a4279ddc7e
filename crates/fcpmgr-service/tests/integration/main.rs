//! Integration tests against an in-memory store with migrations applied.

mod helpers;

mod allocation_test;
mod device_test;
mod template_test;
