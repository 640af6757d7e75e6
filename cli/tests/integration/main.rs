//! Integration test harness for mc-admin.

mod end_to_end;
