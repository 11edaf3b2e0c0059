//! Member and task records persisted as flat JSON files.

pub mod json_file;
pub mod records;

pub use json_file::{MEMBERS_FILE, RecordStore, TASKS_FILE};
pub use records::{DEADLINE_FORMAT, Member, Task, parse_deadline};
