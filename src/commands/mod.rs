//! Chat command handlers.
//!
//! Each handler validates its arguments, mutates the [`RecordStore`], and
//! returns the reply text for the invoking chat. Validation failures are
//! [`CommandError`]s whose `Display` is the reply.

pub mod parse;

pub use parse::Command;

use crate::channels::traits::ChannelInboundMessage;
use crate::error::BotError;
use crate::store::{Member, RecordStore, Task, parse_deadline};
use parse::split_fields;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

const ADD_MEMBER_USAGE: &str =
    "/add_member <username>|<chat_id>\nExample: /add_member ahmed|123456789";
const ADD_TASK_USAGE: &str =
    "/add_task <task>|<YYYY-MM-DD>|<username>\nExample: /add_task prepare_report|2025-07-20|ahmed";

/// A command that could not be carried out. The message is shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("❌ Invalid format. Use: {0}")]
    Usage(&'static str),

    #[error("❌ Chat ID must be a number.")]
    ChatIdNotNumeric,

    #[error("⚠️ Member {0} already exists.")]
    MemberExists(String),

    #[error("❌ Invalid date format. Use YYYY-MM-DD.")]
    InvalidDate,

    #[error("❌ Member '{0}' is not registered. Add them first with /add_member.")]
    UnknownMember(String),

    #[error("❌ Something went wrong while {action}. Error: {source}")]
    Storage {
        action: &'static str,
        #[source]
        source: BotError,
    },
}

/// Routes recognized commands to their handlers.
#[derive(Clone)]
pub struct CommandHandler {
    store: RecordStore,
}

impl CommandHandler {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Handle one inbound message. Returns the reply, or `None` when the
    /// message is not a command.
    pub fn handle(&self, message: &ChannelInboundMessage) -> Option<String> {
        let Some(command) = Command::parse(&message.text) else {
            debug!("ignoring non-command message from chat {}", message.chat_id);
            return None;
        };

        let result = match command {
            Command::Start => Ok(start_text(&message.sender_name, message.chat_id)),
            Command::AddMember(args) => self.add_member(&args),
            Command::AddTask(args) => self.add_task(&args),
            Command::ShowTasks => Ok(self.show_tasks()),
        };

        Some(result.unwrap_or_else(|err| {
            warn!("command from chat {} rejected: {err}", message.chat_id);
            err.to_string()
        }))
    }

    /// `/add_member <username>|<chat_id>`
    pub fn add_member(&self, args: &str) -> Result<String, CommandError> {
        let [username, chat_id] =
            split_fields::<2>(args).ok_or(CommandError::Usage(ADD_MEMBER_USAGE))?;
        if username.is_empty() {
            return Err(CommandError::Usage(ADD_MEMBER_USAGE));
        }
        if chat_id.is_empty() || !chat_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommandError::ChatIdNotNumeric);
        }
        let chat_id: i64 = chat_id
            .parse()
            .map_err(|_| CommandError::ChatIdNotNumeric)?;

        let inserted = self
            .store
            .insert_member(Member {
                username: username.to_owned(),
                chat_id,
            })
            .map_err(|source| CommandError::Storage {
                action: "adding the member",
                source,
            })?;
        if !inserted {
            return Err(CommandError::MemberExists(username.to_owned()));
        }

        info!("registered member {username} (chat_id: {chat_id})");
        Ok(format!(
            "✅ Member {username} added (Chat ID: `{chat_id}`)."
        ))
    }

    /// `/add_task <description>|<YYYY-MM-DD>|<username>`
    pub fn add_task(&self, args: &str) -> Result<String, CommandError> {
        let [description, deadline, assignee] =
            split_fields::<3>(args).ok_or(CommandError::Usage(ADD_TASK_USAGE))?;
        if description.is_empty() {
            return Err(CommandError::Usage(ADD_TASK_USAGE));
        }
        let deadline = parse_deadline(deadline).map_err(|_| CommandError::InvalidDate)?;

        let members = self.store.load_members();
        let member = members
            .get(assignee)
            .ok_or_else(|| CommandError::UnknownMember(assignee.to_owned()))?;

        let task = Task::new(description, deadline, assignee, member.chat_id);
        let reply = format!(
            "✅ Task added:\nTask: {}\nDeadline: {}\nAssignee: {}",
            task.description, task.deadline, task.assigned_to
        );
        self.store
            .append_task(task)
            .map_err(|source| CommandError::Storage {
                action: "adding the task",
                source,
            })?;

        info!("added task '{description}' for {assignee}");
        Ok(reply)
    }

    /// `/show_tasks`
    pub fn show_tasks(&self) -> String {
        let tasks = self.store.load_tasks();
        if tasks.is_empty() {
            return "📭 There are no tasks yet.".to_owned();
        }

        let mut text = String::from("📋 Tasks:\n\n");
        for (i, task) in tasks.iter().enumerate() {
            let _ = write!(
                text,
                "🔹 {}. {}\n   Due: {}\n   Assignee: {}\n--------------------\n",
                i + 1,
                task.description,
                task.deadline,
                task.assigned_to
            );
        }
        text
    }
}

fn start_text(first_name: &str, chat_id: i64) -> String {
    format!(
        "✅ Welcome, {first_name}!\nChat ID: `{chat_id}`\n\n\
         I am the task reminder bot.\n\
         Usage:\n\
         {ADD_MEMBER_USAGE} - register a team member\n\
         {ADD_TASK_USAGE} - add a task\n\
         /show_tasks - list all tasks"
    )
}
