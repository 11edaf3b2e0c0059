//! Chat command recognition.
//!
//! | Text | Command |
//! |------|---------|
//! | `/start` | `Start` |
//! | `/add_member <username>\|<chat_id>` | `AddMember` |
//! | `/add_task <description>\|<YYYY-MM-DD>\|<username>` | `AddTask` |
//! | `/show_tasks` | `ShowTasks` |

/// A chat command recognized from an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Greeting and usage help.
    Start,
    /// Register a member. Holds the raw argument text.
    AddMember(String),
    /// Create a task. Holds the raw argument text.
    AddTask(String),
    /// List all tasks.
    ShowTasks,
}

impl Command {
    /// Recognize a command in `text`.
    ///
    /// The command word may carry a `@botname` suffix. Arguments are the
    /// remainder of the message, trimmed. Returns `None` for plain text and
    /// unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (word, args) = match rest.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (rest, ""),
        };
        let name = word.split_once('@').map_or(word, |(name, _bot)| name);

        match name {
            "start" => Some(Self::Start),
            "add_member" => Some(Self::AddMember(args.to_owned())),
            "add_task" => Some(Self::AddTask(args.to_owned())),
            "show_tasks" => Some(Self::ShowTasks),
            _ => None,
        }
    }
}

/// Split `args` on `|` into exactly `N` trimmed parts.
pub(crate) fn split_fields<const N: usize>(args: &str) -> Option<[&str; N]> {
    if !args.contains('|') {
        return None;
    }
    let parts: Vec<&str> = args.split('|').map(str::trim).collect();
    parts.try_into().ok()
}
