use colored::Colorize;

pub const SUCCESS_MARKER: &str = "✓";
pub const FAILURE_MARKER: &str = "✗";

/// One line of human output, shared by the log file and the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Banner(String),
    Success(String),
    Failure { context: String, message: String },
    Text(String),
}

impl Line {
    pub fn plain(&self) -> String {
        match self {
            Line::Banner(label) => format!("== {label} =="),
            Line::Success(label) => format!("{SUCCESS_MARKER} {label}"),
            Line::Failure { context, message } => format!("{FAILURE_MARKER} {context}: {message}"),
            Line::Text(text) => text.clone(),
        }
    }

    pub fn colored(&self) -> String {
        match self {
            Line::Banner(_) => self.plain().bold().to_string(),
            Line::Success(label) => format!("{} {}", SUCCESS_MARKER.green(), label),
            Line::Failure { context, message } => {
                format!("{} {}: {}", FAILURE_MARKER.red(), context, message.red())
            }
            Line::Text(text) => text.clone(),
        }
    }
}
