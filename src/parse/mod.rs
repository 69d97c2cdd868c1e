pub mod command;
pub mod tokenize;
pub mod types;

pub use command::CommandParser;
pub use tokenize::{join_args, split_command};
pub use types::{ParsedCommand, TokenKind};
