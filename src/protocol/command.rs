/// Verbs of the text command protocol. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Set,
    Unknown,
}

/// A request parsed from a Text frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub args: Vec<String>,
}

impl Command {
    /// Parses `GET key` / `SET key value`.
    ///
    /// The verb is the leading run of non-whitespace characters, so a payload
    /// starting with whitespace has an empty verb and is [`Verb::Unknown`].
    /// Never fails; argument counts are checked by whoever executes the command.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let verb_len = text.find(char::is_whitespace).unwrap_or(text.len());
        let (verb, rest) = text.split_at(verb_len);
        let verb = match verb {
            "GET" => Verb::Get,
            "SET" => Verb::Set,
            _ => Verb::Unknown,
        };
        Self {
            verb,
            args: rest.split_whitespace().map(str::to_owned).collect(),
        }
    }
}
