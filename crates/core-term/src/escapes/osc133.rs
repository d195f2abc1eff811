//! OSC 133 semantic prompt markers.
//!
//! Shells annotate their output so terminals can jump between prompts and
//! capture command output: `A` marks a prompt start, `B` the end of the
//! prompt (start of user input), `C` the start of command output, and
//! `D[;exit]` the end of a command.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Osc133 {
    PromptStart,
    InputStart,
    OutputStart,
    CommandDone { exit_code: Option<u32> },
}

impl Osc133 {
    /// Parse the payload after `133;`. Additional `;key=value` options are
    /// tolerated and ignored.
    pub fn parse(data: &str) -> Option<Osc133> {
        let mut parts = data.split(';');
        let marker = parts.next()?;
        match marker {
            "A" => Some(Osc133::PromptStart),
            "B" => Some(Osc133::InputStart),
            "C" => Some(Osc133::OutputStart),
            "D" => {
                let exit_code = parts.next().and_then(|code| code.parse().ok());
                Some(Osc133::CommandDone { exit_code })
            }
            _ => None,
        }
    }

    pub fn serialize(&self) -> String {
        match self {
            Osc133::PromptStart => "\x1b]133;A\x1b\\".to_owned(),
            Osc133::InputStart => "\x1b]133;B\x1b\\".to_owned(),
            Osc133::OutputStart => "\x1b]133;C\x1b\\".to_owned(),
            Osc133::CommandDone { exit_code: None } => "\x1b]133;D\x1b\\".to_owned(),
            Osc133::CommandDone {
                exit_code: Some(code),
            } => format!("\x1b]133;D;{code}\x1b\\"),
        }
    }
}

/// The state a tracked command is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    AtPrompt,
    ReadingInput,
    Running,
    Done,
}

/// One shell command's lifecycle, in absolute rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub prompt_row: u64,
    pub state: CommandState,
    pub exit_code: Option<u32>,
}

/// Commands observed via OSC 133, oldest first. Bounded so a long-running
/// session cannot grow it without limit.
#[derive(Debug, Clone, Default)]
pub struct Commands {
    entries: Vec<CommandEntry>,
}

impl Commands {
    const MAX_ENTRIES: usize = 1000;

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    pub fn apply(&mut self, event: Osc133, cursor_absolute_row: u64) {
        match event {
            Osc133::PromptStart => {
                if self.entries.len() == Self::MAX_ENTRIES {
                    self.entries.remove(0);
                }
                self.entries.push(CommandEntry {
                    prompt_row: cursor_absolute_row,
                    state: CommandState::AtPrompt,
                    exit_code: None,
                });
            }
            Osc133::InputStart => {
                if let Some(entry) = self.entries.last_mut() {
                    entry.state = CommandState::ReadingInput;
                }
            }
            Osc133::OutputStart => {
                if let Some(entry) = self.entries.last_mut() {
                    entry.state = CommandState::Running;
                }
            }
            Osc133::CommandDone { exit_code } => {
                if let Some(entry) = self.entries.last_mut() {
                    entry.state = CommandState::Done;
                    entry.exit_code = exit_code;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_markers() {
        assert_eq!(Osc133::parse("A"), Some(Osc133::PromptStart));
        assert_eq!(Osc133::parse("B"), Some(Osc133::InputStart));
        assert_eq!(Osc133::parse("C"), Some(Osc133::OutputStart));
        assert_eq!(
            Osc133::parse("D;0"),
            Some(Osc133::CommandDone { exit_code: Some(0) })
        );
        assert_eq!(
            Osc133::parse("D"),
            Some(Osc133::CommandDone { exit_code: None })
        );
        assert_eq!(Osc133::parse("Z"), None);
    }

    #[test]
    fn parse_tolerates_options() {
        assert_eq!(Osc133::parse("A;aid=7"), Some(Osc133::PromptStart));
    }

    #[test]
    fn serialize_round_trip() {
        let samples = [
            Osc133::PromptStart,
            Osc133::InputStart,
            Osc133::OutputStart,
            Osc133::CommandDone { exit_code: None },
            Osc133::CommandDone { exit_code: Some(130) },
        ];
        for sample in samples {
            let serialized = sample.serialize();
            let payload = serialized
                .strip_prefix("\x1b]133;")
                .unwrap()
                .strip_suffix("\x1b\\")
                .unwrap();
            assert_eq!(Osc133::parse(payload), Some(sample));
        }
    }

    #[test]
    fn command_lifecycle() {
        let mut commands = Commands::default();
        commands.apply(Osc133::PromptStart, 10);
        commands.apply(Osc133::InputStart, 10);
        commands.apply(Osc133::OutputStart, 11);
        commands.apply(Osc133::CommandDone { exit_code: Some(1) }, 14);

        let [entry] = commands.entries() else {
            panic!("one command expected");
        };
        assert_eq!(entry.prompt_row, 10);
        assert_eq!(entry.state, CommandState::Done);
        assert_eq!(entry.exit_code, Some(1));
    }
}
