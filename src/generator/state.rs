//! Generated state: what one pass hands back to the controller

use crate::overlay::Overlay;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Post-generation command, recorded as data and executed after convergence.
///
/// `working_dir` is relative to the output root; `None` runs in the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl PostCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program and arguments joined by spaces, for logs and errors.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for PostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())?;
        if let Some(dir) = &self.working_dir {
            write!(f, " (in {})", dir.display())?;
        }
        Ok(())
    }
}

/// Result of one generation pass
#[derive(Debug, Clone, Default)]
pub struct GeneratedState {
    /// Proposed output tree, merged once and then dropped
    pub overlay: Overlay,
    /// Commands to run once generation has converged
    pub post_commands: Vec<PostCommand>,
    /// The written output changes the inputs to generation; run another pass
    pub need_regenerate: bool,
}

impl GeneratedState {
    pub fn new(overlay: Overlay) -> Self {
        Self {
            overlay,
            ..Self::default()
        }
    }

    pub fn with_post_command(mut self, command: PostCommand) -> Self {
        self.post_commands.push(command);
        self
    }

    pub fn regenerate(mut self, need_regenerate: bool) -> Self {
        self.need_regenerate = need_regenerate;
        self
    }
}
