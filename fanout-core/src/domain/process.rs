//! External process descriptors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::DefinitionError;

/// Describes one external program invocation
///
/// The runner turns this into a child process; the core only cares about
/// what to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// Creates a spec for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Appends arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Parses a whitespace-separated command line such as `gzip -c -9`
    ///
    /// No quoting is supported; use a pipeline definition file for
    /// arguments containing spaces.
    pub fn parse(command_line: &str) -> Result<Self, DefinitionError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DefinitionError::EmptyCommand(command_line.to_string()))?;

        Ok(Self::new(program).args(parts))
    }

    /// Checks that the spec names a program
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.program.trim().is_empty() {
            return Err(DefinitionError::EmptyCommand(self.program.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
