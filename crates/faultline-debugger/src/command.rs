use std::path::PathBuf;

/// Command line of a target process to spawn under trace.
#[derive(Debug, Clone)]
pub struct Command {
    /// Program to spawn.
    pub program: PathBuf,

    /// Program arguments.
    pub args: Vec<String>,
}

impl Command {
    /// Constructs a new `Command` for launching the program at path
    /// `program`, with no arguments.
    ///
    /// If `program` is not an absolute path, the `PATH` will be searched in
    /// an OS-defined way.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds an argument to pass to the program.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments to pass to the program.
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |cmd, arg| cmd.arg(arg))
    }
}
