use std::{
    ffi::{OsStr, OsString},
    fmt::Display,
    process::Stdio,
};

#[derive(Debug, Clone)]
pub enum FdMode {
    Inherit,
    Pipe,
    Null,
}

impl From<FdMode> for Stdio {
    fn from(val: FdMode) -> Stdio {
        match val {
            FdMode::Inherit => Stdio::inherit(),
            FdMode::Pipe => Stdio::piped(),
            FdMode::Null => Stdio::null(),
        }
    }
}

// The standard library's `std::process::Command` isn't clonable and has some private parameters,
// like the stdout mode (inherited/piped).
// This `Command` struct fully owns its parameters, so that it can be cloned,
// passed around, recorded in the command log and matched by the null runner.
#[derive(Clone, Debug)]
pub struct Command {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
    pub stdout: FdMode,
    pub stderr: FdMode,
    pub stdin: FdMode,
}

impl Command {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin: FdMode::Null,
            stdout: FdMode::Inherit,
            stderr: FdMode::Inherit,
        }
    }

    pub fn new_with_args(
        program: impl AsRef<OsStr>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Self {
        let mut cmd = Self::new(program);
        cmd.args(args);
        cmd
    }

    // appends multiple args
    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|x| x.as_ref().to_owned()));
        self
    }

    // appends one arg
    pub fn arg<S>(&mut self, arg: S) -> &mut Command
    where
        S: AsRef<OsStr>,
    {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    // sets one environment variable on top of the inherited environment
    pub fn env<K, V>(&mut self, key: K, value: V) -> &mut Command
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.envs
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    pub fn to_vec(&self) -> Vec<OsString> {
        let mut v = Vec::with_capacity(1 + self.args.len());
        v.push(self.program.clone());
        v.extend(self.args.iter().cloned());
        v
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

impl From<Command> for async_process::Command {
    fn from(val: Command) -> Self {
        let mut cmd = async_process::Command::new(val.program);
        cmd.args(val.args)
            .envs(val.envs)
            .stdin::<Stdio>(val.stdin.into())
            .stdout::<Stdio>(val.stdout.into())
            .stderr::<Stdio>(val.stderr.into());
        cmd
    }
}
