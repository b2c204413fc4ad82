//! Process launch settings.

use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the Prolog executable.
pub const PROGRAM_ENV: &str = "SWIPL_PATH";
/// Environment variable overriding the startup script.
pub const SCRIPT_ENV: &str = "SWIPL_TOP";

fn default_program() -> String {
    "swipl".to_string()
}

fn default_script() -> PathBuf {
    PathBuf::from("top.pl")
}

fn default_goal() -> String {
    "loop".to_string()
}

fn default_forward_stderr() -> bool {
    true
}

/// How to launch the Prolog process.
///
/// The process runs `program -f <script> -tty -q [extra_args..] -t <goal>`:
/// the script defines the request loop, `-tty` and `-q` keep the terminal
/// and banner out of the protocol stream, and `goal` is the toplevel that
/// serves requests until stdin closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable to run.
    #[serde(default = "default_program")]
    pub program: String,

    /// Prolog file that implements the request loop.
    #[serde(default = "default_script")]
    pub script: PathBuf,

    /// Toplevel goal run after loading `script`.
    #[serde(default = "default_goal")]
    pub goal: String,

    /// Extra arguments passed before `-t`.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Copy the process's stderr to ours. When false it is discarded.
    #[serde(default = "default_forward_stderr")]
    pub forward_stderr: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            script: default_script(),
            goal: default_goal(),
            extra_args: Vec::new(),
            forward_stderr: default_forward_stderr(),
        }
    }
}

impl EngineConfig {
    /// Defaults, with `SWIPL_PATH` and `SWIPL_TOP` applied when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(program) = lookup(PROGRAM_ENV).filter(|v| !v.is_empty()) {
            config.program = program;
        }
        if let Some(script) = lookup(SCRIPT_ENV).filter(|v| !v.is_empty()) {
            config.script = PathBuf::from(script);
        }
        config
    }

    /// Command-line arguments for the process.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-f".into(), self.script.clone().into_os_string()];
        args.push("-tty".into());
        args.push("-q".into());
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push("-t".into());
        args.push(self.goal.clone().into());
        args
    }
}
