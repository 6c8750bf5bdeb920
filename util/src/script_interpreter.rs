//! # Command script interpreter module
//!
//! This module provides an interpreter for go-to-pose command scripts. A
//! script is a plain text file of the form:
//!
//! ```text
//! locomotionParameters.toml
//! setpose    0   0  0
//! goto1      0 1.2  0
//! goto2      0   0  0
//! ```
//!
//! The first token names the locomotion parameter file, relative to the
//! directory containing the script. Each following line is a telecommand made
//! of a verb and three numbers. Processing of the script stops at the first
//! line which can't be parsed, just as it stops at the end of the file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use log::warn;
use regex::Regex;
use thiserror::Error;

// Internal
use comms_if::tc::{Tc, TcParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command read from the script.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The (1-based) line of the script the command was read from
    pub line_num: usize,

    /// The Telecommand to run
    pub tc: Tc
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.next_tc` to
/// acquire the telecommands in order.
#[derive(Debug)]
pub struct ScriptInterpreter {
    script_path: PathBuf,
    params_path: PathBuf,
    cmds: VecDeque<Command>,
    stop: ScriptStop
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("Unable to read the locomotion parameter filename from the script")]
    MissingParamFileName,

    #[error("Invalid locomotion parameter filename line: \"{0}\"")]
    InvalidParamFileName(String)
}

/// Why the interpreter will stop producing telecommands.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStop {
    /// Every line of the script was read.
    EndOfScript,

    /// A line could not be parsed, nothing after it will be run.
    Malformed {
        line_num: usize,
        line: String,
        reason: String
    }
}

/// The next item to process from the script.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingTc {
    Some(Command),
    Stop(ScriptStop)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        // Get the path in a buffer
        let path = PathBuf::from(script_path.as_ref());

        // Check that the script file exists.
        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        // Load the script into a string
        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        // Parameter file is relative to the script's own directory
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self::from_script(&script, path, &base_dir)
    }

    /// Create a new interpreter from the contents of a script.
    ///
    /// `script_path` is only used for reporting, `base_dir` is the directory
    /// the parameter file name is resolved against.
    pub fn from_script<P: AsRef<Path>>(
        script: &str,
        script_path: PathBuf,
        base_dir: P
    ) -> Result<Self, ScriptError> {

        let line_re = Regex::new(r"^\s*(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s*$")
            .expect("Command line regex is invalid");

        let mut lines = script
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| !l.trim().is_empty());

        // ---- PARAMETER FILE NAME ----

        let params_path = match lines.next() {
            Some((_, l)) => {
                let mut tokens = l.split_whitespace();
                match (tokens.next(), tokens.next()) {
                    (Some(name), None) => base_dir.as_ref().join(name),
                    _ => return Err(ScriptError::InvalidParamFileName(l.trim().to_string()))
                }
            },
            None => return Err(ScriptError::MissingParamFileName)
        };

        // ---- COMMANDS ----

        let mut cmds: VecDeque<Command> = VecDeque::new();
        let mut stop = ScriptStop::EndOfScript;

        for (line_num, line) in lines {
            let parsed = match line_re.captures(line) {
                Some(cap) => Tc::parse(
                    &cap[1],
                    &[&cap[2], &cap[3], &cap[4]]
                ),
                None => Err(TcParseError::WrongNumberOfFields(
                    line.split_whitespace().count()
                ))
            };

            match parsed {
                Ok(tc) => cmds.push_back(Command { line_num, tc }),
                Err(TcParseError::UnknownVerb(v)) => {
                    warn!("Ignoring unknown command \"{}\" on line {}", v, line_num);
                },
                Err(e) => {
                    stop = ScriptStop::Malformed {
                        line_num,
                        line: line.trim().to_string(),
                        reason: format!("{}", e)
                    };
                    break
                }
            }
        }

        Ok(ScriptInterpreter {
            script_path,
            params_path,
            cmds,
            stop
        })
    }

    /// Return the next telecommand to execute, or the reason there are none left.
    pub fn next_tc(&mut self) -> PendingTc {
        match self.cmds.pop_front() {
            Some(c) => PendingTc::Some(c),
            None => PendingTc::Stop(self.stop.clone())
        }
    }

    /// Get the number of TCs remaining in the script
    pub fn get_num_tcs(&self) -> usize {
        self.cmds.len()
    }

    /// Path to the locomotion parameter file named by the script.
    pub fn params_path(&self) -> &Path {
        &self.params_path
    }

    /// Path of the script itself.
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::{ControlLaw, PoseSpec};

    fn interp(script: &str) -> Result<ScriptInterpreter, ScriptError> {
        ScriptInterpreter::from_script(script, PathBuf::from("test.txt"), "data")
    }

    #[test]
    fn test_sample_script() {
        let mut si = interp(
            "parameters.toml\n\
             setpose    0   0  0\n\
             goto1      0 1.2  0\n\
             \n\
             goto2      0   0  0\n"
        ).unwrap();

        assert_eq!(si.params_path(), Path::new("data/parameters.toml"));
        assert_eq!(si.get_num_tcs(), 3);

        assert_eq!(si.next_tc(), PendingTc::Some(Command {
            line_num: 2,
            tc: Tc::SetPose(PoseSpec { x: 0.0, y: 0.0, theta: 0.0 })
        }));
        assert_eq!(si.next_tc(), PendingTc::Some(Command {
            line_num: 3,
            tc: Tc::Goto {
                law: ControlLaw::Sequential,
                goal: PoseSpec { x: 0.0, y: 1.2, theta: 0.0 }
            }
        }));
        assert_eq!(si.next_tc(), PendingTc::Some(Command {
            line_num: 5,
            tc: Tc::Goto {
                law: ControlLaw::Simultaneous,
                goal: PoseSpec { x: 0.0, y: 0.0, theta: 0.0 }
            }
        }));
        assert_eq!(si.next_tc(), PendingTc::Stop(ScriptStop::EndOfScript));
        assert_eq!(si.next_tc(), PendingTc::Stop(ScriptStop::EndOfScript));
    }

    #[test]
    fn test_malformed_line_stops_script() {
        let mut si = interp(
            "parameters.toml\n\
             goto1 1 1 0\n\
             goto2 1 oops 0\n\
             goto1 2 2 0\n"
        ).unwrap();

        assert_eq!(si.get_num_tcs(), 1);
        assert!(matches!(si.next_tc(), PendingTc::Some(_)));
        match si.next_tc() {
            PendingTc::Stop(ScriptStop::Malformed { line_num, .. }) => assert_eq!(line_num, 3),
            p => panic!("Expected malformed stop, got {:?}", p)
        }
    }

    #[test]
    fn test_short_line_stops_script() {
        let mut si = interp("parameters.toml\ngoto1 1 1\ngoto1 2 2 0\n").unwrap();
        assert_eq!(si.get_num_tcs(), 0);
        assert!(matches!(
            si.next_tc(),
            PendingTc::Stop(ScriptStop::Malformed { line_num: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_verb_is_skipped() {
        let si = interp("parameters.toml\njump 1 1 1\ngoto1 2 2 0\n").unwrap();
        assert_eq!(si.get_num_tcs(), 1);
    }

    #[test]
    fn test_param_file_name_errors() {
        assert!(matches!(interp(""), Err(ScriptError::MissingParamFileName)));
        assert!(matches!(interp("  \n\n"), Err(ScriptError::MissingParamFileName)));
        assert!(matches!(
            interp("setpose 0 0 0\n"),
            Err(ScriptError::InvalidParamFileName(_))
        ));
    }

    #[test]
    fn test_missing_script() {
        assert!(matches!(
            ScriptInterpreter::new("no/such/script.txt"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
