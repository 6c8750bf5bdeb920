//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Serialize};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot find the software root directory: {0}")]
    SwRootNotFound(std::io::Error),

    #[error("Cannot load the parameter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file {0:?}: {1}")]
    DeserialiseError(PathBuf, toml::de::Error)
}

/// An error that occurs while echoing parameters back into their file format.
#[derive(Debug, Error)]
pub enum EchoError {
    #[error("Cannot serialise the parameters: {0}")]
    SerialiseError(toml::ser::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "params" directory under the software root.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_sw_root()
        .map_err(LoadError::SwRootNotFound)?;
    path.push("params");
    path.push(param_file_path);

    load_path(path)
}

/// Load a parameter file from an explicit path.
pub fn load_path<P, T>(path: T) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    T: AsRef<Path>
{
    let path = path.as_ref().to_path_buf();

    // Load the file into a string
    let params_str = match read_to_string(&path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(path, e))
    };

    from_str(&params_str).map_err(|e| LoadError::DeserialiseError(path, e))
}

/// Parse parameters from a string in the parameter file format.
pub fn from_str<P>(params_str: &str) -> Result<P, toml::de::Error>
where
    P: DeserializeOwned
{
    toml::from_str(params_str)
}

/// Echo parameters back in the parameter file format.
///
/// Loading the returned string with `from_str` gives back the same values.
pub fn echo<P>(params: &P) -> Result<String, EchoError>
where
    P: Serialize
{
    toml::to_string(params).map_err(EchoError::SerialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Dummy {
        gain: f64,
        name: String
    }

    #[test]
    fn test_from_str_and_echo() {
        let p: Dummy = from_str("gain = 0.25\nname = \"test\"\n").unwrap();
        assert_eq!(p, Dummy { gain: 0.25, name: String::from("test") });

        let echoed = echo(&p).unwrap();
        let back: Dummy = from_str(&echoed).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn test_load_path_missing_file() {
        let res: Result<Dummy, _> = load_path("this/file/does/not/exist.toml");
        assert!(matches!(res, Err(LoadError::FileLoadError(_, _))));
    }
}
