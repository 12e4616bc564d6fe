//! Generic parameter file loading

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::{fs, path::Path};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parameter file: {0}")]
    FileLoadError(#[from] std::io::Error),

    #[error("Cannot parse the parameter file: {0}")]
    DeserialiseError(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter struct from the TOML file at the given path.
pub fn load<P, T>(param_file_path: P) -> Result<T, LoadError>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let params_str = fs::read_to_string(param_file_path)?;

    Ok(toml::from_str(&params_str)?)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct TestParams {
        some_value_m: f64,
        some_flag: bool,
    }

    #[test]
    fn test_load() {
        let file = std::env::temp_dir().join(format!("util_params_test_{}.toml", std::process::id()));
        std::fs::write(&file, "some_value_m = 1.5\nsome_flag = true\n").unwrap();

        let params: TestParams = super::load(&file).unwrap();
        assert!((params.some_value_m - 1.5).abs() < 1e-12);
        assert!(params.some_flag);

        std::fs::remove_file(&file).ok();
    }
}
