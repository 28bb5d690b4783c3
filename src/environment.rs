use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStringExt;

/// Read-only copy of the environment the shell was started with.
///
/// Words on the command line that exactly match a variable name are replaced
/// by its value. The same variables, untouched, are handed to every child.
#[derive(Debug, Default)]
pub struct Environment {
    variables: HashMap<String, String>,
    envp: Vec<CString>,
}

impl Environment {
    pub fn capture() -> Self {
        Self::from_vars(env::vars_os())
    }

    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut variables = HashMap::new();
        let mut envp = Vec::new();
        for (name, value) in vars {
            let mut entry = name.clone().into_vec();
            entry.push(b'=');
            entry.extend_from_slice(value.as_encoded_bytes());
            // The OS never hands out entries with interior NULs.
            if let Ok(entry) = CString::new(entry) {
                envp.push(entry);
            }
            if let (Ok(name), Ok(value)) = (name.into_string(), value.into_string()) {
                variables.insert(name, value);
            }
        }
        Environment { variables, envp }
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Substitutes `word` when it is exactly the name of a variable.
    pub fn resolve<'a>(&'a self, word: &'a str) -> Cow<'a, str> {
        match self.lookup(word) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Borrowed(word),
        }
    }

    pub fn envp(&self) -> &[CString] { &self.envp }
}
