//! Built-in deny lists for the static validator.

/// Modules (and their submodules) a program may never import.
pub const DEFAULT_DENY_MODULES: &[&str] = &[
    "os",
    "sys",
    "subprocess",
    "shutil",
    "socket",
    "urllib.request",
    "pathlib",
    "glob",
    "ctypes",
    "importlib",
    "pty",
    "signal",
    "multiprocessing",
    "http.client",
    "ftplib",
    "telnetlib",
    "builtins",
];

/// Built-in functions a program may never call by name.
pub const DEFAULT_DENY_CALLS: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "__import__",
    "globals",
    "locals",
    "vars",
    "open",
    "getattr",
    "setattr",
    "delattr",
    "breakpoint",
    "input",
];

pub fn default_deny_modules() -> Vec<String> {
    DEFAULT_DENY_MODULES.iter().map(|s| s.to_string()).collect()
}

pub fn default_deny_calls() -> Vec<String> {
    DEFAULT_DENY_CALLS.iter().map(|s| s.to_string()).collect()
}
