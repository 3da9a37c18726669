use std::fmt;
use std::io::Write;

/// Structural invariants whose violation leaves the embedding in a state the
/// bridge cannot continue from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FatalInvariant {
    NullModuleDef,
    ZeroModuleIndex,
}

impl fmt::Display for FatalInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullModuleDef => f.write_str("Module Definition is NULL"),
            Self::ZeroModuleIndex => f.write_str("Module index invalid."),
        }
    }
}

/// Reports `invariant` against `func` and aborts the process.
#[cold]
pub fn fatal_error(func: &str, invariant: FatalInvariant) -> ! {
    log::error!("{func}: {invariant}");
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "Fatal Python error: {func}: {invariant}");
    let _ = stderr.flush();
    std::process::abort();
}
