//! Test helpers
//!
//! A fake runtime is a POSIX shell script that understands the three
//! invocations the stages make:
//! - `-m venv <root>` creates `<root>/bin/python` as a copy of itself
//! - `-m pip install -r <manifest>` prints `installed <pkg>` per line
//! - `-u <script>` runs the script with `/bin/sh`

use isorun_core::PipelineConfig;
use std::path::{Path, PathBuf};
use std::process::Command;

const FAKE_RUNTIME: &str = r#"#!/bin/sh
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
    mkdir -p "$3/bin" || exit 1
    cp "$0" "$3/bin/python" || exit 1
    echo "created environment $3"
    exit 0
fi
if [ "$1" = "-m" ] && [ "$2" = "pip" ] && [ "$3" = "install" ] && [ "$4" = "-r" ]; then
    while IFS= read -r pkg || [ -n "$pkg" ]; do
        [ -n "$pkg" ] && echo "installed $pkg"
    done < "$5"
    exit 0
fi
if [ "$1" = "-u" ]; then
    exec /bin/sh "$2"
fi
echo "unsupported invocation: $*" >&2
exit 2
"#;

/// Fake runtime executable placed in a test directory
pub struct FakeRuntime {
    path: PathBuf,
}

impl FakeRuntime {
    /// Writes the fake runtime into `dir`
    ///
    /// The file is written and made executable by a child shell so the test
    /// process never holds a writable handle to something it later executes.
    pub fn install(dir: &Path) -> Self {
        let path = dir.join("fake-python");

        let status = Command::new("/bin/sh")
            .arg("-c")
            .arg("printf '%s' \"$2\" > \"$1\" && chmod 755 \"$1\"")
            .arg("sh")
            .arg(&path)
            .arg(FAKE_RUNTIME)
            .status()
            .expect("failed to run /bin/sh");
        assert!(status.success(), "failed to install fake runtime");

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Configuration using the workspace layout under `<workspace>/runs`
pub fn sample_config(workspace: &Path, runtime: impl AsRef<Path>) -> PipelineConfig {
    PipelineConfig::in_workspace(
        "test-run",
        runtime.as_ref(),
        workspace.join("runs"),
        "echo from script\n",
        "requests\n",
    )
}
