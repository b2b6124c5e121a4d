//! Runner command rewriting and platform shell construction.

use tokio::process::Command;

/// Main class of the stock Karate command-line runner.
pub const KARATE_MAIN: &str = "com.intuit.karate.Main";

/// Main class of the persistent test-server runner.
pub const TEST_SERVER_MAIN: &str = "vscode.KarateTestProcess";

/// Stderr text printed when the runner classpath is misconfigured.
pub const CRASH_SIGNATURE: &str = "java.lang.ClassNotFoundException: com.intuit.karate.Main";

const KEEP_DEBUG_SERVER: &str = "--keep-debug-server";

/// Rewrite a runner command for the configured execution mode.
///
/// With the persistent test server enabled the stock main class is swapped
/// for the test-server main class. Without it, debug runs drop the flag that
/// would keep the debug server alive after the run.
///
/// # Examples
///
/// ```
/// use karate_ide_server::supervisor::prepare_command;
///
/// let command = "java -cp x com.intuit.karate.Main -d --keep-debug-server";
/// assert_eq!(
///     prepare_command(command, true, false),
///     "java -cp x vscode.KarateTestProcess -d --keep-debug-server"
/// );
/// assert_eq!(
///     prepare_command(command, false, true),
///     "java -cp x com.intuit.karate.Main -d "
/// );
/// ```
#[must_use]
pub fn prepare_command(command: &str, use_test_server: bool, is_debug: bool) -> String {
    if use_test_server {
        return command.replacen(KARATE_MAIN, TEST_SERVER_MAIN, 1);
    }
    if is_debug {
        return command.replacen(KEEP_DEBUG_SERVER, "", 1);
    }
    command.to_owned()
}

/// The request path a persistent test server expects for `command`.
///
/// This is everything after the test-server main class marker, or `None`
/// when the command does not target a test server.
#[must_use]
pub fn trigger_path(command: &str) -> Option<&str> {
    command
        .split_once(TEST_SERVER_MAIN)
        .map(|(_, rest)| rest)
}

/// Wrap `command` in the platform shell.
pub(super) fn shell(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}
