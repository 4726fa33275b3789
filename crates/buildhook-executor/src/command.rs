//! Child process helpers.

use buildhook_core::CommandError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Run `command` to completion, returning combined stdout and stderr.
///
/// A non-zero exit becomes [`CommandError::Failed`] carrying the output.
/// `stdin`, when given, is written to the child and then closed.
pub async fn run(mut command: Command, stdin: Option<&[u8]>) -> Result<String, CommandError> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let spawn_error = |source| CommandError::Spawn {
        program: program.clone(),
        source,
    };

    let mut child = command.spawn().map_err(spawn_error)?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input).await.map_err(spawn_error)?;
        }
    }

    let output = child.wait_with_output().await.map_err(spawn_error)?;
    let combined = combine_output(&output.stdout, &output.stderr);

    if output.status.success() {
        Ok(combined)
    } else {
        Err(CommandError::Failed {
            program,
            code: output.status.code(),
            output: combined,
        })
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (_, true) => stdout.trim_end().to_string(),
        (true, false) => stderr.trim_end().to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
    }
}
