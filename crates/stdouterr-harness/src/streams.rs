//! Per-stream contract of the demo binary.
//!
//! Every run must write exactly `stdout\n` to fd 1 and `stderr\n` to fd 2,
//! exit 0, ignore its arguments and environment, and leave no files behind.
//! A stdout that rejects writes must not cost the stderr line or the exit
//! status.

use std::collections::BTreeSet;
use std::path::Path;

use stdouterr_core::StdStream;
use stdouterr_core::demo::text_for;

use crate::capture::{Invocation, StreamCapture, capture_streams, digest_hex};
use crate::error::HarnessError;
use crate::verify::VerificationResult;

const CHECK: &str = "streams";

/// Run `binary` `runs` times plus the argument and environment variants.
///
/// Results are named `run-N`, `ignores-arguments`, `empty-environment`,
/// `broken-stdout`, `repeatable` and `no-files`. Spawn failures abort;
/// contract violations become failed results.
pub fn check_streams(
    binary: &Path,
    runs: usize,
    workdir: &Path,
) -> Result<Vec<VerificationResult>, HarnessError> {
    let scratch = workdir.join("streams");
    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)?;
    }
    std::fs::create_dir_all(&scratch)?;

    let expected = render(&StreamCapture {
        stdout: text_for(StdStream::Output).as_bytes().to_vec(),
        stderr: text_for(StdStream::Error).as_bytes().to_vec(),
        exit_code: Some(0),
    });

    let mut results = Vec::new();
    let mut digests = BTreeSet::new();
    for run in 1..=runs.max(1) {
        let capture = capture_streams(
            binary,
            &Invocation {
                cwd: Some(&scratch),
                ..Invocation::default()
            },
        )?;
        digests.insert(format!(
            "{} {}",
            digest_hex(&capture.stdout),
            digest_hex(&capture.stderr)
        ));
        results.push(VerificationResult::compare(
            &format!("run-{run}"),
            CHECK,
            expected.clone(),
            render(&capture),
        ));
    }

    let with_args = capture_streams(
        binary,
        &Invocation {
            args: &["--help", "-v", "extra"],
            cwd: Some(&scratch),
            ..Invocation::default()
        },
    )?;
    results.push(VerificationResult::compare(
        "ignores-arguments",
        CHECK,
        expected.clone(),
        render(&with_args),
    ));

    let bare = capture_streams(
        binary,
        &Invocation {
            clear_env: true,
            cwd: Some(&scratch),
            ..Invocation::default()
        },
    )?;
    results.push(VerificationResult::compare(
        "empty-environment",
        CHECK,
        expected,
        render(&bare),
    ));

    let broken = capture_streams(
        binary,
        &Invocation {
            broken_stdout: true,
            cwd: Some(&scratch),
            ..Invocation::default()
        },
    )?;
    results.push(VerificationResult::compare(
        "broken-stdout",
        CHECK,
        render(&StreamCapture {
            stdout: Vec::new(),
            stderr: text_for(StdStream::Error).as_bytes().to_vec(),
            exit_code: Some(0),
        }),
        render(&broken),
    ));

    results.push(VerificationResult::compare(
        "repeatable",
        CHECK,
        String::from("distinct outputs: 1"),
        format!("distinct outputs: {}", digests.len()),
    ));

    let mut leftovers: Vec<String> = std::fs::read_dir(&scratch)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    leftovers.sort();
    results.push(VerificationResult::compare(
        "no-files",
        CHECK,
        String::from("files: <none>"),
        if leftovers.is_empty() {
            String::from("files: <none>")
        } else {
            format!("files: {}", leftovers.join(", "))
        },
    ));

    Ok(results)
}

fn render(capture: &StreamCapture) -> String {
    let exit = capture
        .exit_code
        .map_or_else(|| String::from("signal"), |c| c.to_string());
    format!(
        "stdout={:?}\nstderr={:?}\nexit={exit}",
        String::from_utf8_lossy(&capture.stdout),
        String::from_utf8_lossy(&capture.stderr),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_escapes_newlines() {
        let capture = StreamCapture {
            stdout: b"stdout\n".to_vec(),
            stderr: Vec::new(),
            exit_code: Some(0),
        };
        assert_eq!(render(&capture), "stdout=\"stdout\\n\"\nstderr=\"\"\nexit=0");
    }

    #[test]
    fn killed_child_renders_signal() {
        let capture = StreamCapture {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
        };
        assert!(render(&capture).ends_with("exit=signal"));
    }

    #[test]
    fn missing_binary_aborts() {
        let workdir = std::env::temp_dir().join(format!("stdouterr-streams-{}", std::process::id()));
        let err = check_streams(Path::new("/nonexistent/stdouterr"), 2, &workdir).unwrap_err();
        assert!(matches!(err, HarnessError::Io(_)));
        std::fs::remove_dir_all(&workdir).ok();
    }
}
