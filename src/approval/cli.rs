//! CLI fallback: the no-backend approval mode.
//!
//! A degenerate but first-class state machine, `CREATED -> RESOLVED` with no
//! network polling: the pending call is printed, one line is read from the
//! terminal, and a non-empty line is the denial comment. Parameterized over
//! reader/writer so the flow is testable without a terminal; the engines pass
//! real stdio.

use std::io::{BufRead, Write};

use serde_json::Value;

use crate::approval::Outcome;

/// Print the pending call and read the approver's line. `Ok(None)` means a
/// bare ENTER, i.e. approval; `Ok(Some(feedback))` is a denial comment.
pub fn prompt_approval<In, Out>(
    mut input: In,
    mut output: Out,
    run_id: &str,
    fn_name: &str,
    kwargs: &Value,
) -> std::io::Result<Option<String>>
where
    In: BufRead,
    Out: Write,
{
    let rendered = serde_json::to_string_pretty(kwargs).unwrap_or_else(|_| kwargs.to_string());
    writeln!(output, "Agent {run_id} wants to call")?;
    writeln!(output)?;
    writeln!(output, "{fn_name}({rendered})")?;
    writeln!(output)?;
    writeln!(
        output,
        "Hit ENTER to proceed, or provide feedback to the agent to deny:"
    )?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        // EOF must not silently approve
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "input closed before an approval decision",
        ));
    }
    let feedback = line.trim();
    Ok((!feedback.is_empty()).then(|| feedback.to_string()))
}

/// The whole CLI approval flow: prompt, then either run the function or
/// report the denial. Never raises past this boundary.
pub fn approve_with_io<In, Out, F, T>(
    input: In,
    output: Out,
    run_id: &str,
    fn_name: &str,
    kwargs: &Value,
    f: F,
) -> Outcome<T>
where
    In: BufRead,
    Out: Write,
    F: FnOnce() -> T,
{
    match prompt_approval(input, output, run_id, fn_name, kwargs) {
        Ok(None) => Outcome::Executed(f()),
        Ok(Some(feedback)) => Outcome::Denied {
            reason: format!("User denied {fn_name} with feedback: {feedback}"),
        },
        Err(e) => Outcome::Failed {
            error: format!("error reading approval input for {fn_name}: {e}"),
        },
    }
}

/// Print the agent's question and read the human's reply verbatim.
pub fn prompt_contact<In, Out>(
    mut input: In,
    mut output: Out,
    run_id: &str,
    message: &str,
) -> std::io::Result<String>
where
    In: BufRead,
    Out: Write,
{
    writeln!(output, "Agent {run_id} requests assistance:")?;
    writeln!(output)?;
    writeln!(output, "{message}")?;
    writeln!(output)?;
    writeln!(output, "Please enter a response:")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "input closed before a response",
        ));
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
