//! Replay script parsing
//!
//! One command per line, `#` starts a comment.

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Capture the surface, optionally with an action label
    Push(Option<String>),
    Undo,
    Redo,
    /// Paint the whole surface one RGBA color
    Fill([u8; 4]),
    /// Invert RGB, keep alpha
    Invert,
    /// Make surface reads fail, as a cross-origin draw would
    Block,
    Unblock,
    MaxEntries(usize),
    Clear,
}

/// A parsed step with the 1-based line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub step: Step,
}

pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>> {
    let mut steps = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        let step = parse_step(text).with_context(|| format!("line {line}: {text:?}"))?;
        steps.push(ScriptLine { line, step });
    }
    Ok(steps)
}

fn parse_step(text: &str) -> Result<Step> {
    let (command, rest) = match text.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (text, ""),
    };

    let step = match command {
        "push" => Step::Push((!rest.is_empty()).then(|| rest.to_string())),
        "undo" => no_args(Step::Undo, rest)?,
        "redo" => no_args(Step::Redo, rest)?,
        "invert" => no_args(Step::Invert, rest)?,
        "block" => no_args(Step::Block, rest)?,
        "unblock" => no_args(Step::Unblock, rest)?,
        "clear" => no_args(Step::Clear, rest)?,
        "fill" => Step::Fill(parse_rgba(rest)?),
        "max-entries" => Step::MaxEntries(
            rest.parse()
                .with_context(|| format!("expected an entry count, got {rest:?}"))?,
        ),
        other => bail!("unknown command {other:?}"),
    };
    Ok(step)
}

fn no_args(step: Step, rest: &str) -> Result<Step> {
    if !rest.is_empty() {
        bail!("unexpected arguments {rest:?}");
    }
    Ok(step)
}

fn parse_rgba(rest: &str) -> Result<[u8; 4]> {
    let channels = rest
        .split_whitespace()
        .map(|part| {
            part.parse::<u8>()
                .with_context(|| format!("invalid color channel {part:?}"))
        })
        .collect::<Result<Vec<_>>>()?;

    match channels.as_slice() {
        &[r, g, b, a] => Ok([r, g, b, a]),
        _ => bail!("fill takes 4 channels (R G B A), got {}", channels.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_comments_and_blank_lines() {
        let script = "\
# warm up
push initial
fill 255 0 0 255   # red
push

undo
redo
invert
block
unblock
max-entries 3
clear
";
        let steps: Vec<Step> = parse_script(script).unwrap().into_iter().map(|l| l.step).collect();
        assert_eq!(
            steps,
            vec![
                Step::Push(Some("initial".to_string())),
                Step::Fill([255, 0, 0, 255]),
                Step::Push(None),
                Step::Undo,
                Step::Redo,
                Step::Invert,
                Step::Block,
                Step::Unblock,
                Step::MaxEntries(3),
                Step::Clear,
            ]
        );
    }

    #[test]
    fn keeps_line_numbers() {
        let lines = parse_script("\n\npush\n# note\nundo\n").unwrap();
        assert_eq!(lines[0].line, 3);
        assert_eq!(lines[1].line, 5);
    }

    #[test]
    fn push_label_keeps_inner_spaces() {
        let lines = parse_script("push  adjust levels ").unwrap();
        assert_eq!(lines[0].step, Step::Push(Some("adjust levels".to_string())));
    }

    #[test]
    fn rejects_bad_lines() {
        let err = parse_script("push\nrotate 90\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));

        assert!(parse_script("fill 1 2 3").is_err());
        assert!(parse_script("fill 1 2 3 300").is_err());
        assert!(parse_script("undo now").is_err());
        assert!(parse_script("max-entries many").is_err());
    }
}
