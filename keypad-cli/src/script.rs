use anyhow::{bail, Context, Result};
use keypad_core::keymap;
use keypad_core::keypad::RELEASED;

/// Parse a key timeline into scan frames.
///
/// Each non-empty line is one scan of the keypad and lists the keys held
/// during it, separated by whitespace. `-` means nothing is held. A leading
/// `Nx` repeats the line N times. `;` starts a comment.
///
/// ```text
/// -          ; nothing held
/// 3x 5       ; '5' held for three scans
/// 1 #        ; '1' and '#' together
/// ```
pub fn parse_script(input: &str) -> Result<Vec<u16>> {
    let mut frames = Vec::new();

    for (line_num, line) in input.lines().enumerate() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace().peekable();
        let mut repeat = 1usize;
        if let Some(count) = tokens.peek().copied().and_then(|token| token.strip_suffix('x')) {
            repeat = count
                .parse()
                .with_context(|| format!("line {}: invalid repeat count {:?}", line_num + 1, count))?;
            if repeat == 0 {
                bail!("line {}: repeat count must be at least 1", line_num + 1);
            }
            tokens.next();
        }

        let mut frame = RELEASED;
        let mut any = false;
        for token in tokens {
            any = true;
            if token == "-" {
                continue;
            }
            let mut chars = token.chars();
            let mask = match (chars.next(), chars.next()) {
                (Some(label), None) => keymap::mask_for(label),
                _ => None,
            };
            match mask {
                Some(mask) => frame &= mask,
                None => bail!("line {}: unknown key {:?}", line_num + 1, token),
            }
        }
        if !any {
            bail!("line {}: no keys listed (use '-' for none)", line_num + 1);
        }

        frames.extend(std::iter::repeat(frame).take(repeat));
    }

    if frames.is_empty() {
        bail!("script has no frames");
    }
    Ok(frames)
}

fn strip_comment(line: &str) -> &str {
    line.split_once(';').map_or(line, |(code, _)| code)
}
