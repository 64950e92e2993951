//! Action scripts for headless sessions
//!
//! A script is a list of tokens separated by commas, semicolons or newlines.
//! Each token names one augmented action and may carry a repeat suffix:
//!
//! ```text
//! # walk to the key
//! DOWN x2, RIGHT x2
//! save
//! t x3, 4
//! ```

use std::fs;
use std::path::Path;

/// Upper bound on a single token's repeat count
const MAX_REPEAT: usize = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionScript {
    actions: Vec<usize>,
}

impl ActionScript {
    pub fn from_actions(actions: Vec<usize>) -> Self {
        Self { actions }
    }

    /// Parse `text` against the augmented action names (engine actions,
    /// then `SAVE`, then `TIME_TRAVEL`).
    pub fn parse(text: &str, meanings: &[&str]) -> Result<Self, String> {
        let mut actions = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            for token in line.split([',', ';']) {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                let (name, repeat) = split_repeat(token)
                    .map_err(|e| format!("Line {}: {}", line_no + 1, e))?;
                let action = resolve(name, meanings)
                    .map_err(|e| format!("Line {}: {}", line_no + 1, e))?;
                actions.extend(std::iter::repeat_n(action, repeat));
            }
        }
        Ok(Self { actions })
    }

    pub fn from_file(path: &Path, meanings: &[&str]) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&text, meanings).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn actions(&self) -> &[usize] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn extend(&mut self, other: &ActionScript) {
        self.actions.extend_from_slice(&other.actions);
    }
}

/// `"RIGHT x5"` or `"RIGHTx5"` -> `("RIGHT", 5)`
fn split_repeat(token: &str) -> Result<(&str, usize), String> {
    let lower = token.to_ascii_lowercase();
    if let Some(pos) = lower.rfind('x') {
        let count = &token[pos + 1..];
        let name = token[..pos].trim_end();
        if !name.is_empty() && !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit()) {
            let n: usize = count
                .parse()
                .map_err(|e| format!("Bad repeat count in '{}': {}", token, e))?;
            if n == 0 || n > MAX_REPEAT {
                return Err(format!(
                    "Repeat count {} in '{}' must be between 1 and {}",
                    n, token, MAX_REPEAT
                ));
            }
            return Ok((name, n));
        }
    }
    Ok((token, 1))
}

fn normalize(name: &str) -> String {
    name.trim().to_uppercase().replace(['_', '-', ' '], "")
}

fn resolve(name: &str, meanings: &[&str]) -> Result<usize, String> {
    if let Ok(index) = name.parse::<usize>() {
        if index < meanings.len() {
            return Ok(index);
        }
        return Err(format!(
            "Action {} is outside the action space of size {}",
            index,
            meanings.len()
        ));
    }

    let wanted = match normalize(name).as_str() {
        "S" => "SAVE".to_string(),
        "T" | "TT" | "BACK" => "TIMETRAVEL".to_string(),
        other => other.to_string(),
    };
    meanings
        .iter()
        .position(|m| normalize(m) == wanted)
        .ok_or_else(|| format!("Unknown action '{}' (known: {})", name, meanings.join(", ")))
}
