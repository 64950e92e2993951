//! Assertion checking for scenario expectations

use super::parser::{ExpectedEvent, StateAssertion};

/// Error when an assertion fails
#[derive(Debug)]
pub struct AssertionError {
    pub message: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for AssertionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\n    Expected: {}\n    Actual: {}",
            self.message, self.expected, self.actual
        )
    }
}

/// Captured recorder event with the script position it happened at
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    /// 1-based count of script actions issued when the event fired
    pub action: u64,
    pub event_type: String,
    pub value: Option<f64>,
}

impl CapturedEvent {
    pub fn new(action: u64, event_type: &str, value: Option<f64>) -> Self {
        Self {
            action,
            event_type: event_type.to_string(),
            value,
        }
    }
}

/// Check if captured events match expected sequence
pub fn check_sequence(
    expected: &[ExpectedEvent],
    captured: &[CapturedEvent],
) -> Result<(), AssertionError> {
    let mut captured_idx = 0;

    for (i, exp) in expected.iter().enumerate() {
        // Find matching event starting from current position
        let found = captured[captured_idx..].iter().enumerate().find(|(_, cap)| {
            if cap.event_type != exp.event {
                return false;
            }
            match (exp.value, cap.value) {
                (Some(want), Some(got)) => (want - got).abs() < 1e-9,
                (Some(_), None) => false,
                _ => true,
            }
        });

        match found {
            Some((offset, cap)) => {
                if let Some(min) = exp.action_min
                    && cap.action < min
                {
                    return Err(AssertionError {
                        message: format!("Event #{} '{}' occurred too early", i + 1, exp.event),
                        expected: format!("action >= {}", min),
                        actual: format!("action {}", cap.action),
                    });
                }
                if let Some(max) = exp.action_max
                    && cap.action > max
                {
                    return Err(AssertionError {
                        message: format!("Event #{} '{}' occurred too late", i + 1, exp.event),
                        expected: format!("action <= {}", max),
                        actual: format!("action {}", cap.action),
                    });
                }
                captured_idx += offset + 1;
            }
            None => {
                let value_str = exp
                    .value
                    .map(|v| format!(" (value: {})", v))
                    .unwrap_or_default();
                return Err(AssertionError {
                    message: format!("Event #{} '{}'{} not found", i + 1, exp.event, value_str),
                    expected: format!("'{}' event in sequence", exp.event),
                    actual: format!(
                        "events after position {}: {:?}",
                        captured_idx,
                        captured[captured_idx..]
                            .iter()
                            .map(|e| &e.event_type)
                            .collect::<Vec<_>>()
                    ),
                });
            }
        }
    }

    Ok(())
}

/// Recorder and engine state visible to assertions
#[derive(Debug, Clone, Default)]
pub struct RecorderState {
    pub log_len: usize,
    pub actions: usize,
    pub cursor: usize,
    pub checkpoints: Vec<usize>,
    pub lives: i32,
    pub total_reward: f64,
    /// Reward returned by the most recent step
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub x: i32,
    pub y: i32,
    pub keys: u32,
    pub replayed: usize,
    pub saved: bool,
}

/// Parse a check string into (path, operator, value)
fn parse_check(check: &str) -> Option<(&str, &str, &str)> {
    // Try operators in order of specificity (>= before >, etc.)
    for op in &[">=", "<=", "!=", "=", ">", "<"] {
        if let Some(idx) = check.find(op) {
            let path = check[..idx].trim();
            let value = check[idx + op.len()..].trim();
            return Some((path, op, value));
        }
    }
    None
}

/// Check state assertions against recorder state
pub fn check_state(assertion: &StateAssertion, state: &RecorderState) -> Result<(), AssertionError> {
    for check in &assertion.checks {
        let (path, operator, expected_value) =
            parse_check(check).ok_or_else(|| AssertionError {
                message: format!("Invalid check syntax: {}", check),
                expected: "format: 'property = value' or 'property > value'".to_string(),
                actual: check.clone(),
            })?;

        match path {
            "log_len" => check_number(path, state.log_len as f64, operator, expected_value)?,
            "actions" => check_number(path, state.actions as f64, operator, expected_value)?,
            "cursor" => check_number(path, state.cursor as f64, operator, expected_value)?,
            "checkpoints" => {
                check_number(path, state.checkpoints.len() as f64, operator, expected_value)?
            }
            "lives" => check_number(path, state.lives as f64, operator, expected_value)?,
            "total_reward" => check_number(path, state.total_reward, operator, expected_value)?,
            "reward" => check_number(path, state.reward, operator, expected_value)?,
            "x" => check_number(path, state.x as f64, operator, expected_value)?,
            "y" => check_number(path, state.y as f64, operator, expected_value)?,
            "keys" => check_number(path, state.keys as f64, operator, expected_value)?,
            "replayed" => check_number(path, state.replayed as f64, operator, expected_value)?,
            "terminated" => check_bool(check, state.terminated, expected_value)?,
            "truncated" => check_bool(check, state.truncated, expected_value)?,
            "saved" => check_bool(check, state.saved, expected_value)?,
            "checkpoint_steps" => {
                let actual = state
                    .checkpoints
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                let expected: String = expected_value
                    .trim_matches(|c| c == '[' || c == ']' || c == '"')
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(",");
                if actual != expected {
                    return Err(AssertionError {
                        message: format!("Check failed: {}", check),
                        expected: format!("[{}]", expected),
                        actual: format!("[{}]", actual),
                    });
                }
            }
            _ => {
                return Err(AssertionError {
                    message: format!("Unknown property '{}'", path),
                    expected: "log_len, actions, cursor, checkpoints, checkpoint_steps, lives, total_reward, reward, x, y, keys, replayed, terminated, truncated, saved".to_string(),
                    actual: path.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn check_bool(check: &str, actual: bool, expected_value: &str) -> Result<(), AssertionError> {
    let expected = expected_value == "true";
    if actual != expected {
        return Err(AssertionError {
            message: format!("Check failed: {}", check),
            expected: expected_value.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Check numeric comparison with operator
fn check_number(
    path: &str,
    actual: f64,
    operator: &str,
    expected_str: &str,
) -> Result<(), AssertionError> {
    let value: f64 = expected_str.trim().parse().map_err(|_| AssertionError {
        message: format!("Invalid value for {}", path),
        expected: "number".to_string(),
        actual: expected_str.to_string(),
    })?;

    let pass = match operator {
        ">=" => actual >= value,
        "<=" => actual <= value,
        ">" => actual > value,
        "<" => actual < value,
        "=" | "==" => (actual - value).abs() < 1e-9,
        "!=" => (actual - value).abs() >= 1e-9,
        _ => true, // Unknown operator, pass by default
    };

    if !pass {
        return Err(AssertionError {
            message: format!(
                "Check failed: {} {} {} (actual: {})",
                path, operator, expected_str, actual
            ),
            expected: format!("{} {} {}", path, operator, value),
            actual: format!("{}", actual),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion(checks: &[&str]) -> StateAssertion {
        StateAssertion {
            after_action: 0,
            after_reload: false,
            checks: checks.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_numeric_and_bool_checks() {
        let state = RecorderState {
            log_len: 4,
            cursor: 1,
            reward: -100.0,
            terminated: true,
            checkpoints: vec![10, 20],
            ..RecorderState::default()
        };
        assert!(check_state(&assertion(&["log_len = 4", "cursor >= 1", "reward < 0"]), &state).is_ok());
        assert!(check_state(&assertion(&["terminated = true", "checkpoint_steps = [10, 20]"]), &state).is_ok());
        assert!(check_state(&assertion(&["cursor = 0"]), &state).is_err());
        assert!(check_state(&assertion(&["checkpoint_steps = 10"]), &state).is_err());
        assert!(check_state(&assertion(&["altitude = 3"]), &state).is_err());
    }

    #[test]
    fn test_sequence_matching() {
        let captured = vec![
            CapturedEvent::new(2, "Reward", Some(100.0)),
            CapturedEvent::new(3, "TimeTravel", Some(-100.0)),
            CapturedEvent::new(4, "Restore", None),
        ];
        let expected = |event: &str, value: Option<f64>, max: Option<u64>| ExpectedEvent {
            event: event.to_string(),
            value,
            action_min: None,
            action_max: max,
        };
        assert!(check_sequence(
            &[expected("Reward", Some(100.0), None), expected("Restore", None, Some(4))],
            &captured
        )
        .is_ok());
        assert!(check_sequence(&[expected("Restore", None, None), expected("Reward", None, None)], &captured).is_err());
        assert!(check_sequence(&[expected("Restore", None, Some(3))], &captured).is_err());
    }
}
