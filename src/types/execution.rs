//! Turn execution report
//!
//! Summarizes one completed user turn for the CLI.

use std::time::Duration;

/// Result of running one user turn to a final answer
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// Chat the turn belongs to
    pub chat_id: String,

    /// The model's final answer
    pub answer: String,

    /// Model calls made
    pub iterations: usize,

    /// Turns appended to the chat (user message included)
    pub new_turns: usize,

    /// Tool calls executed
    pub tool_calls: usize,

    /// Tool calls that returned an error result
    pub failed_tool_calls: usize,

    /// Total time taken
    pub duration: Duration,
}

impl TurnReport {
    /// Get a human-readable summary of the run
    pub fn summary(&self) -> String {
        let failures = if self.failed_tool_calls > 0 {
            format!(", {} failed", self.failed_tool_calls)
        } else {
            String::new()
        };

        format!(
            "Answered in {:.2}s ({} iterations, {} tool calls{})",
            self.duration.as_secs_f64(),
            self.iterations,
            self.tool_calls,
            failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(tool_calls: usize, failed_tool_calls: usize) -> TurnReport {
        TurnReport {
            chat_id: "c".to_string(),
            answer: "done".to_string(),
            iterations: 2,
            new_turns: 4,
            tool_calls,
            failed_tool_calls,
            duration: Duration::from_millis(2500),
        }
    }

    #[test]
    fn test_summary() {
        let summary = report(1, 0).summary();
        assert!(summary.contains("2.50s"));
        assert!(summary.contains("2 iterations"));
        assert!(summary.contains("1 tool calls"));
        assert!(!summary.contains("failed"));
    }

    #[test]
    fn test_summary_with_failures() {
        assert!(report(3, 2).summary().contains("2 failed"));
    }
}
