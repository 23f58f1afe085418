//! Progress reporting for running discussions

use colored::Colorize;
use consensus_application::{ProgressEvent, ProgressSink};
use consensus_domain::{StageType, core::string::preview};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Reports progress with one progress bar per stage
pub struct ProgressReporter {
    multi: MultiProgress,
    stage_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            stage_bar: Mutex::new(None),
        }
    }

    fn stage_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.stage_bar.lock()
            && let Some(bar) = guard.as_ref()
        {
            f(bar);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressReporter {
    fn on_message(&self, message: &str) {
        self.println(message.to_string());
    }

    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted {
                stage,
                participants,
            } => {
                let bar = self.multi.add(ProgressBar::new(*participants as u64));
                bar.set_style(Self::stage_style());
                bar.set_prefix(format!(
                    "Stage {}/{} {}",
                    stage.ordinal() + 1,
                    StageType::ALL.len(),
                    stage.display_name()
                ));
                bar.set_message("waiting for agents...");
                bar.enable_steady_tick(Duration::from_millis(120));
                if let Ok(mut guard) = self.stage_bar.lock()
                    && let Some(previous) = guard.replace(bar)
                {
                    previous.finish_and_clear();
                }
            }
            ProgressEvent::AgentResponded {
                agent, confidence, ..
            } => self.with_bar(|bar| {
                bar.set_message(format!("{} {} ({:.2})", "v".green(), agent, confidence));
                bar.inc(1);
            }),
            ProgressEvent::AgentFailed { agent, error, .. } => {
                self.with_bar(|bar| {
                    bar.set_message(format!("{} {}", "x".red(), agent));
                    bar.inc(1);
                });
                self.println(format!("  {} {} failed: {}", "x".red(), agent, error));
            }
            ProgressEvent::StageCompleted { passed, .. } => {
                let verdict = if *passed {
                    "agreement".green()
                } else {
                    "no agreement yet".yellow()
                };
                if let Ok(mut guard) = self.stage_bar.lock()
                    && let Some(bar) = guard.take()
                {
                    bar.finish_with_message(verdict.to_string());
                }
                self.println(format!("  {}", event));
            }
            ProgressEvent::EvaluationFailed { .. } => {
                self.println(format!("  {} {}", "x".red(), event));
            }
            ProgressEvent::Resolved { .. } => {
                if let Ok(mut guard) = self.stage_bar.lock()
                    && let Some(bar) = guard.take()
                {
                    bar.finish_and_clear();
                }
            }
            _ => self.println(format!("  {}", event)),
        }
    }
}

/// Simple text-based progress (no fancy UI), written to stderr
pub struct SimpleProgress;

impl ProgressSink for SimpleProgress {
    fn on_message(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { .. } => {
                eprintln!("{} {}", "->".cyan(), event.to_string().bold());
            }
            ProgressEvent::AgentResponded {
                agent,
                confidence,
                response,
                ..
            } => eprintln!(
                "  {} {} ({:.2}) {}",
                "v".green(),
                agent,
                confidence,
                preview(response, 60).dimmed()
            ),
            ProgressEvent::AgentFailed { .. } | ProgressEvent::EvaluationFailed { .. } => {
                eprintln!("  {} {}", "x".red(), event);
            }
            _ => eprintln!("  {}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_survives_full_stage_cycle() {
        let reporter = ProgressReporter::new();
        reporter.on_event(&ProgressEvent::StageStarted {
            stage: StageType::Opening,
            participants: 2,
        });
        reporter.on_event(&ProgressEvent::AgentResponded {
            stage: StageType::Opening,
            agent: "alpha".to_string(),
            confidence: 0.7,
            response: "text".to_string(),
        });
        reporter.on_event(&ProgressEvent::AgentFailed {
            stage: StageType::Opening,
            agent: "beta".to_string(),
            error: "Timeout".to_string(),
        });
        reporter.with_bar(|bar| assert_eq!(bar.position(), 2));

        reporter.on_event(&ProgressEvent::StageCompleted {
            stage: StageType::Opening,
            similarity: 1.0,
            average_confidence: 0.7,
            required_confidence: 0.0,
            similarity_threshold: 0.75,
            passed: true,
        });
        assert!(reporter.stage_bar.lock().unwrap().is_none());
    }

    #[test]
    fn test_events_without_open_stage_are_ignored() {
        let reporter = ProgressReporter::new();
        reporter.on_event(&ProgressEvent::AgentResponded {
            stage: StageType::Analysis,
            agent: "alpha".to_string(),
            confidence: 0.5,
            response: "late".to_string(),
        });
        reporter.on_event(&ProgressEvent::Resolved {
            consensus: false,
            summary: "No consensus".to_string(),
        });
        assert!(reporter.stage_bar.lock().unwrap().is_none());
    }
}
