//! Console output formatter for discussion results

use colored::Colorize;
use consensus_domain::{
    ConfigIssue, ConsensusMetrics, Discussion, DiscussionOutcome, DiscussionTranscript,
    NoConsensusReason, OutputFormat, Resolution, StageType, core::string::preview,
};

/// Formats discussion outcomes and stored transcripts for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Turn off ANSI colors for everything formatted afterwards
    pub fn disable_color() {
        colored::control::set_override(false);
    }

    /// Render an outcome in the requested format.
    ///
    /// `transcript` adds the per-stage responses to the full format and is
    /// ignored by the others.
    pub fn format(
        outcome: &DiscussionOutcome,
        transcript: Option<&DiscussionTranscript>,
        prompt: &str,
        format: OutputFormat,
    ) -> String {
        match format {
            OutputFormat::Full => Self::format_full(outcome, transcript, prompt),
            OutputFormat::Consensus => Self::format_consensus_only(outcome, prompt),
            OutputFormat::Json => Self::format_json(outcome),
        }
    }

    /// Every stage with its metrics, then the resolution
    pub fn format_full(
        outcome: &DiscussionOutcome,
        transcript: Option<&DiscussionTranscript>,
        prompt: &str,
    ) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Consensus Discussion"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Prompt:".cyan().bold(), prompt));
        output.push_str(&format!(
            "{} {}\n",
            "Discussion:".cyan().bold(),
            outcome.discussion_id
        ));

        match transcript {
            Some(transcript) => output.push_str(&Self::stages(transcript, &outcome.stage_metrics)),
            None => {
                for metrics in &outcome.stage_metrics {
                    output.push_str(&Self::section_header(&Self::stage_title(metrics.stage)));
                    output.push_str(&Self::metrics_block(metrics));
                }
            }
        }

        output.push_str(&Self::section_header("Resolution"));
        output.push_str(&Self::resolution(outcome));

        if let Resolution::ConsensusReached { evaluations, .. } = &outcome.resolution
            && !evaluations.is_empty()
        {
            output.push_str(&format!("\n{}\n", "Cross-evaluation:".cyan().bold()));
            for (evaluator, row) in evaluations.rows() {
                for (target, score) in row {
                    output.push_str(&format!("  {} -> {}: {:.2}\n", evaluator, target, score));
                }
            }
        }

        output.push_str(&Self::storage_warning(outcome));
        output.push_str(&Self::footer());
        output
    }

    /// Only the consensus, or the reason there is none plus each agent's
    /// final text
    pub fn format_consensus_only(outcome: &DiscussionOutcome, prompt: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n\n", "=== Consensus ===".cyan().bold()));
        output.push_str(&format!("{} {}\n\n", "Q:".bold(), prompt));

        match &outcome.resolution {
            Resolution::ConsensusReached {
                consensus, winner, ..
            } => {
                output.push_str(&format!(
                    "{} {}\n\n",
                    "Selected answer from:".dimmed(),
                    winner
                ));
                output.push_str(consensus);
                output.push('\n');
            }
            Resolution::NoConsensus { reason } => {
                output.push_str(&format!(
                    "{} {}\n",
                    "No consensus:".yellow().bold(),
                    reason
                ));
                for (agent, text) in &outcome.individual_responses {
                    output.push_str(&format!(
                        "\n{}\n{}\n",
                        format!("── {} ──", agent).yellow().bold(),
                        text
                    ));
                }
            }
        }

        output.push_str(&Self::storage_warning(outcome));
        output
    }

    /// Format as JSON
    pub fn format_json(outcome: &DiscussionOutcome) -> String {
        serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string())
    }

    /// A stored discussion, as printed by `show`
    pub fn format_transcript(transcript: &DiscussionTranscript) -> String {
        let discussion = &transcript.discussion;
        let mut output = String::new();

        output.push_str(&Self::header("Stored Discussion"));
        output.push('\n');
        output.push_str(&format!(
            "{} {}\n",
            "Prompt:".cyan().bold(),
            discussion.prompt()
        ));
        output.push_str(&format!("{} {}\n", "Discussion:".cyan().bold(), discussion.id()));
        output.push_str(&format!(
            "{} {}\n",
            "Started:".cyan().bold(),
            discussion.created_at().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!(
            "{} {}\n",
            "Status:".cyan().bold(),
            Self::status_label(transcript.status())
        ));

        output.push_str(&Self::stages(transcript, &[]));

        if let Some(consensus) = discussion.final_consensus() {
            output.push_str(&Self::section_header("Consensus"));
            output.push_str(consensus);
            output.push('\n');
        }

        output.push_str(&Self::footer());
        output
    }

    pub fn format_transcript_json(transcript: &DiscussionTranscript) -> String {
        serde_json::to_string_pretty(transcript).unwrap_or_else(|_| "{}".to_string())
    }

    /// One line per stored discussion, oldest first
    pub fn format_list(discussions: &[Discussion]) -> String {
        if discussions.is_empty() {
            return format!("{}\n", "No stored discussions.".dimmed());
        }

        let mut output = String::new();
        for discussion in discussions {
            let status = match (discussion.is_completed(), discussion.consensus_reached()) {
                (false, _) => "in_progress",
                (true, true) => "consensus_reached",
                (true, false) => "no_consensus",
            };
            output.push_str(&format!(
                "{}  {}  {:<20} {}\n",
                discussion.id().to_string().dimmed(),
                discussion.created_at().format("%Y-%m-%d %H:%M"),
                Self::status_label(status),
                preview(discussion.prompt(), 60)
            ));
        }
        output
    }

    /// Configuration warnings and errors, one per line
    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        issues
            .iter()
            .map(|issue| {
                if issue.is_error() {
                    format!("{} {}\n", "error:".red().bold(), issue.message)
                } else {
                    format!("{} {}\n", "warning:".yellow().bold(), issue.message)
                }
            })
            .collect()
    }

    fn stages(transcript: &DiscussionTranscript, metrics: &[ConsensusMetrics]) -> String {
        let mut output = String::new();
        for entry in &transcript.stages {
            let stage_type = entry.stage.stage_type();
            output.push_str(&Self::section_header(&Self::stage_title(stage_type)));

            if entry.responses.is_empty() {
                output.push_str(&format!("{}\n", "(no responses)".dimmed()));
            }
            for response in &entry.responses {
                output.push_str(&format!(
                    "\n{}\n{}\n",
                    format!(
                        "── {} (confidence {:.2}) ──",
                        response.agent(),
                        response.confidence()
                    )
                    .yellow()
                    .bold(),
                    response.content()
                ));
            }

            match metrics.iter().find(|m| m.stage == stage_type) {
                Some(m) => output.push_str(&Self::metrics_block(m)),
                None if !entry.responses.is_empty() => output.push_str(&format!(
                    "\n{} {:.2}\n",
                    "Average confidence:".dimmed(),
                    entry.average_confidence()
                )),
                None => {}
            }
        }
        output
    }

    fn metrics_block(metrics: &ConsensusMetrics) -> String {
        let verdict = if metrics.passed {
            "passed".green().bold()
        } else {
            "not passed".yellow().bold()
        };
        let mut output = format!(
            "\n{} similarity {:.2}/{:.2}, confidence {:.2}/{:.2}, {} responders -> {}\n",
            "Metrics:".cyan().bold(),
            metrics.similarity,
            metrics.similarity_threshold,
            metrics.average_confidence,
            metrics.required_confidence,
            metrics.responders,
            verdict
        );
        if !metrics.alignment_areas.is_empty() {
            output.push_str(&format!(
                "  {} {}\n",
                "Aligned:".green(),
                metrics.alignments_summary()
            ));
        }
        if !metrics.key_differences.is_empty() {
            output.push_str(&format!(
                "  {} {}\n",
                "Differences:".yellow(),
                metrics.differences_summary()
            ));
        }
        output
    }

    fn resolution(outcome: &DiscussionOutcome) -> String {
        match &outcome.resolution {
            Resolution::ConsensusReached {
                consensus, winner, ..
            } => format!(
                "\n{} (selected answer from {})\n\n{}\n",
                "Consensus reached".green().bold(),
                winner,
                consensus
            ),
            Resolution::NoConsensus { reason } => {
                let mut output = format!("\n{} {}\n", "No consensus:".yellow().bold(), reason);
                if let NoConsensusReason::CodeValidationFailed { issues, .. } = reason {
                    for issue in issues {
                        output.push_str(&format!("  * {}\n", issue));
                    }
                }
                output
            }
        }
    }

    fn storage_warning(outcome: &DiscussionOutcome) -> String {
        if outcome.durable {
            return String::new();
        }
        let mut output = format!(
            "\n{}\n",
            "Warning: the discussion was not fully saved".red().bold()
        );
        for error in &outcome.storage_errors {
            output.push_str(&format!("  * {}\n", error));
        }
        output
    }

    fn status_label(status: &str) -> String {
        match status {
            "consensus_reached" => status.green().to_string(),
            "no_consensus" => status.yellow().to_string(),
            _ => status.dimmed().to_string(),
        }
    }

    fn stage_title(stage: StageType) -> String {
        format!(
            "Stage {}/{}: {}",
            stage.ordinal() + 1,
            StageType::ALL.len(),
            stage.display_name()
        )
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}
