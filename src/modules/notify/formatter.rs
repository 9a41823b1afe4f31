use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::StatusTier;

use super::state::StatusChange;
use super::{Message, Severity};

const TIER_ORDER: [StatusTier; 4] = [
    StatusTier::Empty,
    StatusTier::Critical,
    StatusTier::Warning,
    StatusTier::Healthy,
];

/// Renders change events into a single notification message.
///
/// Changes are grouped by account first, then by tier in fixed
/// severity order (EMPTY, CRITICAL, WARNING, HEALTHY). Steady-state
/// transitions carry a delta annotation; first-observation summaries
/// omit deltas entirely.
#[derive(Debug, Default)]
pub struct MessageFormatter;

impl MessageFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format_changes(&self, changes: &[StatusChange]) -> Message {
        if changes.is_empty() {
            return Message::default();
        }

        let severity = changes
            .iter()
            .map(|c| tier_severity(c.new_tier))
            .max_by_key(|s| severity_rank(*s))
            .unwrap_or(Severity::Info);

        let is_initial = changes.iter().any(StatusChange::is_initial);

        let title = if is_initial {
            "[quotawatch] Initial Quota Summary".to_string()
        } else if changes.len() == 1 {
            format!(
                "[quotawatch] {}: {}",
                changes[0].display_name, changes[0].new_tier
            )
        } else {
            "[quotawatch] Status Update".to_string()
        };

        // BTreeMap keeps accounts in a stable lexicographic order.
        let mut by_account: BTreeMap<&str, Vec<&StatusChange>> = BTreeMap::new();
        for change in changes {
            by_account.entry(&change.account).or_default().push(change);
        }

        let mut body = String::new();
        for (account, account_changes) in &by_account {
            if by_account.len() > 1 {
                body.push_str(&format!("*{}*\n", account));
            }

            for tier in TIER_ORDER {
                let rows: Vec<&&StatusChange> = account_changes
                    .iter()
                    .filter(|c| c.new_tier == tier)
                    .collect();
                if rows.is_empty() {
                    continue;
                }

                body.push_str(tier_header(tier));
                body.push('\n');
                for change in rows {
                    body.push_str(&self.format_row(change));
                    body.push('\n');
                }
            }

            if by_account.len() == 1 {
                body.push_str(&format!("  └ Account: {}\n", account));
            }
            body.push('\n');
        }

        Message {
            title,
            body: body.trim().to_string(),
            severity: Some(severity),
        }
    }

    fn format_row(&self, change: &StatusChange) -> String {
        let mut line = format!("• {}: {}%", change.display_name, change.new_percentage);

        // Deltas only make sense against a previous tier.
        if change.old_tier.is_some() {
            let delta = change.new_percentage - change.old_percentage;
            if delta != 0 {
                let arrow = if delta < 0 { "↓" } else { "↑" };
                line.push_str(&format!(
                    " ({}% {} {}% ({}{}%))",
                    change.old_percentage,
                    arrow,
                    change.new_percentage,
                    arrow,
                    delta.abs()
                ));
            }
        }

        if matches!(change.new_tier, StatusTier::Empty | StatusTier::Critical) {
            if let Some(reset) = change.reset_time {
                let remaining = reset.signed_duration_since(Utc::now());
                if remaining > chrono::Duration::zero() {
                    line.push_str(&format!(" - Reset in {}", format_time_remaining(remaining)));
                }
            }
        }

        line
    }
}

fn tier_severity(tier: StatusTier) -> Severity {
    match tier {
        StatusTier::Empty | StatusTier::Critical => Severity::Critical,
        StatusTier::Warning => Severity::Warning,
        StatusTier::Healthy => Severity::Recovery,
    }
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Info => 0,
        Severity::Recovery => 1,
        Severity::Warning => 2,
        Severity::Critical => 3,
    }
}

fn tier_header(tier: StatusTier) -> &'static str {
    match tier {
        StatusTier::Empty => "🚫 *EMPTY*",
        StatusTier::Critical => "🔴 *CRITICAL*",
        StatusTier::Warning => "⚠️ *WARNING*",
        StatusTier::Healthy => "✅ *HEALTHY*",
    }
}

/// Human-readable remainder, rounded to the minute ("2h 15m", "45m").
pub fn format_time_remaining(remaining: chrono::Duration) -> String {
    let total_minutes = (remaining.num_seconds() as f64 / 60.0).round() as i64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn change(
        account: &str,
        model: &str,
        old_tier: Option<StatusTier>,
        new_tier: StatusTier,
        old_pct: i32,
        new_pct: i32,
    ) -> StatusChange {
        StatusChange {
            account: account.to_string(),
            display_name: model.to_string(),
            old_tier,
            new_tier,
            old_percentage: old_pct,
            new_percentage: new_pct,
            reset_time: None,
        }
    }

    #[test]
    fn empty_changes_produce_empty_message() {
        let msg = MessageFormatter::new().format_changes(&[]);
        assert!(msg.is_empty());
        assert!(msg.severity.is_none());
    }

    #[test]
    fn single_transition_title_names_model_and_tier() {
        let msg = MessageFormatter::new().format_changes(&[change(
            "a@x.com",
            "Gemini Pro",
            Some(StatusTier::Healthy),
            StatusTier::Warning,
            100,
            40,
        )]);

        assert_eq!(msg.title, "[quotawatch] Gemini Pro: WARNING");
        assert_eq!(msg.severity, Some(Severity::Warning));
        assert!(msg.body.contains("⚠️ *WARNING*"));
        assert!(msg.body.contains("• Gemini Pro: 40% (100% ↓ 40% (↓60%))"));
        assert!(msg.body.contains("└ Account: a@x.com"));
    }

    #[test]
    fn initial_summary_has_no_deltas() {
        let msg = MessageFormatter::new().format_changes(&[
            change("a@x.com", "Gemini Pro", None, StatusTier::Healthy, 0, 100),
            change("a@x.com", "Gemini Flash", None, StatusTier::Critical, 0, 15),
        ]);

        assert_eq!(msg.title, "[quotawatch] Initial Quota Summary");
        assert!(!msg.body.contains('↑'));
        assert!(!msg.body.contains('↓'));
        assert!(msg.body.contains("• Gemini Pro: 100%"));
        assert!(msg.body.contains("• Gemini Flash: 15%"));
    }

    #[test]
    fn tiers_render_in_severity_order() {
        let msg = MessageFormatter::new().format_changes(&[
            change(
                "a@x.com",
                "A",
                Some(StatusTier::Warning),
                StatusTier::Healthy,
                40,
                90,
            ),
            change(
                "a@x.com",
                "B",
                Some(StatusTier::Critical),
                StatusTier::Empty,
                10,
                0,
            ),
            change(
                "a@x.com",
                "C",
                Some(StatusTier::Healthy),
                StatusTier::Warning,
                80,
                30,
            ),
        ]);

        let empty_at = msg.body.find("*EMPTY*").expect("empty header");
        let warning_at = msg.body.find("*WARNING*").expect("warning header");
        let healthy_at = msg.body.find("*HEALTHY*").expect("healthy header");
        assert!(empty_at < warning_at);
        assert!(warning_at < healthy_at);
        assert_eq!(msg.severity, Some(Severity::Critical));
    }

    #[test]
    fn multiple_accounts_get_account_headers_in_order() {
        let msg = MessageFormatter::new().format_changes(&[
            change(
                "b@x.com",
                "A",
                Some(StatusTier::Healthy),
                StatusTier::Warning,
                80,
                30,
            ),
            change(
                "a@x.com",
                "A",
                Some(StatusTier::Healthy),
                StatusTier::Warning,
                90,
                45,
            ),
        ]);

        assert_eq!(msg.title, "[quotawatch] Status Update");
        let a_at = msg.body.find("*a@x.com*").expect("a header");
        let b_at = msg.body.find("*b@x.com*").expect("b header");
        assert!(a_at < b_at);
    }

    #[test]
    fn zero_delta_transition_omits_annotation() {
        // An exhausted flag can flip the tier while the percentage holds.
        let msg = MessageFormatter::new().format_changes(&[change(
            "a@x.com",
            "A",
            Some(StatusTier::Critical),
            StatusTier::Empty,
            10,
            10,
        )]);
        assert!(msg.body.contains("• A: 10%"));
        assert!(!msg.body.contains('↓'));
    }

    #[test]
    fn reset_time_rendered_for_critical_rows() {
        let mut c = change(
            "a@x.com",
            "A",
            Some(StatusTier::Warning),
            StatusTier::Critical,
            40,
            10,
        );
        c.reset_time = Some(Utc::now() + Duration::minutes(95));

        let msg = MessageFormatter::new().format_changes(&[c]);
        assert!(msg.body.contains("Reset in 1h"));
    }

    #[test]
    fn past_reset_time_is_omitted() {
        let mut c = change(
            "a@x.com",
            "A",
            Some(StatusTier::Warning),
            StatusTier::Critical,
            40,
            10,
        );
        c.reset_time = Some(Utc::now() - Duration::minutes(5));

        let msg = MessageFormatter::new().format_changes(&[c]);
        assert!(!msg.body.contains("Reset in"));
    }

    #[test]
    fn time_remaining_formats() {
        assert_eq!(format_time_remaining(Duration::minutes(135)), "2h 15m");
        assert_eq!(format_time_remaining(Duration::minutes(45)), "45m");
        assert_eq!(format_time_remaining(Duration::seconds(90)), "2m");
    }
}
