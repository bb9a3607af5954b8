use crate::types::{AlertPolicy, DurationInSeconds, Severity};

/// Request to page an operator about a stale token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub token_pair: String,
    pub severity: Severity,
    pub message: String,
    pub description: String,
    pub routing: AlertRouting,
}

/// Teams the alert is assigned to and visible to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRouting {
    pub teams: Vec<String>,
    pub visible_to: Vec<String>,
}

impl AlertRequest {
    /// Builds the staleness alert for `token_pair` under the given policy.
    pub fn stale_data(token_pair: &str, max_age: DurationInSeconds, policy: &AlertPolicy) -> Self {
        let message = format!(
            "[{}] The latest data for {} token pair is older than {}.",
            policy.source,
            token_pair,
            format_age(max_age)
        );
        Self {
            token_pair: token_pair.to_string(),
            severity: policy.priority,
            description: message.clone(),
            message,
            routing: AlertRouting {
                teams: vec![policy.team.clone()],
                visible_to: vec![policy.team.clone()],
            },
        }
    }
}

fn format_age(seconds: DurationInSeconds) -> String {
    match seconds {
        s if s % 3600 == 0 && s / 3600 == 1 => "1 hour".to_string(),
        s if s % 3600 == 0 => format!("{} hours", s / 3600),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stale_alert() {
        let alert = AlertRequest::stale_data("ETH/USD", 21_600, &AlertPolicy::default());
        assert_eq!(alert.token_pair, "ETH/USD");
        assert_eq!(alert.severity, Severity::P2);
        assert_eq!(
            alert.message,
            "[Keeper] The latest data for ETH/USD token pair is older than 6 hours."
        );
        assert_eq!(alert.description, alert.message);
        assert_eq!(alert.routing.teams, vec!["Lisk"]);
        assert_eq!(alert.routing.visible_to, vec!["Lisk"]);
    }

    #[test]
    fn test_alert_policy_overrides() {
        let policy = AlertPolicy {
            source: "Tenderly".to_string(),
            team: "Oracles".to_string(),
            priority: Severity::P1,
        };
        let alert = AlertRequest::stale_data("LSK/USD", 90 * 60, &policy);
        assert_eq!(
            alert.message,
            "[Tenderly] The latest data for LSK/USD token pair is older than 90 minutes."
        );
        assert_eq!(alert.severity, Severity::P1);
        assert_eq!(alert.routing.teams, vec!["Oracles"]);
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(3600), "1 hour");
        assert_eq!(format_age(7200), "2 hours");
        assert_eq!(format_age(45), "45 seconds");
    }
}
