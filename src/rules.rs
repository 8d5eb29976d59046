//! Window rules: `app_id=foo,title=bar,workspace=3,floating=true;...`

use crate::config::parse_bool;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowRule {
    /// Exact app id match.
    pub app_id: Option<String>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub workspace: Option<i64>,
    pub floating: Option<bool>,
}

impl WindowRule {
    pub fn matches(&self, app_id: &str, title: &str) -> bool {
        if self.app_id.is_none() && self.title.is_none() {
            return false;
        }
        if let Some(expected) = &self.app_id
            && expected != app_id
        {
            return false;
        }
        if let Some(expected) = &self.title
            && !matches_ci_contains(title, expected)
        {
            return false;
        }
        true
    }

    /// Target workspace if it lies in `1..=workspace_count`.
    pub fn workspace_in(&self, workspace_count: usize) -> Option<usize> {
        self.workspace
            .and_then(|workspace| usize::try_from(workspace).ok())
            .filter(|workspace| (1..=workspace_count).contains(workspace))
    }
}

pub fn parse_rules(raw: &str) -> Vec<WindowRule> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let rule = parse_rule(entry);
            if rule.app_id.is_none() && rule.title.is_none() {
                tracing::warn!(rule = entry, "Ignoring window rule without app_id or title");
                return None;
            }
            Some(rule)
        })
        .collect()
}

fn parse_rule(entry: &str) -> WindowRule {
    let mut rule = WindowRule::default();

    for field in entry.split(',') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "app_id" => rule.app_id = Some(value.to_owned()).filter(|v| !v.is_empty()),
            "title" => rule.title = Some(value.to_owned()).filter(|v| !v.is_empty()),
            "workspace" => rule.workspace = parse_leading_int(value),
            "floating" => match parse_bool(value) {
                Some(floating) => rule.floating = Some(floating),
                None => tracing::warn!(value, "Ignoring invalid floating value in window rule"),
            },
            other => tracing::debug!(key = other, "unknown window rule key"),
        }
    }

    rule
}

/// First rule matching the view wins.
pub fn first_match<'a>(rules: &'a [WindowRule], app_id: &str, title: &str) -> Option<&'a WindowRule> {
    rules.iter().find(|rule| rule.matches(app_id, title))
}

fn matches_ci_contains(actual: &str, expected: &str) -> bool {
    actual
        .to_ascii_lowercase()
        .contains(&expected.to_ascii_lowercase())
}

/// Leading optionally signed integer, ignoring trailing garbage.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let end = raw
        .char_indices()
        .find(|&(idx, ch)| !(ch.is_ascii_digit() || (idx == 0 && (ch == '-' || ch == '+'))))
        .map_or(raw.len(), |(idx, _)| idx);
    raw[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_rule_fields() {
        let rules = parse_rules(" App_ID = foo , workspace=3, floating=TRUE ; title=Picture;;");
        assert_eq!(
            rules,
            vec![
                WindowRule {
                    app_id: Some("foo".into()),
                    title: None,
                    workspace: Some(3),
                    floating: Some(true),
                },
                WindowRule {
                    app_id: None,
                    title: Some("Picture".into()),
                    workspace: None,
                    floating: None,
                },
            ]
        );
    }

    #[test]
    fn rules_without_filters_are_dropped() {
        assert!(parse_rules("workspace=2,floating=yes").is_empty());
        assert!(parse_rules("app_id=,title=").is_empty());
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = parse_rules("app_id=mpv,workspace=4;title=picture-in,floating=on;app_id=mpv,workspace=9");
        let rule = first_match(&rules, "mpv", "video").unwrap();
        assert_eq!(rule.workspace_in(9), Some(4));

        let rule = first_match(&rules, "firefox", "Picture-in-Picture").unwrap();
        assert_eq!(rule.floating, Some(true));

        assert!(first_match(&rules, "MPV", "video").is_none());
    }

    #[test]
    fn out_of_range_workspace_is_ignored() {
        let rules = parse_rules("app_id=a,workspace=12;app_id=b,workspace=0;app_id=c,workspace=2x");
        assert_eq!(rules[0].workspace_in(9), None);
        assert_eq!(rules[1].workspace_in(9), None);
        assert_eq!(rules[2].workspace_in(9), Some(2));
    }

    #[test]
    fn invalid_floating_leaves_flag_unset() {
        let rules = parse_rules("app_id=foo,floating=maybe");
        assert_eq!(rules[0].floating, None);
    }
}
