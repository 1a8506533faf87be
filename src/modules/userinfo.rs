//! `userinfo` - renders a member's profile attributes.

use super::{
    Caller, Command, CommandError, CommandModule, Invocation, MEMBER_NOT_FOUND, ModuleSettings,
    resolve_member,
};
use crate::error::ModuleError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use tuffy_proto::{Embed, Reply};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
const ROLES_LIMIT: usize = 1000;

pub struct UserInfoModule {
    userinfo: Arc<UserInfoCommand>,
}

impl UserInfoModule {
    pub fn build(_settings: &ModuleSettings) -> Result<Box<dyn CommandModule>, ModuleError> {
        Ok(Box::new(Self {
            userinfo: Arc::new(UserInfoCommand),
        }))
    }
}

#[async_trait]
impl CommandModule for UserInfoModule {
    fn name(&self) -> &str {
        "userinfo"
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![self.userinfo.clone()]
    }

    async fn setup(&self) -> Result<(), ModuleError> {
        info!("UserInfo module has been loaded");
        Ok(())
    }
}

struct UserInfoCommand;

/// "N years, M months", counted in 365- and 30-day blocks.
fn account_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - created).num_days().max(0);
    format!("{} years, {} months", days / 365, (days % 365) / 30)
}

fn roles_line(roles: &[String]) -> String {
    if roles.is_empty() {
        return "None".to_string();
    }
    let joined = roles.join(", ");
    if joined.chars().count() > ROLES_LIMIT {
        let cut: String = joined.chars().take(ROLES_LIMIT - 3).collect();
        format!("{cut}...")
    } else {
        joined
    }
}

fn render(member: &Caller, now: DateTime<Utc>) -> Embed {
    let avatar_type = match &member.avatar {
        Some(hash) if hash.starts_with("a_") => "GIF",
        _ => "Static",
    };
    let joined = member
        .joined_at
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut embed = Embed::new(&member.display_name)
        .description(format!("({}) - ID: {}", member.name, member.id))
        .field(
            "Account Created",
            format!(
                "{} ({} ago)",
                member.created_at.format(TIME_FORMAT),
                account_age(member.created_at, now)
            ),
        )
        .field("Avatar Type", avatar_type)
        .field("Joined Server", joined);
    if member.display_name != member.name {
        embed = embed.field("Nickname", &member.display_name);
    }
    embed.field(format!("Roles ({})", member.roles.len()), roles_line(&member.roles))
}

#[async_trait]
impl Command for UserInfoCommand {
    fn name(&self) -> &str {
        "userinfo"
    }

    fn description(&self) -> &str {
        "Displays detailed information about a user."
    }

    async fn invoke(&self, ctx: &Invocation, args: &str) -> Result<Reply, CommandError> {
        match resolve_member(ctx, args) {
            Some(member) => Ok(render(member, Utc::now()).into()),
            None => Ok(Reply::text(MEMBER_NOT_FOUND)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn account_age_in_years_and_months() {
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2022, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(account_age(created, now), "2 years, 2 months");
    }

    #[test]
    fn long_role_lists_are_truncated() {
        let roles: Vec<String> = (0..400).map(|i| format!("role{i}")).collect();
        let line = roles_line(&roles);
        assert_eq!(line.chars().count(), ROLES_LIMIT);
        assert!(line.ends_with("..."));
        assert_eq!(roles_line(&[]), "None");
    }

    #[test]
    fn render_fields() {
        let mut member = Caller::guest(5);
        member.created_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        member.joined_at = None;
        member.roles = vec!["mod".to_string(), "dev".to_string()];
        let lines = Reply::from(render(&member, member.created_at)).to_lines();
        assert_eq!(
            lines,
            vec![
                "== Guest 5 ==",
                "(guest5) - ID: 5",
                "Account Created: 2024-06-01 12:00:00 UTC (0 years, 0 months ago)",
                "Avatar Type: Static",
                "Joined Server: N/A",
                "Nickname: Guest 5",
                "Roles (2): mod, dev",
            ]
        );
    }
}
