//! `avatar` - links to a member's avatar in several image formats.

use super::{
    Caller, Command, CommandError, CommandModule, Invocation, MEMBER_NOT_FOUND, ModuleSettings,
    resolve_member,
};
use crate::error::ModuleError;
use async_trait::async_trait;
use std::sync::Arc;
use tuffy_proto::{Embed, Reply};

const DEFAULT_CDN: &str = "https://cdn.discordapp.com";
const DEFAULT_FORMATS: [&str; 3] = ["png", "jpg", "webp"];
const KNOWN_FORMATS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

pub struct ProfileModule {
    avatar: Arc<AvatarCommand>,
}

impl ProfileModule {
    pub fn build(settings: &ModuleSettings) -> Result<Box<dyn CommandModule>, ModuleError> {
        let cdn = settings
            .str("cdn")?
            .unwrap_or(DEFAULT_CDN)
            .trim_end_matches('/')
            .to_string();
        let formats = settings
            .str_list("formats")?
            .unwrap_or_else(|| DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect());
        if formats.is_empty() {
            return Err(ModuleError::new("formats must list at least one format"));
        }
        if let Some(bad) = formats.iter().find(|f| !KNOWN_FORMATS.contains(&f.as_str())) {
            return Err(ModuleError::new(format!("unsupported image format '{bad}'")));
        }
        Ok(Box::new(Self {
            avatar: Arc::new(AvatarCommand { cdn, formats }),
        }))
    }
}

#[async_trait]
impl CommandModule for ProfileModule {
    fn name(&self) -> &str {
        "profile"
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![self.avatar.clone()]
    }
}

struct AvatarCommand {
    cdn: String,
    formats: Vec<String>,
}

impl AvatarCommand {
    fn url(&self, member: &Caller, format: &str) -> Result<String, String> {
        match &member.avatar {
            Some(hash) if format == "gif" && !hash.starts_with("a_") => {
                Err("avatar is not animated".to_string())
            }
            Some(hash) => Ok(format!("{}/avatars/{}/{hash}.{format}", self.cdn, member.id)),
            None if format == "png" => {
                Ok(format!("{}/embed/avatars/{}.png", self.cdn, member.id % 6))
            }
            None => Err("default avatars are only available as PNG".to_string()),
        }
    }
}

#[async_trait]
impl Command for AvatarCommand {
    fn name(&self) -> &str {
        "avatar"
    }

    fn description(&self) -> &str {
        "Gets the avatar of a user in various formats."
    }

    async fn invoke(&self, ctx: &Invocation, args: &str) -> Result<Reply, CommandError> {
        let Some(member) = resolve_member(ctx, args) else {
            return Ok(Reply::text(MEMBER_NOT_FOUND));
        };

        let mut image = None;
        let mut lines = Vec::with_capacity(self.formats.len());
        for format in &self.formats {
            let label = format.to_ascii_uppercase();
            match self.url(member, format) {
                Ok(url) => {
                    lines.push(format!("[{label}]({url})"));
                    image.get_or_insert(url);
                }
                Err(e) => lines.push(format!("{label}: Error getting format - {e}")),
            }
        }

        let mut embed =
            Embed::new(format!("{}'s Avatar", member.display_name)).description(lines.join("\n"));
        if let Some(url) = image {
            embed = embed.image(url);
        }
        Ok(embed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> AvatarCommand {
        AvatarCommand {
            cdn: "https://cdn.test".to_string(),
            formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn custom_avatar_lists_every_format() {
        let mut caller = Caller::guest(42);
        caller.avatar = Some("abc".to_string());
        let reply = command().invoke(&Invocation::new(caller), "").await.unwrap();
        let lines = reply.to_lines();
        assert_eq!(lines[0], "== Guest 42's Avatar ==");
        assert_eq!(lines[1], "[PNG](https://cdn.test/avatars/42/abc.png)");
        assert_eq!(lines[3], "[WEBP](https://cdn.test/avatars/42/abc.webp)");
        assert_eq!(lines[4], "image: https://cdn.test/avatars/42/abc.png");
    }

    #[tokio::test]
    async fn default_avatar_reports_unavailable_formats() {
        let reply = command()
            .invoke(&Invocation::new(Caller::guest(8)), "")
            .await
            .unwrap();
        let lines = reply.to_lines();
        assert_eq!(lines[1], "[PNG](https://cdn.test/embed/avatars/2.png)");
        assert!(lines[2].starts_with("JPG: Error getting format"));
    }

    #[tokio::test]
    async fn unknown_member() {
        let reply = command()
            .invoke(&Invocation::new(Caller::guest(1)), "@someone")
            .await
            .unwrap();
        assert_eq!(reply, Reply::text(MEMBER_NOT_FOUND));
    }

    #[test]
    fn rejects_unknown_formats() {
        let settings =
            ModuleSettings::new("cogs.avatar", toml::from_str("formats = ['bmp']").unwrap());
        assert!(ProfileModule::build(&settings).is_err());
    }
}
