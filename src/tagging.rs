use crate::config::TagConfig;
use crate::domain::Version;
use crate::error::Result;
use crate::git::{RemoteAuth, Repository};

/// Result of the tag stage
#[derive(Debug, Clone, PartialEq)]
pub struct TagOutcome {
    pub tag: String,
    pub created: bool,
    pub pushed: bool,
}

/// Fill `{version}` and `{tag}` in a message template.
pub fn render_message(template: &str, version: &Version, tag: &str) -> String {
    template
        .replace("{version}", &version.to_string())
        .replace("{tag}", tag)
}

/// Creates the annotated release tag and pushes it.
pub struct TagPublisher<'a, R: Repository + ?Sized> {
    repo: &'a R,
    config: &'a TagConfig,
    remote: &'a str,
}

impl<'a, R: Repository + ?Sized> TagPublisher<'a, R> {
    pub fn new(repo: &'a R, config: &'a TagConfig, remote: &'a str) -> Self {
        TagPublisher {
            repo,
            config,
            remote,
        }
    }

    /// Nothing happens on a dry run.
    pub fn publish(
        &self,
        tag: &str,
        version: &Version,
        dry_run: bool,
        auth: &RemoteAuth,
    ) -> Result<TagOutcome> {
        if dry_run {
            return Ok(TagOutcome {
                tag: tag.to_string(),
                created: false,
                pushed: false,
            });
        }

        let message = render_message(&self.config.message, version, tag);
        let oid = self.repo.create_annotated_tag(tag, &message)?;
        tracing::info!(tag = %tag, oid = %oid, "created tag");

        let refspec = format!("refs/tags/{}:refs/tags/{}", tag, tag);
        self.repo.push(self.remote, &[refspec], auth)?;
        tracing::info!(tag = %tag, remote = %self.remote, "pushed tag");

        Ok(TagOutcome {
            tag: tag.to_string(),
            created: true,
            pushed: true,
        })
    }
}
