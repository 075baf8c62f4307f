//! Marker tag: the per-environment checkpoint of what was last reported.
//!
//! Once moved, `<environment>-deployment` means "everything up to here has
//! been reported to the tracker". The tagger must therefore only run after a
//! successful report.

use tracing::debug;

use crate::error::SourceResult;
use crate::ports::{RefUpdate, SourceHost};

/// Name and message of an environment's marker tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerTag {
    name: String,
    message: String,
}

impl MarkerTag {
    pub fn for_environment(environment_name: &str) -> Self {
        Self {
            name: format!("{}-deployment", environment_name.to_lowercase()),
            message: format!("Deployment to {environment_name}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Where the marker tag ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPlacement {
    pub tag: String,
    pub commit_sha: String,
    pub tag_object_sha: String,
    pub ref_update: RefUpdate,
}

pub struct MarkerTagger<'a> {
    source: &'a dyn SourceHost,
}

impl<'a> MarkerTagger<'a> {
    pub fn new(source: &'a dyn SourceHost) -> Self {
        Self { source }
    }

    /// Move `tag` to the current head of `branch`.
    ///
    /// Resolves the head, creates a fresh annotated tag object there and then
    /// force-points the tag ref at it. The previous tag object is left alone.
    pub async fn move_to_head(&self, tag: &MarkerTag, branch: &str) -> SourceResult<TagPlacement> {
        let commit_sha = self.source.commit_sha(branch).await?;
        let tag_object_sha = self
            .source
            .create_tag_object(tag.name(), tag.message(), &commit_sha)
            .await?;
        let ref_update = self.source.point_tag_ref(tag.name(), &tag_object_sha).await?;

        debug!(
            tag = %tag.name(),
            commit_sha = %commit_sha,
            ref_update = ?ref_update,
            "marker tag placed"
        );

        Ok(TagPlacement {
            tag: tag.name().to_string(),
            commit_sha,
            tag_object_sha,
            ref_update,
        })
    }
}
