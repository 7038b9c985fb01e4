//! Skill-vector loading: the operator's skill terms, embedded once at
//! startup and shared read-only by every scoring worker.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domains::jobs::error::JobError;
use crate::kernel::BaseEmbeddingService;

#[derive(Debug, Deserialize)]
struct SkillFile {
    skills: Vec<String>,
}

pub struct SkillsService {
    embedder: Arc<dyn BaseEmbeddingService>,
    skills_file: String,
}

impl SkillsService {
    pub fn new(embedder: Arc<dyn BaseEmbeddingService>, skills_file: String) -> Self {
        Self {
            embedder,
            skills_file,
        }
    }

    /// Read the YAML skills file and embed the joined terms.
    pub async fn load_skill_vector(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, JobError> {
        info!(file = %self.skills_file, "Loading skills from file");

        let buf = tokio::fs::read_to_string(&self.skills_file)
            .await
            .map_err(|err| JobError::Skills(Box::new(err)))?;

        let skills = parse_skills(&buf)?;
        info!(count = skills.len(), ?skills, "Loaded skills");

        let skills_text = skills.join(" ");

        info!("Generating embedding for skills");
        let vector = self.embedder.embed(&skills_text, cancel).await?;

        info!(dimensions = vector.len(), "Generated skill vector");
        Ok(vector)
    }
}

fn parse_skills(yaml: &str) -> Result<Vec<String>, JobError> {
    let parsed: SkillFile =
        serde_yaml::from_str(yaml).map_err(|err| JobError::Skills(Box::new(err)))?;
    Ok(parsed.skills)
}
