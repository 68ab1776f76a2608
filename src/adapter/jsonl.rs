//! JSON Lines sink: one proposal per line, for downstream CI steps
//!
//! Reads are answered from an in-memory mirror of what was written, so
//! post-ingestion checks work against the same run.

use super::memory::InMemoryCatalogue;
use super::sink::{CatalogueSink, EmitResult, SinkError};
use crate::model::{Aspect, AspectKind, UpsertProposal};
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
    mirror: InMemoryCatalogue,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            mirror: InMemoryCatalogue::new(),
        }
    }

    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Answer reads from `mirror` instead of an empty catalogue, e.g. a
    /// replayed log of earlier runs.
    pub fn with_mirror(mut self, mirror: InMemoryCatalogue) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn mirror(&self) -> &InMemoryCatalogue {
        &self.mirror
    }
}

#[async_trait]
impl CatalogueSink for JsonLinesSink {
    async fn emit(&self, proposals: Vec<UpsertProposal>) -> Result<EmitResult, SinkError> {
        {
            let mut writer = self
                .writer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for proposal in &proposals {
                serde_json::to_writer(&mut *writer, proposal)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        self.mirror.emit(proposals).await
    }

    async fn get_related_entities(
        &self,
        urn: &str,
        relationship: &str,
    ) -> Result<Vec<String>, SinkError> {
        self.mirror.get_related_entities(urn, relationship).await
    }

    async fn get_latest_value(
        &self,
        urn: &str,
        kind: AspectKind,
    ) -> Result<Option<Aspect>, SinkError> {
        self.mirror.get_latest_value(urn, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_one_line_per_proposal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proposals.jsonl");
        let sink = JsonLinesSink::create(&path).unwrap();

        let proposals = vec![
            UpsertProposal::new("urn:li:tag:Prison", Aspect::TagDefinition {
                name: "Prison".into(),
                description: None,
            }),
            UpsertProposal::new("urn:li:dataset:x", Aspect::Containment {
                container: "urn:li:container:y".into(),
            }),
        ];
        let result = sink.emit(proposals.clone()).await.unwrap();
        assert_eq!(result.committed, 2);

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: UpsertProposal = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, proposals[0]);

        let related = sink
            .get_related_entities("urn:li:dataset:x", crate::adapter::IS_PART_OF)
            .await
            .unwrap();
        assert_eq!(related, vec!["urn:li:container:y".to_string()]);
    }

    #[tokio::test]
    async fn reads_see_the_seeded_mirror_and_new_writes() {
        let dir = tempfile::tempdir().unwrap();
        let earlier = dir.path().join("earlier.jsonl");
        let line = serde_json::to_string(&UpsertProposal::new(
            "urn:li:container:c",
            Aspect::TagSet {
                tags: vec!["urn:li:tag:Prison".into()],
            },
        ))
        .unwrap();
        std::fs::write(&earlier, format!("{}\n", line)).unwrap();

        let sink = JsonLinesSink::create(&dir.path().join("now.jsonl"))
            .unwrap()
            .with_mirror(InMemoryCatalogue::load_jsonl(&earlier).unwrap());
        assert!(sink
            .get_latest_value("urn:li:container:c", AspectKind::TagSet)
            .await
            .unwrap()
            .is_some());

        sink.emit(vec![UpsertProposal::new("urn:li:dataset:x", Aspect::Containment {
            container: "urn:li:container:c".into(),
        })])
        .await
        .unwrap();
        assert_eq!(sink.mirror().proposals().len(), 2);
    }
}
