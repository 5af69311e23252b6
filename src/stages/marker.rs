use async_trait::async_trait;

use super::{StageContext, StageWorker};
use crate::errors::StageError;
use crate::orchestrator::Stage;
use crate::signals::SignalStore;

/// Built-in worker that records stage completion without doing any generation.
///
/// The planner consumes pending work items and lists them in its completion
/// signal; developer and auditor simply write their signals.
pub struct MarkerWorker {
    stage: Stage,
}

impl MarkerWorker {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }

    fn run(&self, ctx: &StageContext) -> anyhow::Result<()> {
        let mut body = match self.stage {
            Stage::Planning => self.plan(ctx)?,
            Stage::Developing => {
                "All tasks have been implemented according to plan.\n".to_string()
            }
            Stage::Auditing => {
                "All implementation has been verified and meets quality standards.\n".to_string()
            }
        };

        match &ctx.rules_file {
            Some(path) => body.push_str(&format!("\nFollowing rules: {}\n", path.display())),
            None => body.push_str("\nFollowing rules: none\n"),
        }
        if let Some(description) = &ctx.description_file {
            body.push_str(&format!("Description: {}\n", description.display()));
        }

        let path = ctx.store.write_signal(self.stage.completion_signal(), &body)?;
        tracing::info!(signal = %self.stage.completion_signal(), path = %path.display(), "Signal written");
        Ok(())
    }

    fn plan(&self, ctx: &StageContext) -> anyhow::Result<String> {
        let items = ctx.store.list_work_items()?;
        let mut body = "All tasks have been planned according to specifications.\n".to_string();

        if !items.is_empty() {
            body.push_str("\n## Remediation\n");
            for item in &items {
                body.push_str(&format!("- [{}] {}\n", item.id, item.description));
            }
            let cleared = ctx.store.clear_work_items()?;
            tracing::info!(cleared, "Consumed pending work items");
        }

        Ok(body)
    }
}

#[async_trait]
impl StageWorker for MarkerWorker {
    async fn execute(&self, ctx: &StageContext) -> Result<(), StageError> {
        Ok(self.run(ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{Signal, WorkItem};
    use crate::stages::tests::context_for;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_each_stage_writes_its_completion_signal() {
        let dir = tempdir().unwrap();
        for stage in Stage::ALL {
            let ctx = context_for(stage, dir.path());
            MarkerWorker::new(stage).execute(&ctx).await.unwrap();
            assert!(ctx.store.signal_exists(stage.completion_signal()));
        }
    }

    #[tokio::test]
    async fn test_planner_consumes_work_items() {
        let dir = tempdir().unwrap();
        let ctx = context_for(Stage::Planning, dir.path());
        ctx.store
            .add_work_item(&WorkItem::pending("validate config keys"))
            .unwrap();
        ctx.store
            .add_work_item(&WorkItem::pending("handle empty input file"))
            .unwrap();

        MarkerWorker::new(Stage::Planning)
            .execute(&ctx)
            .await
            .unwrap();

        assert!(!ctx.store.has_pending_work_items().unwrap());
        let content =
            std::fs::read_to_string(ctx.store.signal_path(Signal::PlanningComplete)).unwrap();
        assert!(content.contains("## Remediation"));
        assert!(content.contains("validate config keys"));
        assert!(content.contains("handle empty input file"));
    }

    #[tokio::test]
    async fn test_signal_body_names_rules_file() {
        let dir = tempdir().unwrap();
        let mut ctx = context_for(Stage::Auditing, dir.path());
        ctx.rules_file = Some(dir.path().join("rules/rules-auditor.md"));

        MarkerWorker::new(Stage::Auditing)
            .execute(&ctx)
            .await
            .unwrap();

        let content = std::fs::read_to_string(ctx.store.signal_path(Signal::AuditPassed)).unwrap();
        assert!(content.starts_with("# Project Audit Passed"));
        assert!(content.contains("rules-auditor.md"));
    }
}
