use rollcall_migrations::{RollbackResult, RollbackSelection};

use super::CommandContext;

pub async fn run(context: &CommandContext) -> anyhow::Result<()> {
    let migrator = context.migrator().await?;

    println!("Running {} migrations...", context.connection);
    let result = migrator.migrate().await?;

    if result.nothing_to_migrate() {
        println!("Nothing to migrate.");
    } else {
        println!(
            "Migrations completed successfully ({} applied in batch {}, {}ms).",
            result.applied_count(),
            result.batch.unwrap_or_default(),
            result.execution_time_ms
        );
    }
    Ok(())
}

/// Last batch when `steps` is absent, otherwise exactly `steps` records
pub fn rollback_selection(steps: Option<usize>) -> RollbackSelection {
    match steps {
        Some(steps) => RollbackSelection::Steps(steps),
        None => RollbackSelection::LastBatch,
    }
}

pub async fn rollback(context: &CommandContext, steps: Option<usize>) -> anyhow::Result<()> {
    let migrator = context.migrator().await?;

    println!("Rolling back migrations...");
    let result = migrator.rollback(rollback_selection(steps)).await?;

    report_rollback(&result, "Nothing to rollback.", "Rollback completed successfully.");
    Ok(())
}

pub async fn reset(context: &CommandContext) -> anyhow::Result<()> {
    let migrator = context.migrator().await?;

    println!("Resetting all migrations...");
    let result = migrator.reset().await?;

    report_rollback(&result, "Nothing to reset.", "Reset completed successfully.");
    Ok(())
}

pub async fn refresh(context: &CommandContext) -> anyhow::Result<()> {
    let migrator = context.migrator().await?;

    println!("Refreshing migrations...");
    let result = migrator.refresh().await?;

    for warning in &result.reset.warnings {
        println!("Warning: {}", warning.message);
    }
    println!(
        "Refresh completed successfully ({} rolled back, {} applied).",
        result.reset.rolled_back_count(),
        result.migrate.applied_count()
    );
    Ok(())
}

fn report_rollback(result: &RollbackResult, nothing: &str, done: &str) {
    for warning in &result.warnings {
        println!("Warning: {}", warning.message);
    }

    if result.nothing_to_rollback() {
        println!("{}", nothing);
    } else {
        println!("{}", done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_selection() {
        assert_eq!(rollback_selection(None), RollbackSelection::LastBatch);
        assert_eq!(rollback_selection(Some(3)), RollbackSelection::Steps(3));
    }
}
