use rollcall_migrations::MigrationStatus;

use super::CommandContext;

const NAME_WIDTH: usize = 48;

pub async fn run(context: &CommandContext) -> anyhow::Result<()> {
    let migrator = context.migrator().await?;
    let statuses = migrator.status().await?;

    if statuses.is_empty() {
        println!("No migrations found.");
        return Ok(());
    }

    print!("{}", render_table(&statuses));
    Ok(())
}

/// Fixed-width table, long names truncated with `...`
pub fn render_table(statuses: &[MigrationStatus]) -> String {
    let border = format!("+------+{}+--------+\n", "-".repeat(NAME_WIDTH + 2));

    let mut table = String::new();
    table.push_str(&border);
    table.push_str(&format!(
        "| Ran? | {:<width$} | Batch  |\n",
        "Migration",
        width = NAME_WIDTH
    ));
    table.push_str(&border);

    for status in statuses {
        let ran = if status.ran { "Yes" } else { "No" };
        let batch = status
            .batch
            .map(|b| b.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        table.push_str(&format!(
            "| {:<4} | {:<width$} | {:<6} |\n",
            ran,
            truncate_name(&status.migration),
            batch,
            width = NAME_WIDTH
        ));
    }

    table.push_str(&border);
    table
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        let head: String = name.chars().take(NAME_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}
