//! Markdown activity report.

use crate::pm::activity::ActivityData;

/// Render collected commit activity as Markdown.
pub fn render_activity_report(data: &ActivityData) -> String {
    let mut output = String::new();
    let meta = &data.metadata;

    output.push_str(&format!("# Activity Report ({} days)\n\n", meta.days));
    output.push_str(&format!(
        "- **Window:** {} to {}\n",
        meta.since.format("%Y-%m-%d %H:%M UTC"),
        meta.until.format("%Y-%m-%d %H:%M UTC")
    ));
    output.push_str(&format!(
        "- **Generated:** {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("- **Commits:** {}\n", data.totals.commits));
    output.push_str(&format!(
        "- **Active Repositories:** {}/{}\n",
        data.totals.active_repositories, data.totals.repositories
    ));
    output.push_str(&format!("- **Authors:** {}\n\n", data.totals.authors));

    output.push_str("## Repositories\n\n");
    if data.repositories.is_empty() {
        output.push_str("No repositories configured.\n");
        return output;
    }

    output.push_str("| Repository | Commits | Authors |\n");
    output.push_str("|------------|---------|---------|\n");
    for (name, activity) in &data.repositories {
        let authors = match activity.error {
            Some(ref e) => format!("error: {}", e),
            None if activity.authors.is_empty() => "-".to_string(),
            None => activity.authors.join(", "),
        };
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            name, activity.commits, authors
        ));
    }
    output.push('\n');

    output
}
