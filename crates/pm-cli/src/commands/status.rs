//! Status command for showing the store location and event counts.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use pm_core::query;
use pm_core::{Category, EventStore};

pub fn run<W: Write, S: EventStore + ?Sized>(
    writer: &mut W,
    store: &S,
    database_path: &Path,
) -> Result<()> {
    writeln!(writer, "PlayMetric status")?;
    writeln!(writer, "Database: {}", database_path.display())?;

    let actors = query::actor_count(store).context("failed to count actors")?;
    writeln!(writer, "Actors: {actors}")?;

    let mut counts = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let count = store
            .count_events(category)
            .with_context(|| format!("failed to count {category} events"))?;
        counts.push((category, count));
    }
    if counts.iter().all(|(_, count)| *count == 0) {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Events:")?;
    for (category, count) in counts {
        writeln!(writer, "- {category}: {count}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use pm_core::Ingestor;
    use pm_db::{DEFAULT_BUSY_TIMEOUT, Database};
    use serde_json::json;

    #[test]
    fn status_command_outputs_counts_per_category() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("playmetric.db");
        let ingestor = Ingestor::new(Database::open(&db_path, DEFAULT_BUSY_TIMEOUT).unwrap());
        for payload in [
            json!({"globalParams": {"actorId": "u1"}, "eventType": "GAME_START"}),
            json!({"globalParams": {"actorId": "u1"}, "eventType": "MISSION_COMPLETE", "missionId": "m1"}),
            json!({"globalParams": {"actorId": "u2"}, "eventType": "ENGAGEMENT_LOGIN"}),
        ] {
            ingestor.ingest(&payload).unwrap();
        }

        let mut output = Vec::new();
        run(&mut output, &ingestor.into_store(), &db_path).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/playmetric.db");
        assert_snapshot!(output, @r"
        PlayMetric status
        Database: [TEMP]/playmetric.db
        Actors: 2
        Events:
        - game: 2
        - level: 0
        - economy: 0
        - mission: 1
        - ads: 0
        - ui_interaction: 0
        ");
    }

    #[test]
    fn status_command_reports_empty_store() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, Path::new("/data/playmetric.db")).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        PlayMetric status
        Database: /data/playmetric.db
        Actors: 0
        No events recorded.
        ");
    }
}
