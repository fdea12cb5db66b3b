//! Import command for bulk ingestion of newline-delimited JSON payloads.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use pm_core::{EventStore, Ingestor};
use rayon::prelude::*;

use super::ingest::ingest_line;

/// Totals for one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub accepted: usize,
    pub rejected: usize,
}

/// Reads one payload per line and ingests them on `jobs` worker threads.
///
/// Rejections are reported per line, in input order. Blank lines are skipped.
pub fn run<R, W, S>(
    reader: R,
    writer: &mut W,
    ingestor: &Ingestor<S>,
    jobs: usize,
) -> Result<ImportSummary>
where
    R: BufRead,
    W: Write,
    S: EventStore + Send,
{
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        if !line.trim().is_empty() {
            lines.push((idx + 1, line));
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("failed to build import thread pool")?;
    let results: Vec<_> = pool.install(|| {
        lines
            .par_iter()
            .map(|(number, line)| (*number, ingest_line(ingestor, line)))
            .collect()
    });

    let mut summary = ImportSummary {
        accepted: 0,
        rejected: 0,
    };
    for (number, result) in results {
        match result.with_context(|| format!("line {number}"))? {
            Ok(_) => summary.accepted += 1,
            Err(rejection) => {
                summary.rejected += 1;
                writeln!(writer, "line {number}: {}", serde_json::to_string(&rejection)?)?;
            }
        }
    }
    writeln!(
        writer,
        "Imported {} events, rejected {}.",
        summary.accepted, summary.rejected
    )?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use pm_core::{ActorId, Category};
    use pm_db::Database;

    const INPUT: &str = r#"{"globalParams":{"actorId":"u1","sessionId":"s1"},"eventType":"SESSION_START"}
{"globalParams":{"actorId":"u1","sessionId":"s1"},"eventType":"LEVEL_START","levelId":"1-1"}

{"globalParams":{"actorId":"u2"},"eventType":"WARP_DRIVE"}
not json
{"globalParams":{"actorId":"u2","sessionId":"a"},"eventType":"AD_SHOWN","revenue":0.02}
"#;

    #[test]
    fn imports_lines_and_reports_rejections() {
        let ingestor = Ingestor::new(Database::open_in_memory().unwrap());
        let mut output = Vec::new();
        let summary = run(Cursor::new(INPUT), &mut output, &ingestor, 2).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                accepted: 3,
                rejected: 2
            }
        );

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("line 4: "));
        assert!(lines[0].contains(r#""kind":"routing""#));
        assert!(lines[1].starts_with("line 5: "));
        assert_eq!(lines[2], "Imported 3 events, rejected 2.");

        let u1 = ActorId::new("u1").unwrap();
        let actor = ingestor.read(|db| db.find_actor(&u1)).unwrap().unwrap();
        assert_eq!(actor.total_events, 2);
        assert_eq!(actor.total_sessions, 1);
        assert_eq!(ingestor.read(|db| db.count_events(Category::Game)).unwrap(), 1);
    }

    #[test]
    fn empty_input_imports_nothing() {
        let ingestor = Ingestor::new(Database::open_in_memory().unwrap());
        let mut output = Vec::new();
        let summary = run(Cursor::new("\n\n"), &mut output, &ingestor, 4).unwrap();
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.rejected, 0);
    }
}
