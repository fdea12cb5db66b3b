//! Analytics summary command.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pm_core::EventStore;
use pm_core::query;

use super::util::write_json;

pub fn run<W: Write, S: EventStore + ?Sized>(
    writer: &mut W,
    store: &S,
    now: DateTime<Utc>,
) -> Result<()> {
    let summary = query::summary(store, now).context("failed to compute summary")?;
    write_json(writer, &summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use insta::assert_snapshot;
    use pm_core::{FixedClock, Ingestor, MemoryStore};
    use serde_json::json;

    #[test]
    fn prints_summary_json() {
        let now = Utc.with_ymd_and_hms(2025, 10, 14, 12, 0, 0).unwrap();
        let ingestor = Ingestor::with_clock(MemoryStore::new(), FixedClock(now));
        for payload in [
            json!({"globalParams": {"actorId": "u1"}, "eventType": "AD_REVENUE", "revenue": 0.5}),
            json!({"globalParams": {"actorId": "u1"}, "eventType": "ECONOMY_IAP_PURCHASE", "realMoneyValue": 2.0}),
            json!({"globalParams": {"actorId": "u2", "timestamp": "2025-10-01T00:00:00Z"}, "eventType": "GAME_START"}),
        ] {
            ingestor.ingest(&payload).unwrap();
        }

        let mut output = Vec::new();
        run(&mut output, &ingestor.into_store(), now).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output.trim_end(), @r#"
        {
          "totalActors": 2,
          "activeActors24h": 1,
          "activeActors7d": 1,
          "eventsPerCategory": {
            "game": 1,
            "level": 0,
            "economy": 1,
            "mission": 0,
            "ads": 1,
            "ui_interaction": 0
          },
          "totalEvents": 3,
          "adRevenue": 0.5,
          "iapRevenue": 2.0,
          "totalRevenue": 2.5
        }
        "#);
    }
}
