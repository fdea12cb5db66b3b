//! Lists the accepted event types.

use std::io::Write;

use anyhow::Result;
use pm_core::EventType;
use pm_core::schema::classify;

pub fn run<W: Write>(writer: &mut W) -> Result<()> {
    for event_type in EventType::ALL {
        writeln!(writer, "{:<32} {}", event_type.as_str(), classify(*event_type))?;
    }
    Ok(())
}
