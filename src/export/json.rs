use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// Export any report (comparison, merged path, scenario findings) as pretty JSON
pub fn export_json<T: Serialize + ?Sized, W: Write>(report: &T, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    Ok(())
}
