use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::models::{DownloadSummary, TaskReportRow};

/// Writes one CSV row per download task.
pub fn write_download_report(summary: &DownloadSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for task in &summary.tasks {
        writer.serialize(TaskReportRow::from(task))?;
    }
    writer.flush()?;

    tracing::debug!(path = %path.display(), rows = summary.tasks.len(), "download report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AveragingPeriod, CatalogEntry, DownloadTask};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_report_rows() -> Result<()> {
        let entry = CatalogEntry::new(
            "RVIII",
            "talcahuano",
            "Talcahuano",
            None,
            "PM25",
            "010100",
            "250101",
            AveragingPeriod::Annual,
        );
        let mut ok = DownloadTask::new(entry.clone());
        ok.begin_attempt();
        ok.succeed(PathBuf::from("data/contaminants/x.csv"));

        let mut bad = DownloadTask::new(CatalogEntry::new(
            "RVIII",
            "hualpen",
            "Hualpén",
            None,
            "0003",
            "010100",
            "250101",
            AveragingPeriod::Annual,
        ));
        bad.begin_attempt();
        bad.fail("No new file appeared after 3 poll attempts");

        let dir = TempDir::new()?;
        let path = dir.path().join("report.csv");
        write_download_report(&DownloadSummary::new(vec![ok, bad]), &path)?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "region_code,station_name,pollutant_code,status,attempts,path,reason"
        );
        assert!(content.contains("downloaded"));
        assert!(content.contains("No new file appeared after 3 poll attempts"));
        Ok(())
    }
}
