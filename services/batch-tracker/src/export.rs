use crate::errors::{Result, TrackerError};
use chrono::{DateTime, Utc};
use pharma_ledger::{Batch, Event};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use tracing::info;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const BATCH_COLUMNS: [(&str, f64); 5] = [
    ("Batch ID", 20.0),
    ("Drug Name", 25.0),
    ("Stage", 20.0),
    ("Status", 20.0),
    ("Created At", 25.0),
];

const EVENT_COLUMNS: [(&str, f64); 5] = [
    ("Batch ID", 20.0),
    ("Actor", 20.0),
    ("Action", 25.0),
    ("Notes", 30.0),
    ("Timestamp", 25.0),
];

/// Rendered workbook ready to be sent as an attachment
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn write_sheet(
    worksheet: &mut Worksheet,
    name: &str,
    columns: &[(&str, f64)],
    rows: &[Vec<String>],
) -> std::result::Result<(), XlsxError> {
    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::VerticalCenter);
    let cell = Format::new()
        .set_align(FormatAlign::Left)
        .set_align(FormatAlign::VerticalCenter);

    worksheet.set_name(name)?;

    for (col, (title, width)) in columns.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, *width)?;
        worksheet.write_string_with_format(0, col, *title, &header)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let row_idx = (idx + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string_with_format(row_idx, col as u16, value, &cell)?;
        }
    }

    Ok(())
}

/// Build the two-sheet workbook; both inputs are expected newest first
pub fn build_export(
    batches: &[Batch],
    events: &[Event],
    generated_at: DateTime<Utc>,
) -> Result<ExportFile> {
    if batches.is_empty() && events.is_empty() {
        return Err(TrackerError::NoDataToExport);
    }

    let batch_rows: Vec<Vec<String>> = batches
        .iter()
        .map(|b| {
            vec![
                b.batch_id.to_string(),
                b.drug_name.clone(),
                b.stage.to_string(),
                b.status.clone(),
                format_time(&b.created_at),
            ]
        })
        .collect();

    let event_rows: Vec<Vec<String>> = events
        .iter()
        .map(|e| {
            vec![
                e.batch_id.clone(),
                e.actor.clone(),
                e.action.clone(),
                e.notes.clone().unwrap_or_default(),
                format_time(&e.timestamp),
            ]
        })
        .collect();

    let mut workbook = Workbook::new();
    write_sheet(workbook.add_worksheet(), "Batches", &BATCH_COLUMNS, &batch_rows)?;
    write_sheet(workbook.add_worksheet(), "Events", &EVENT_COLUMNS, &event_rows)?;
    let bytes = workbook.save_to_buffer()?;

    info!(
        batches = batches.len(),
        events = events.len(),
        size = bytes.len(),
        "Export workbook generated"
    );

    Ok(ExportFile {
        filename: format!("Pharma_Export_{}.xlsx", generated_at.format("%Y-%m-%d")),
        content_type: XLSX_CONTENT_TYPE,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pharma_ledger::BatchId;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_empty_stores_rejected() {
        let result = build_export(&[], &[], generated_at());
        assert!(matches!(result, Err(TrackerError::NoDataToExport)));
    }

    #[test]
    fn test_workbook_is_zip_container() {
        let batch = Batch::new(BatchId::parse("B100").unwrap(), "Aspirin", generated_at()).unwrap();

        let file = build_export(&[batch], &[], generated_at()).unwrap();
        assert_eq!(file.filename, "Pharma_Export_2024-05-01.xlsx");
        assert_eq!(file.content_type, XLSX_CONTENT_TYPE);
        assert!(file.bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_events_only_export() {
        let event = Event {
            id: 1,
            batch_id: "B7".to_string(),
            actor: "Pharmacy".to_string(),
            action: "Inspected".to_string(),
            notes: None,
            timestamp: generated_at(),
        };

        let file = build_export(&[], &[event], generated_at()).unwrap();
        assert!(!file.bytes.is_empty());
    }
}
