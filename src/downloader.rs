use crate::store::SUBMISSIONS_SHEET;
use crate::workbook::{Sheet, Workbook};
use std::error::Error;

/// Convert one sheet to CSV format
///
/// Rows are written as stored. Values containing commas, quotes or
/// newlines are quoted, with embedded quotes doubled.
///
/// # Arguments
/// * `sheet` - Reference to the sheet to convert
///
/// # Returns
/// * `Result<String, Box<dyn Error>>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use sprinkler_permit::downloader::to_csv;
/// use sprinkler_permit::workbook::Sheet;
///
/// let mut sheet = Sheet::new("Submissions");
/// sheet.append_row(vec!["Tower".to_string(), "Flat No".to_string()]);
/// sheet.append_row(vec!["Tower A".to_string(), "10F, rear".to_string()]);
/// let csv = to_csv(&sheet).unwrap();
/// assert_eq!(csv, "Tower,Flat No\nTower A,\"10F, rear\"\n");
/// ```
pub fn to_csv(sheet: &Sheet) -> Result<String, Box<dyn Error>> {
    let mut csv_content = String::new();

    for row in &sheet.rows {
        for (c, value) in row.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
                let escaped = value.replace('"', "\"\"");
                csv_content.push_str(&format!("\"{}\"", escaped));
            } else {
                csv_content.push_str(value);
            }
        }
        csv_content.push('\n');
    }

    Ok(csv_content)
}

/// Convert a workbook to XLSX format
///
/// Every sheet becomes a worksheet of the same name. The header row of
/// the Submissions sheet is bold on a light grey fill.
///
/// # Arguments
/// * `workbook` - Reference to the workbook to convert
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
pub fn to_xlsx(workbook: &Workbook) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};

    let mut xlsx = XlsxWorkbook::new();
    let header_format = Format::new().set_bold().set_background_color(0xF3F3F3_u32);

    for sheet in &workbook.sheets {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&sheet.name)?;

        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                if r == 0 && sheet.name == SUBMISSIONS_SHEET {
                    worksheet.write_string_with_format(r, c, value, &header_format)?;
                } else {
                    worksheet.write_string(r, c, value)?;
                }
            }
        }

        xlsx.push_worksheet(worksheet);
    }

    let buffer = xlsx.save_to_buffer()?;

    Ok(buffer)
}
