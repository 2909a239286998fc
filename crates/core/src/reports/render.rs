//! Workbook rendering with `rust_xlsxwriter`.
//!
//! Workbooks are built in memory; nothing touches the filesystem.

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::debug;

use super::comparison::{self, BLOCK_ROWS, ComparisonReport, IDENTITY_COLUMNS};
use super::daily::{self, DailyReport};
use super::error::ReportError;
use super::sheet::{Cell, RowStyle, SUMMARY_SHEET, SheetNames, SheetRow};
use super::types::RenderedReport;

const GREY: u32 = 0x00D3_D3D3;
const LIGHT_GREEN: u32 = 0x00CC_FFCC;
const RED: u32 = 0x00FF_0000;
const GREEN: u32 = 0x0000_8000;
const BLUE: u32 = 0x0000_66CC;

/// First column (0-based) colored on difference rows.
const DIFFERENCE_FROM_COLUMN: u16 = 5;

struct Styles {
    plain: Format,
    header: Format,
    block_header: Format,
    difference: Format,
    title: Format,
    status_ok: Format,
    status_alert: Format,
    section: Format,
    passed: Format,
    failed: Format,
}

impl Styles {
    fn new() -> Self {
        let plain = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let bold = |size: u8| plain.clone().set_bold().set_font_size(size);

        Self {
            header: bold(10).set_background_color(Color::RGB(GREY)),
            block_header: bold(10).set_background_color(Color::RGB(LIGHT_GREEN)),
            difference: plain.clone().set_font_color(Color::RGB(RED)),
            title: bold(12),
            status_ok: bold(10).set_font_color(Color::RGB(GREEN)),
            status_alert: bold(10).set_font_color(Color::RGB(RED)),
            section: bold(10).set_font_color(Color::RGB(BLUE)),
            passed: plain.clone().set_bold().set_font_color(Color::RGB(GREEN)),
            failed: plain.clone().set_bold().set_font_color(Color::RGB(RED)),
            plain,
        }
    }

    fn pick(&self, style: RowStyle, col: u16) -> &Format {
        match (style, col) {
            (RowStyle::Header, _) => &self.header,
            (RowStyle::BlockHeader, _) => &self.block_header,
            (RowStyle::Difference, c) if c >= DIFFERENCE_FROM_COLUMN => &self.difference,
            (RowStyle::Title { .. }, 0) => &self.title,
            (RowStyle::Title { alert: true }, 1) => &self.status_alert,
            (RowStyle::Title { alert: false }, 1) => &self.status_ok,
            (RowStyle::Section, 0) => &self.section,
            (RowStyle::Check { passed: true }, 2) => &self.passed,
            (RowStyle::Check { passed: false }, 2) => &self.failed,
            _ => &self.plain,
        }
    }
}

/// Renders the daily workbook: summary sheet plus one detail sheet per shop.
pub fn render_daily(report: &DailyReport) -> Result<RenderedReport, ReportError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();

    {
        let summary = workbook.add_worksheet();
        summary.set_name(SUMMARY_SHEET)?;
        set_widths(summary, &daily::SUMMARY_WIDTHS)?;

        let width = daily::SUMMARY_WIDTHS.len();
        write_row(summary, 0, &DailyReport::summary_header(), width, &styles)?;
        for (i, shop) in report.shops.iter().enumerate() {
            write_row(
                summary,
                row_index(i + 1)?,
                &shop.summary_row(report.date, i + 1),
                width,
                &styles,
            )?;
        }
    }

    let mut names = SheetNames::with_summary();
    for shop in &report.shops {
        let detail = workbook.add_worksheet();
        detail.set_name(names.allocate(&shop.display_name()))?;
        set_widths(detail, &daily::DETAIL_WIDTHS)?;

        for (i, row) in shop.detail_rows(report.date).iter().enumerate() {
            write_row(detail, row_index(i)?, row, daily::DETAIL_WIDTHS.len(), &styles)?;
        }
    }

    let content = workbook.save_to_buffer()?;
    debug!(
        shops = report.shops.len(),
        bytes = content.len(),
        "Rendered daily workbook"
    );
    Ok(RenderedReport {
        content,
        row_count: report.shops.len(),
    })
}

/// Renders a two-period comparison workbook.
pub fn render_comparison(report: &ComparisonReport) -> Result<RenderedReport, ReportError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();
    let summary = workbook.add_worksheet();
    summary.set_name(SUMMARY_SHEET)?;
    set_widths(summary, &comparison::SUMMARY_WIDTHS)?;

    let width = comparison::SUMMARY_WIDTHS.len();
    for (i, row) in report.summary_rows().iter().enumerate() {
        let offset = i % BLOCK_ROWS;
        let r = row_index(i)?;
        if offset == 0 {
            write_row(summary, r, row, width, &styles)?;
            continue;
        }
        if offset == 1 {
            merge_identity(summary, r, row, &styles.plain)?;
        }
        write_row_from(summary, r, row, IDENTITY_COLUMNS, width, &styles)?;
    }

    let content = workbook.save_to_buffer()?;
    debug!(
        kind = %report.kind,
        shops = report.shops.len(),
        bytes = content.len(),
        "Rendered comparison workbook"
    );
    Ok(RenderedReport {
        content,
        row_count: report.shops.len(),
    })
}

/// Merges the identity columns down the seven data rows of a block.
fn merge_identity(
    sheet: &mut Worksheet,
    first_row: u32,
    row: &SheetRow,
    format: &Format,
) -> Result<(), XlsxError> {
    let last_row = first_row + u32::try_from(BLOCK_ROWS - 2).unwrap_or(0);
    for col in 0..IDENTITY_COLUMNS {
        let cell = row.cells.get(usize::from(col)).unwrap_or(&Cell::Empty);
        let text = cell.as_text().unwrap_or_default();
        sheet.merge_range(first_row, col, last_row, col, text, format)?;
        if !matches!(cell, Cell::Text(_) | Cell::Empty) {
            write_cell(sheet, first_row, col, cell, format)?;
        }
    }
    Ok(())
}

fn write_row(
    sheet: &mut Worksheet,
    row: u32,
    data: &SheetRow,
    width: usize,
    styles: &Styles,
) -> Result<(), XlsxError> {
    write_row_from(sheet, row, data, 0, width, styles)
}

/// Writes columns `from..width`; missing cells are written blank so borders
/// cover the full width.
fn write_row_from(
    sheet: &mut Worksheet,
    row: u32,
    data: &SheetRow,
    from: u16,
    width: usize,
    styles: &Styles,
) -> Result<(), XlsxError> {
    for (col, cell) in (0u16..).zip(padded(&data.cells, width)).skip(usize::from(from)) {
        write_cell(sheet, row, col, cell, styles.pick(data.style, col))?;
    }
    Ok(())
}

fn padded(cells: &[Cell], width: usize) -> impl Iterator<Item = &Cell> {
    cells
        .iter()
        .chain(std::iter::repeat(&Cell::Empty))
        .take(width.max(cells.len()))
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    format: &Format,
) -> Result<(), XlsxError> {
    match cell {
        Cell::Empty => sheet.write_blank(row, col, format)?,
        Cell::Text(text) => sheet.write_string_with_format(row, col, text, format)?,
        Cell::Int(value) => {
            sheet.write_number_with_format(row, col, value.to_f64().unwrap_or_default(), format)?
        }
        Cell::Amount(value) => {
            sheet.write_number_with_format(row, col, value.to_f64().unwrap_or_default(), format)?
        }
    };
    Ok(())
}

fn set_widths(sheet: &mut Worksheet, widths: &[u16]) -> Result<(), XlsxError> {
    for (col, width) in (0u16..).zip(widths) {
        sheet.set_column_width(col, *width)?;
    }
    Ok(())
}

fn row_index(index: usize) -> Result<u32, ReportError> {
    u32::try_from(index).map_err(|_| ReportError::Render(format!("row {index} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::reports::comparison::{PeriodMetrics, PeriodRow};
    use crate::reports::daily::{DailyShopEntry, DailyShopMetrics};
    use crate::reports::directory::{ShopDirectory, ShopProfile};
    use crate::reports::types::{DateRange, ReportKind};

    fn is_zip(bytes: &[u8]) -> bool {
        bytes.starts_with(b"PK\x03\x04")
    }

    fn entry(id: &str, name: &str) -> DailyShopEntry {
        DailyShopEntry {
            metrics: DailyShopMetrics {
                shop_id: id.into(),
                shop_name: Some(name.into()),
                visit_users: 10,
                ..DailyShopMetrics::default()
            },
            profile: ShopProfile::default(),
            region: None,
            coupon_orders_7d: 0,
        }
    }

    #[test]
    fn test_daily_workbook_renders_with_duplicate_names() {
        let report = DailyReport {
            date: NaiveDate::from_ymd_opt(2025, 12, 18).unwrap(),
            shops: vec![
                entry("1", "老王烧烤[西湖店]"),
                entry("2", "老王烧烤[西湖店]"),
                entry("3", "汇总"),
                entry("4", ""),
            ],
        };

        let rendered = render_daily(&report).unwrap();
        assert!(is_zip(&rendered.content));
        assert_eq!(rendered.row_count, 4);
    }

    #[test]
    fn test_comparison_workbook_renders() {
        let range = |a, b| {
            DateRange::new(
                NaiveDate::from_ymd_opt(2025, 11, a).unwrap(),
                NaiveDate::from_ymd_opt(2025, 11, b).unwrap(),
            )
            .unwrap()
        };
        let rows = |visits| {
            vec![
                PeriodRow {
                    shop_id: "1".into(),
                    shop_name: Some("A".into()),
                    metrics: PeriodMetrics {
                        visit_users: visits,
                        ..PeriodMetrics::default()
                    },
                },
                PeriodRow {
                    shop_id: "2".into(),
                    shop_name: Some("B".into()),
                    metrics: PeriodMetrics::default(),
                },
            ]
        };
        let report = ComparisonReport::assemble(
            ReportKind::Monthly,
            range(1, 15),
            range(16, 30),
            rows(5),
            rows(9),
            &ShopDirectory::default(),
        );

        let rendered = render_comparison(&report).unwrap();
        assert!(is_zip(&rendered.content));
        assert_eq!(rendered.row_count, 2);
    }

    #[test]
    fn test_style_selection() {
        let styles = Styles::new();
        let same = |a: &Format, b: &Format| std::ptr::eq(a, b);

        assert!(same(styles.pick(RowStyle::Difference, 4), &styles.plain));
        assert!(same(styles.pick(RowStyle::Difference, 5), &styles.difference));
        assert!(same(styles.pick(RowStyle::Check { passed: false }, 2), &styles.failed));
        assert!(same(styles.pick(RowStyle::Check { passed: true }, 1), &styles.plain));
        assert!(same(styles.pick(RowStyle::Title { alert: true }, 1), &styles.status_alert));
        assert!(same(styles.pick(RowStyle::Section, 0), &styles.section));
    }

    #[test]
    fn test_padding_fills_width() {
        let cells = vec![Cell::Int(1)];
        assert_eq!(padded(&cells, 3).count(), 3);
        assert_eq!(padded(&cells, 0).count(), 1);
    }
}
