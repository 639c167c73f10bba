use std::collections::HashSet;

use crate::model::{
    Block, CellBorders, CellMargins, CellVAlign, StyleKind, Table, TableCell, TableRow,
    TableWidth,
};

use super::body::parse_blocks;
use super::styles::{parse_alignment, parse_cell_margins, parse_table_borders};
use super::{
    ParseState, PartContext, WML_NS, is_wml, parse_shading, twips_attr, twips_to_pts, wml,
    wml_attr, wml_bool,
};

/// Word's limit on grid columns per table. Spans and skipped columns beyond
/// it are clamped.
const MAX_GRID_COLUMNS: u32 = 63;

fn grid_count(pr: Option<roxmltree::Node>, name: &str) -> Option<u32> {
    pr.and_then(|pr| wml_attr(pr, name))
        .and_then(|v| v.parse::<u32>().ok())
        .map(|n| n.min(MAX_GRID_COLUMNS))
}

/// Declared extent of one emitted cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CellSpan {
    pub(crate) colspan: u32,
    pub(crate) rowspan: u32,
}

/// One source row as seen by the grid builder.
#[derive(Clone, Debug, Default)]
pub(crate) struct RowSpec {
    /// Grid columns skipped before the first cell (`w:gridBefore`).
    pub(crate) grid_before: u32,
    pub(crate) cells: Vec<CellSpan>,
}

/// Place every declared cell on the logical grid. A cell spanning rows
/// covers the same columns in the rows beneath it; later rows skip covered
/// slots, so no slot is both an origin and covered. Returns the starting grid
/// column of each cell, row by row.
pub(crate) fn build_grid(rows: &[RowSpec]) -> Vec<Vec<u32>> {
    let mut covered: HashSet<(usize, u32)> = HashSet::new();
    let mut placed = Vec::with_capacity(rows.len());
    for (r, row) in rows.iter().enumerate() {
        let mut col = row.grid_before;
        let mut columns = Vec::with_capacity(row.cells.len());
        for span in &row.cells {
            while covered.contains(&(r, col)) {
                col = col.saturating_add(1);
            }
            columns.push(col);
            let colspan = span.colspan.clamp(1, MAX_GRID_COLUMNS);
            let rowspan = (span.rowspan.max(1) as usize).min(rows.len() - r);
            for below in 1..rowspan {
                for c in col..col.saturating_add(colspan) {
                    covered.insert((r + below, c));
                }
            }
            col = col.saturating_add(colspan);
        }
        placed.push(columns);
    }
    placed
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VMerge {
    None,
    Restart,
    Continue,
}

struct SourceCell<'a> {
    node: roxmltree::Node<'a, 'a>,
    column: u32,
    colspan: u32,
    merge: VMerge,
}

fn source_cells<'a>(tr: roxmltree::Node<'a, 'a>, grid_before: u32) -> Vec<SourceCell<'a>> {
    let mut col = grid_before;
    let mut cells = Vec::new();
    for tc in tr.children().filter(|n| is_wml(*n, "tc")) {
        let tc_pr = wml(tc, "tcPr");
        let colspan = grid_count(tc_pr, "gridSpan").unwrap_or(1).max(1);
        let merge = tc_pr
            .and_then(|pr| wml(pr, "vMerge"))
            .map(|n| match n.attribute((WML_NS, "val")) {
                Some("restart") => VMerge::Restart,
                _ => VMerge::Continue,
            })
            .unwrap_or(VMerge::None);
        cells.push(SourceCell {
            node: tc,
            column: col,
            colspan,
            merge,
        });
        col = col.saturating_add(colspan);
    }
    cells
}

/// Resolve `vMerge` chains: each origin cell gets a rowspan, and each
/// continuation that has an origin above it is marked for suppression.
fn merge_rows(rows: &[Vec<SourceCell>]) -> (Vec<Vec<u32>>, Vec<Vec<bool>>) {
    let starts_merge_at = |r: usize, col: u32| {
        rows.get(r).is_some_and(|row| {
            row.iter()
                .any(|c| c.column == col && c.merge != VMerge::None)
        })
    };
    let continues_at = |r: usize, col: u32| {
        rows.get(r).is_some_and(|row| {
            row.iter()
                .any(|c| c.column == col && c.merge == VMerge::Continue)
        })
    };

    let mut rowspans = Vec::with_capacity(rows.len());
    let mut suppressed = Vec::with_capacity(rows.len());
    for (r, row) in rows.iter().enumerate() {
        let mut spans = Vec::with_capacity(row.len());
        let mut drops = Vec::with_capacity(row.len());
        for cell in row {
            let is_continuation =
                cell.merge == VMerge::Continue && r > 0 && starts_merge_at(r - 1, cell.column);
            drops.push(is_continuation);
            let mut span = 1;
            if !is_continuation && cell.merge != VMerge::None {
                while continues_at(r + span as usize, cell.column) {
                    span += 1;
                }
            }
            spans.push(span);
        }
        rowspans.push(spans);
        suppressed.push(drops);
    }
    (rowspans, suppressed)
}

fn parse_width(node: roxmltree::Node) -> Option<TableWidth> {
    let kind = node.attribute((WML_NS, "type")).unwrap_or("dxa");
    let raw = node.attribute((WML_NS, "w"))?;
    match kind {
        "auto" | "nil" => Some(TableWidth::Auto),
        "pct" => {
            let pct = match raw.strip_suffix('%') {
                Some(v) => v.parse::<f32>().ok()?,
                // fiftieths of a percent
                None => raw.parse::<f32>().ok()? / 50.0,
            };
            Some(TableWidth::Percent(pct))
        }
        _ => raw
            .parse::<f32>()
            .ok()
            .map(|tw| TableWidth::Points(twips_to_pts(tw))),
    }
}

fn parse_v_align(val: &str) -> Option<CellVAlign> {
    match val {
        "top" => Some(CellVAlign::Top),
        "center" => Some(CellVAlign::Center),
        "bottom" => Some(CellVAlign::Bottom),
        _ => None,
    }
}

/// Each edge falls back to the table style's edge when the direct one is absent.
fn merge_borders(direct: CellBorders, style: Option<&CellBorders>) -> CellBorders {
    let Some(style) = style else {
        return direct;
    };
    CellBorders {
        top: direct.top.or_else(|| style.top.clone()),
        bottom: direct.bottom.or_else(|| style.bottom.clone()),
        left: direct.left.or_else(|| style.left.clone()),
        right: direct.right.or_else(|| style.right.clone()),
        inside_h: direct.inside_h.or_else(|| style.inside_h.clone()),
        inside_v: direct.inside_v.or_else(|| style.inside_v.clone()),
        tl2br: direct.tl2br.or_else(|| style.tl2br.clone()),
        tr2bl: direct.tr2bl.or_else(|| style.tr2bl.clone()),
    }
}

/// Numeric value of a cell for table formulas ("1,200" → 1200).
fn cell_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '$' | '€' | '£'))
        .collect();
    cleaned.parse::<f64>().ok()
}

pub(crate) fn parse_table(node: roxmltree::Node, ctx: &PartContext, state: &mut ParseState) -> Table {
    let tbl_pr = wml(node, "tblPr");
    let style_id = tbl_pr.and_then(|pr| wml_attr(pr, "tblStyle"));
    if ctx.options.preserve_styles
        && let Some(id) = style_id
    {
        state.count_style(id, StyleKind::Table);
    }
    let table_style = style_id
        .and_then(|id| ctx.styles.get(id))
        .filter(|s| s.kind == StyleKind::Table);

    let direct_borders = tbl_pr
        .and_then(|pr| wml(pr, "tblBorders"))
        .map(|n| parse_table_borders(n, ctx.theme))
        .unwrap_or_default();
    let borders = merge_borders(
        direct_borders,
        table_style.and_then(|s| s.table.borders.as_ref()),
    );
    let base_margins = table_style
        .and_then(|s| s.table.cell_margins)
        .unwrap_or_default();
    let cell_margins = tbl_pr
        .and_then(|pr| wml(pr, "tblCellMar"))
        .map(|n| parse_cell_margins(n, base_margins))
        .unwrap_or(base_margins);

    let column_widths: Vec<f32> = wml(node, "tblGrid")
        .into_iter()
        .flat_map(|grid| grid.children())
        .filter(|n| is_wml(*n, "gridCol"))
        .filter_map(|n| twips_attr(n, "w"))
        .collect();

    let trs: Vec<_> = node.children().filter(|n| is_wml(*n, "tr")).collect();
    let grid_before: Vec<u32> = trs
        .iter()
        .map(|tr| {
            grid_count(wml(*tr, "trPr"), "gridBefore").unwrap_or(0)
        })
        .collect();
    let source: Vec<Vec<SourceCell>> = trs
        .iter()
        .zip(&grid_before)
        .map(|(tr, before)| source_cells(*tr, *before))
        .collect();
    let (rowspans, suppressed) = merge_rows(&source);

    let specs: Vec<RowSpec> = source
        .iter()
        .enumerate()
        .map(|(r, cells)| RowSpec {
            grid_before: grid_before[r],
            cells: cells
                .iter()
                .enumerate()
                .filter(|(i, _)| !suppressed[r][*i])
                .map(|(i, c)| CellSpan {
                    colspan: c.colspan,
                    rowspan: rowspans[r][i],
                })
                .collect(),
        })
        .collect();
    let placed = build_grid(&specs);

    let table_style_id = table_style.and(style_id);
    // (grid column, value) of every numeric cell parsed so far
    let mut numbers: Vec<(usize, u32, f64)> = Vec::new();
    let mut rows = Vec::with_capacity(trs.len());
    for (r, tr) in trs.iter().enumerate() {
        let tr_pr = wml(*tr, "trPr");
        let emitted = source[r]
            .iter()
            .enumerate()
            .filter(|(i, _)| !suppressed[r][*i])
            .map(|(_, c)| c);

        let mut cells = Vec::new();
        for (cell, (&column, span)) in emitted.zip(placed[r].iter().zip(&specs[r].cells)) {
            state.fields.table_values = numbers
                .iter()
                .filter(|(row, col, _)| *row < r && *col == column)
                .map(|(_, _, v)| *v)
                .collect();
            state.fields.row_values = numbers
                .iter()
                .filter(|(row, col, _)| *row == r && *col < column)
                .map(|(_, _, v)| *v)
                .collect();

            let parsed = parse_cell(cell.node, ctx, state, table_style_id, *span, column);
            if let Some(value) = cell_number(&parsed.text()) {
                numbers.push((r, column, value));
            }
            cells.push(parsed);
        }

        rows.push(TableRow {
            cells,
            is_header: r == 0 || tr_pr.and_then(|pr| wml_bool(pr, "tblHeader")) == Some(true),
            height: tr_pr
                .and_then(|pr| wml(pr, "trHeight"))
                .and_then(|h| twips_attr(h, "val")),
        });
    }
    state.fields.table_values.clear();
    state.fields.row_values.clear();

    log::debug!(
        "Table: {} rows, {} grid columns, style {:?}",
        rows.len(),
        column_widths.len(),
        style_id
    );

    Table {
        rows,
        style: style_id
            .filter(|_| ctx.options.preserve_styles)
            .map(str::to_string),
        column_widths,
        borders,
        width: tbl_pr.and_then(|pr| wml(pr, "tblW")).and_then(parse_width),
        cell_margins,
        alignment: tbl_pr
            .and_then(|pr| wml_attr(pr, "jc"))
            .and_then(parse_alignment),
    }
}

fn parse_cell(
    tc: roxmltree::Node,
    ctx: &PartContext,
    state: &mut ParseState,
    table_style: Option<&str>,
    span: CellSpan,
    column: u32,
) -> TableCell {
    let tc_pr = wml(tc, "tcPr");
    let content: Vec<Block> = parse_blocks(tc, ctx, state, table_style);
    TableCell {
        content,
        colspan: span.colspan,
        rowspan: span.rowspan,
        grid_column: column,
        borders: tc_pr
            .and_then(|pr| wml(pr, "tcBorders"))
            .map(|n| parse_table_borders(n, ctx.theme))
            .unwrap_or_default(),
        shading: tc_pr
            .and_then(|pr| wml(pr, "shd"))
            .and_then(|n| parse_shading(n, ctx.theme)),
        margins: tc_pr
            .and_then(|pr| wml(pr, "tcMar"))
            .map(|n| parse_cell_margins(n, CellMargins::default())),
        width: tc_pr.and_then(|pr| wml(pr, "tcW")).and_then(parse_width),
        vertical_align: tc_pr
            .and_then(|pr| wml_attr(pr, "vAlign"))
            .and_then(parse_v_align),
        text_direction: tc_pr
            .and_then(|pr| wml_attr(pr, "textDirection"))
            .map(str::to_string),
    }
}
