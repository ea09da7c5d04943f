use pretty_assertions::assert_eq;
use sheetml_model::{
    parse_sqref, CalcChain, CalcChainPolicy, Cell, CellContent, CellId, CfRule, CfRuleKind,
    ConditionalFormatting, DefinedNameScope, Formula, FormulaBody, ModelError, Range, ShiftError,
    SpreadsheetVersion, Workbook, WorkbookOptions, WorksheetId,
};
use sheetml_model::CellRef;

fn at(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap()
}

fn r(a1: &str) -> Range {
    Range::from_a1(a1).unwrap()
}

fn f(text: &str) -> Formula {
    Formula::parse(text).unwrap()
}

fn formula(wb: &Workbook, sheet: WorksheetId, a1: &str) -> String {
    wb.sheet(sheet)
        .unwrap()
        .effective_formula(at(a1))
        .unwrap()
        .unwrap_or_else(|| panic!("no formula at {a1}"))
        .to_string()
}

fn body(wb: &Workbook, sheet: WorksheetId, a1: &str) -> FormulaBody {
    wb.sheet(sheet)
        .unwrap()
        .cell(at(a1))
        .and_then(|c| c.content.formula_cell())
        .map(|f| f.body.clone())
        .unwrap_or_else(|| panic!("no formula cell at {a1}"))
}

fn merges(wb: &Workbook, sheet: WorksheetId) -> Vec<String> {
    wb.sheet(sheet)
        .unwrap()
        .merged_regions()
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn name_text(wb: &Workbook, scope: DefinedNameScope, name: &str) -> String {
    wb.name(scope, name).unwrap().refers_to.to_string()
}

#[test]
fn moving_rows_and_back_restores_formulas_names_and_merges() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let calc = wb.add_sheet("Calc").unwrap();
    wb.set_formula(data, at("A1"), f("SUM(A6:A11)")).unwrap();
    wb.set_formula(data, at("B20"), f("A7*2+$C$30")).unwrap();
    wb.set_formula(data, at("C7"), f("C6+1")).unwrap();
    wb.set_formula(calc, at("A1"), f("Data!B8+Calc!B8")).unwrap();
    wb.create_name(DefinedNameScope::Workbook, "Band", "=Data!$A$6:$D$11")
        .unwrap();
    wb.sheet_mut(data).unwrap().add_merged_region(r("A7:B8")).unwrap();
    wb.sheet_mut(data).unwrap().add_merged_region(r("D2:E3")).unwrap();
    let original = wb.clone();

    wb.shift_rows(data, 5, 10, 3).unwrap();
    assert_eq!(formula(&wb, data, "A1"), "SUM(A9:A14)");
    assert_eq!(formula(&wb, data, "B20"), "A10*2+$C$30");
    assert_eq!(formula(&wb, data, "C10"), "C9+1");
    assert!(wb.sheet(data).unwrap().cell(at("C7")).is_none());
    assert_eq!(formula(&wb, calc, "A1"), "Data!B11+Calc!B8");
    assert_eq!(
        name_text(&wb, DefinedNameScope::Workbook, "band"),
        "Data!$A$9:$D$14"
    );
    assert_eq!(merges(&wb, data), vec!["A10:B11", "D2:E3"]);

    wb.shift_rows(data, 8, 13, -3).unwrap();
    assert_eq!(wb, original);
}

#[test]
fn deleting_rows_truncates_ranges_and_breaks_deleted_references() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.set_formula(data, at("A1"), f("SUM(A3:A10)")).unwrap();
    wb.set_formula(data, at("B1"), f("A5")).unwrap();
    wb.create_name(DefinedNameScope::Sheet(data), "Pick", "$A$5")
        .unwrap();
    let sheet = wb.sheet_mut(data).unwrap();
    sheet.add_merged_region(r("A4:B7")).unwrap();
    sheet.add_conditional_formatting(ConditionalFormatting::new(
        parse_sqref("C3:C8").unwrap(),
        vec![CfRule {
            priority: 1,
            dxf_id: None,
            stop_if_true: false,
            kind: CfRuleKind::Expression { formula: f("C3>0") },
        }],
    ))
    .unwrap();

    wb.delete_rows(data, 3, 5).unwrap();

    assert_eq!(formula(&wb, data, "A1"), "SUM(A3:A7)");
    assert_eq!(formula(&wb, data, "B1"), "#REF!");
    assert_eq!(name_text(&wb, DefinedNameScope::Sheet(data), "Pick"), "#REF!");
    assert_eq!(merges(&wb, data), vec!["A4:B4"]);
    let cf = &wb.sheet(data).unwrap().conditional_formatting()[0];
    assert_eq!(cf.applies_to, vec![r("C3:C5")]);
    assert_eq!(cf.rules[0].formulas()[0].to_string(), "C3>0");
}

#[test]
fn names_only_follow_edits_on_their_own_sheet() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let calc = wb.add_sheet("Calc").unwrap();
    wb.create_name(DefinedNameScope::Sheet(calc), "Local", "$A$5")
        .unwrap();
    wb.create_name(DefinedNameScope::Sheet(data), "Local", "$A$5")
        .unwrap();
    wb.create_name(DefinedNameScope::Workbook, "Anchor", "$A$5")
        .unwrap();

    wb.insert_rows(data, 0, 2).unwrap();

    assert_eq!(name_text(&wb, DefinedNameScope::Sheet(calc), "Local"), "$A$5");
    assert_eq!(name_text(&wb, DefinedNameScope::Sheet(data), "Local"), "$A$7");
    assert_eq!(name_text(&wb, DefinedNameScope::Workbook, "Anchor"), "$A$5");
}

#[test]
fn inserted_columns_move_cells_widths_and_references() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.set_formula(data, at("A1"), f("SUM(B1:D1)")).unwrap();
    wb.set_cell_text(data, at("D1"), "total").unwrap();
    wb.sheet_mut(data).unwrap().set_column_width(2, Some(20.0)).unwrap();

    wb.insert_columns(data, 1, 2).unwrap();

    assert_eq!(formula(&wb, data, "A1"), "SUM(D1:F1)");
    assert_eq!(
        wb.cell_text(data, at("F1")).unwrap().map(|t| t.plain_text()),
        Some("total")
    );
    let sheet = wb.sheet(data).unwrap();
    assert!(sheet.cell(at("D1")).is_none());
    assert!(sheet.column(2).is_none());
    assert_eq!(sheet.column(4).and_then(|c| c.width), Some(20.0));
}

#[test]
fn splitting_an_array_formula_is_rejected_without_changes() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.sheet_mut(data)
        .unwrap()
        .set_array_formula(r("B2:C3"), f("A2:A3*2"))
        .unwrap();
    wb.set_formula(data, at("E1"), f("B2+1")).unwrap();
    let original = wb.clone();

    assert_eq!(
        wb.delete_rows(data, 2, 4),
        Err(ModelError::ArrayFormulaConflict(r("B2:C3")))
    );
    assert_eq!(wb, original);

    assert_eq!(
        wb.insert_rows(data, 2, 1),
        Err(ModelError::ArrayFormulaConflict(r("B2:C3")))
    );
    assert_eq!(wb, original);

    wb.insert_rows(data, 0, 1).unwrap();
    assert_eq!(
        wb.sheet(data).unwrap().array_formula_ranges(),
        vec![r("B3:C4")]
    );
    assert_eq!(formula(&wb, data, "B3"), "A3:A4*2");
    assert_eq!(formula(&wb, data, "E2"), "B3+1");
}

#[test]
fn deleting_a_whole_array_formula_removes_it() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.sheet_mut(data)
        .unwrap()
        .set_array_formula(r("B2:C3"), f("A2:A3*2"))
        .unwrap();

    wb.delete_rows(data, 1, 2).unwrap();

    let sheet = wb.sheet(data).unwrap();
    assert!(sheet.array_formula_ranges().is_empty());
    assert_eq!(sheet.cell_count(), 0);
}

#[test]
fn moving_rows_through_a_merged_region_is_rejected() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.sheet_mut(data).unwrap().add_merged_region(r("A2:B5")).unwrap();
    let original = wb.clone();

    assert_eq!(
        wb.shift_rows(data, 3, 6, 10),
        Err(ModelError::MergedRegionConflict(r("A2:B5")))
    );
    assert_eq!(wb, original);

    wb.insert_rows(data, 2, 2).unwrap();
    assert_eq!(merges(&wb, data), vec!["A2:B7"]);
}

#[test]
fn shifting_a_reference_past_the_last_row_fails_without_changes() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.set_formula(data, at("A1"), f("A1048576")).unwrap();
    wb.set_formula(data, at("B1"), f("A1")).unwrap();
    let original = wb.clone();

    let err = wb.insert_rows(data, 0, 1).unwrap_err();
    assert!(matches!(
        err,
        ModelError::ReferenceShiftOverflow(ShiftError::ReferenceShiftOverflow { .. })
    ));
    assert_eq!(wb, original);
}

#[test]
fn calc_chain_entries_follow_edits_and_removals() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let other = wb.add_sheet("Other").unwrap();
    let mut chain = CalcChain::new();
    for a1 in ["A1", "A2", "A3"] {
        wb.set_formula(data, at(a1), f("1+1")).unwrap();
        chain.push(data, at(a1));
    }
    wb.set_formula(other, at("A1"), f("Data!A3")).unwrap();
    chain.push(other, at("A1"));
    wb.set_calc_chain(Some(chain));

    assert!(wb.remove_formula(data, at("A2")).unwrap());
    assert!(!wb.remove_formula(data, at("A2")).unwrap());
    let entries: Vec<CellId> = wb.calc_chain().unwrap().entries().to_vec();
    assert_eq!(
        entries,
        vec![
            CellId::new(data, 0, 0),
            CellId::new(data, 2, 0),
            CellId::new(other, 0, 0),
        ]
    );

    wb.delete_rows(data, 0, 0).unwrap();
    let entries: Vec<CellId> = wb.calc_chain().unwrap().entries().to_vec();
    assert_eq!(
        entries,
        vec![CellId::new(data, 1, 0), CellId::new(other, 0, 0)]
    );
    assert_eq!(formula(&wb, other, "A1"), "Data!A2");
}

#[test]
fn calc_chain_can_be_dropped_on_structural_edits() {
    let mut wb = Workbook::with_options(WorkbookOptions {
        calc_chain: CalcChainPolicy::DropOnStructuralEdit,
        ..WorkbookOptions::default()
    });
    let data = wb.add_sheet("Data").unwrap();
    wb.set_formula(data, at("A1"), f("1+1")).unwrap();
    let mut chain = CalcChain::new();
    chain.push(data, at("A1"));
    wb.set_calc_chain(Some(chain));

    wb.insert_columns(data, 0, 1).unwrap();
    assert_eq!(wb.calc_chain(), None);
}

fn chained_formulas(cells: &[&str]) -> (Workbook, WorksheetId) {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let mut chain = CalcChain::new();
    for a1 in cells {
        wb.set_formula(data, at(a1), f("1+1")).unwrap();
        chain.push(data, at(a1));
    }
    wb.set_calc_chain(Some(chain));
    (wb, data)
}

fn chain_cells(wb: &Workbook) -> Vec<String> {
    wb.calc_chain()
        .unwrap()
        .entries()
        .iter()
        .map(|id| id.cell.to_a1())
        .collect()
}

#[test]
fn overwriting_a_formula_with_a_value_leaves_the_chain() {
    let (mut wb, data) = chained_formulas(&["A1", "A2"]);

    let previous = wb
        .set_cell(data, at("A1"), Cell::new(CellContent::Number(5.0)))
        .unwrap();
    assert!(previous.is_some_and(|c| c.content.is_formula()));
    assert_eq!(chain_cells(&wb), vec!["A2"]);

    wb.set_formula(data, at("A2"), f("2+2")).unwrap();
    assert_eq!(chain_cells(&wb), Vec::<String>::new());
}

#[test]
fn array_formula_over_formulas_leaves_the_chain() {
    let (mut wb, data) = chained_formulas(&["B2", "C3", "D4"]);

    wb.set_array_formula(data, r("B2:C3"), f("A1:A2*2")).unwrap();
    assert_eq!(chain_cells(&wb), vec!["D4"]);
    assert_eq!(wb.sheet(data).unwrap().cell(at("C3")), None);

    assert_eq!(wb.remove_array_formula(data, at("C3")).unwrap(), Some(r("B2:C3")));
    assert!(!wb.sheet(data).unwrap().is_part_of_array_formula(at("B2")));
}

#[test]
fn shared_formula_over_formulas_leaves_the_chain() {
    let (mut wb, data) = chained_formulas(&["C1", "C3", "E1"]);

    let si = wb.set_shared_formula(data, r("C1:C4"), f("A1*2")).unwrap();
    assert_eq!(chain_cells(&wb), vec!["E1"]);
    assert_eq!(body(&wb, data, "C3"), FormulaBody::SharedMember { si });
    assert_eq!(formula(&wb, data, "C3"), "A3*2");
}

#[test]
fn cells_outside_the_grid_are_rejected() {
    let mut wb = Workbook::with_options(WorkbookOptions {
        version: SpreadsheetVersion::Excel97,
        ..WorkbookOptions::default()
    });
    let data = wb.add_sheet("Data").unwrap();
    wb.set_formula(data, at("A1"), f("SUM(A2:A10)")).unwrap();

    assert!(matches!(
        wb.set_formula(data, CellRef::new(70_000, 0), f("1+1")),
        Err(ModelError::OutOfRange { what: "row", index: 70_000, .. })
    ));
    assert!(matches!(
        wb.set_cell_text(data, CellRef::new(0, 300), "x"),
        Err(ModelError::OutOfRange { what: "column", index: 300, .. })
    ));
    assert!(wb.shared_strings.is_empty());
    assert!(matches!(
        wb.group_rows(data, 0, u32::MAX),
        Err(ModelError::OutOfRange { what: "row", .. })
    ));
    assert!(matches!(
        wb.set_shared_formula(data, r("IV1:IW2"), f("A1")),
        Err(ModelError::OutOfRange { what: "column", index: 256, .. })
    ));

    wb.insert_rows(data, 0, 1).unwrap();
    assert_eq!(formula(&wb, data, "A2"), "SUM(A3:A11)");
    assert_eq!(wb.sheet(data).unwrap().cell_count(), 1);
}

#[test]
fn shared_group_keeps_its_shape_across_an_insert() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let si = wb
        .sheet_mut(data)
        .unwrap()
        .set_shared_formula(r("C1:C4"), f("A1*2"))
        .unwrap();

    wb.insert_rows(data, 2, 1).unwrap();

    assert_eq!(
        body(&wb, data, "C1"),
        FormulaBody::SharedMaster {
            si,
            range: r("C1:C5"),
            formula: f("A1*2"),
        }
    );
    assert_eq!(body(&wb, data, "C5"), FormulaBody::SharedMember { si });
    assert_eq!(formula(&wb, data, "C2"), "A2*2");
    assert_eq!(formula(&wb, data, "C4"), "A4*2");
    assert_eq!(formula(&wb, data, "C5"), "A5*2");
    assert!(wb.sheet(data).unwrap().cell(at("C3")).is_none());
}

#[test]
fn shared_group_is_dissolved_when_members_stop_matching_the_master() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.sheet_mut(data)
        .unwrap()
        .set_shared_formula(r("C1:C4"), f("B3"))
        .unwrap();

    wb.delete_rows(data, 2, 2).unwrap();

    for (a1, expected) in [("C1", "#REF!"), ("C2", "B3"), ("C3", "B5")] {
        assert!(matches!(body(&wb, data, a1), FormulaBody::Normal { .. }));
        assert_eq!(formula(&wb, data, a1), expected);
    }
    assert!(wb.sheet(data).unwrap().cell(at("C4")).is_none());
}

#[test]
fn shared_group_follows_edits_on_other_sheets() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let calc = wb.add_sheet("Calc").unwrap();
    let si = wb
        .sheet_mut(calc)
        .unwrap()
        .set_shared_formula(r("A1:A3"), f("Data!B1"))
        .unwrap();

    wb.insert_rows(data, 0, 1).unwrap();

    let FormulaBody::SharedMaster { si: master_si, range, .. } = body(&wb, calc, "A1") else {
        panic!("A1 is no longer the group's master");
    };
    assert_eq!((master_si, range), (si, r("A1:A3")));
    assert_eq!(formula(&wb, calc, "A1"), "Data!B2");
    assert_eq!(formula(&wb, calc, "A3"), "Data!B4");
}

#[test]
fn outline_groups_move_with_inserted_rows() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.group_rows(data, 4, 6).unwrap();
    assert_eq!(wb.set_row_group_collapsed(data, 5, true).unwrap(), Some((4, 6)));

    wb.insert_rows(data, 0, 2).unwrap();

    let sheet = wb.sheet(data).unwrap();
    assert_eq!(sheet.row_outline_level(4), 0);
    assert_eq!(sheet.row_outline_level(6), 1);
    assert_eq!(sheet.row_outline_level(8), 1);
    assert_eq!(sheet.outline().rows.group_containing(7), Some((6, 8)));
    assert!(sheet.outline().rows.entry(7).hidden.outline);
}

#[test]
fn removed_formula_keeps_its_cached_text() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.set_formula(data, at("A1"), f("\"a\"&\"b\"")).unwrap();
    wb.sheet_mut(data)
        .unwrap()
        .set_cached_value(at("A1"), sheetml_model::CachedValue::String("ab".into()));

    assert!(wb.remove_formula(data, at("A1")).unwrap());
    let cell = wb.sheet(data).unwrap().cell(at("A1")).unwrap();
    assert!(matches!(cell.content, CellContent::SharedString(_)));
    assert_eq!(
        wb.cell_text(data, at("A1")).unwrap().map(|t| t.plain_text()),
        Some("ab")
    );
}
