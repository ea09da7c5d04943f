use pretty_assertions::assert_eq;
use sheetml_formula::{
    CellRef, Formula, FormulaShifter, Range, RangeShift, SharedFormulaExpander, ShiftEdit,
    ShiftError, SpreadsheetVersion,
};

fn sheets() -> Vec<String> {
    vec!["Summary".to_string(), "Data 2024".to_string(), "Archive".to_string()]
}

fn shifted(text: &str, edit: ShiftEdit, ctx: Option<usize>) -> String {
    let sheets = sheets();
    let shifter = FormulaShifter::new(edit, &sheets, SpreadsheetVersion::Excel2007).unwrap();
    let formula = Formula::parse(text).unwrap();
    shifter
        .shift_formula(&formula, ctx)
        .unwrap()
        .unwrap_or(formula)
        .to_string()
}

#[test]
fn quoted_sheet_refs_follow_edits_on_their_sheet() {
    let edit = ShiftEdit::insert_rows(1, 0, 2);
    assert_eq!(
        shifted("SUM('Data 2024'!A1:A10)+'data 2024'!$B$3+A1", edit, Some(0)),
        "SUM('Data 2024'!A3:A12)+'data 2024'!$B$5+A1"
    );
}

#[test]
fn workbook_scoped_formulas_only_shift_qualified_refs() {
    let edit = ShiftEdit::delete_columns(0, 1, 1);
    assert_eq!(
        shifted("Summary!$C$1:$D$4+C1", edit, None),
        "Summary!$B$1:$C$4+C1"
    );
}

#[test]
fn deleting_every_referenced_column_yields_ref_error() {
    let edit = ShiftEdit::delete_columns(0, 0, 3);
    assert_eq!(shifted("SUM(B:C)+IF(A1>0,D1,E1)", edit, Some(0)), "SUM(#REF!)+IF(#REF!>0,#REF!,A1)");
}

#[test]
fn whole_row_refs_ignore_column_edits() {
    let edit = ShiftEdit::insert_columns(0, 0, 5);
    assert_eq!(shifted("SUM(2:4)+SUM(A:B)", edit, Some(0)), "SUM(2:4)+SUM(F:G)");
}

#[test]
fn moving_a_band_into_an_area_keeps_its_bounding_extent() {
    // Rows 1..=2 (A2:A3) move down 4 into rows 5..=6.
    let edit = ShiftEdit::move_rows(0, 1, 2, 4);
    assert_eq!(shifted("SUM(A5:A10)", edit, Some(0)), "SUM(A5:A10)");
    assert_eq!(shifted("SUM(A2:A3)", edit, Some(0)), "SUM(A6:A7)");
    assert_eq!(shifted("SUM(A6:A7)", edit, Some(0)), "SUM(#REF!)");
}

#[test]
fn overflow_leaves_formula_unchanged() {
    let sheets = sheets();
    let version = SpreadsheetVersion::Excel2007;
    let shifter = FormulaShifter::new(ShiftEdit::insert_columns(0, 0, 1), &sheets, version).unwrap();
    let formula = Formula::parse("A1+XFD1").unwrap();
    let err = shifter.shift_formula(&formula, Some(0)).unwrap_err();
    assert!(matches!(err, ShiftError::ReferenceShiftOverflow { limit: 16_383, .. }));
    assert_eq!(formula.to_string(), "A1+XFD1");
}

#[test]
fn ranges_shift_and_truncate() {
    let sheets = sheets();
    let version = SpreadsheetVersion::Excel2007;
    let shifter = FormulaShifter::new(ShiftEdit::delete_rows(0, 3, 5), &sheets, version).unwrap();

    assert_eq!(
        shifter.shift_range(Range::from_a1("A1:B2").unwrap()).unwrap(),
        RangeShift::Unchanged
    );
    assert_eq!(
        shifter.shift_range(Range::from_a1("A2:B8").unwrap()).unwrap(),
        RangeShift::Moved(Range::from_a1("A2:B5").unwrap())
    );
    assert_eq!(
        shifter.shift_range(Range::from_a1("C4:C6").unwrap()).unwrap(),
        RangeShift::Deleted
    );
    assert_eq!(shifter.shift_cell(CellRef::new(9, 0)).unwrap(), Some(CellRef::new(6, 0)));
}

#[test]
fn shared_formula_members_expand_from_the_anchor() {
    let expander = SharedFormulaExpander::new(SpreadsheetVersion::Excel2007);
    let master = Formula::parse("A1+B1").unwrap();
    let anchor = CellRef::from_a1("C1").unwrap();

    let member = expander.expand(&master, anchor, CellRef::from_a1("D2").unwrap());
    assert_eq!(member.to_string(), "B2+C2");

    let member = expander.expand(&master, anchor, CellRef::from_a1("C5").unwrap());
    assert_eq!(member.to_string(), "A5+B5");
}
