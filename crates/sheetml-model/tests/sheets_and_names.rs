use pretty_assertions::assert_eq;
use sheetml_model::{
    validate_defined_name, CalcChain, CellRef, DefinedNameScope, DefinedNameValidationError,
    Formula, ModelError, NameKind, SheetNameError, Workbook, EXCEL_DEFINED_NAME_MAX_LEN,
    XLNM_FILTER_DATABASE, XLNM_PRINT_AREA, XLNM_PRINT_TITLES,
};

fn at(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap()
}

#[test]
fn validate_defined_name_accepts_common_and_builtin_names() {
    for name in [
        "MyRange",
        "_MyRange",
        "Name1",
        "Name.With.Dots",
        r"\BackslashStart",
        XLNM_PRINT_AREA,
        XLNM_PRINT_TITLES,
        XLNM_FILTER_DATABASE,
    ] {
        assert_eq!(
            validate_defined_name(name),
            Ok(()),
            "name should be valid: {name}"
        );
    }
}

#[test]
fn validate_defined_name_rejects_invalid_names() {
    assert_eq!(
        validate_defined_name("   "),
        Err(DefinedNameValidationError::Empty)
    );
    assert_eq!(
        validate_defined_name("A1"),
        Err(DefinedNameValidationError::LooksLikeCellReference)
    );
    assert_eq!(
        validate_defined_name(".Name"),
        Err(DefinedNameValidationError::InvalidStartCharacter('.'))
    );
    assert_eq!(
        validate_defined_name("My Name"),
        Err(DefinedNameValidationError::InvalidCharacter { ch: ' ', index: 2 })
    );

    let too_long = "a".repeat(EXCEL_DEFINED_NAME_MAX_LEN + 1);
    assert!(matches!(
        validate_defined_name(&too_long),
        Err(DefinedNameValidationError::TooLong { .. })
    ));
}

#[test]
fn names_are_unique_per_scope_ignoring_case() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.create_name(DefinedNameScope::Workbook, "Total", "=Data!$A$1")
        .unwrap();
    wb.create_name(DefinedNameScope::Sheet(data), "TOTAL", "$B$1")
        .unwrap();

    assert_eq!(
        wb.create_name(DefinedNameScope::Workbook, "total", "1"),
        Err(ModelError::DuplicateName {
            kind: NameKind::DefinedName,
            name: "total".to_string(),
        })
    );
    assert_eq!(
        wb.name(DefinedNameScope::Sheet(data), "Total")
            .unwrap()
            .refers_to
            .to_string(),
        "$B$1"
    );

    let removed = wb.remove_name(DefinedNameScope::Workbook, "TOTAL").unwrap();
    assert_eq!(removed.refers_to, Formula::parse("Data!$A$1").unwrap());
    assert_eq!(wb.names().len(), 1);
}

#[test]
fn sheet_scoped_names_need_an_existing_sheet() {
    let mut wb = Workbook::new();
    assert!(matches!(
        wb.create_name(DefinedNameScope::Sheet(99), "Local", "$A$1"),
        Err(ModelError::SheetNotFound(_))
    ));
    assert!(matches!(
        wb.create_name(DefinedNameScope::Workbook, "Broken", "\"unterminated"),
        Err(ModelError::InvalidFormula(_))
    ));
    assert!(wb.names().is_empty());
}

#[test]
fn sheet_names_are_validated_and_unique() {
    let mut wb = Workbook::new();
    wb.add_sheet("Summary").unwrap();

    assert_eq!(
        wb.add_sheet("summary"),
        Err(ModelError::DuplicateName {
            kind: NameKind::Sheet,
            name: "summary".to_string(),
        })
    );
    assert_eq!(
        wb.add_sheet("Q1/Q2"),
        Err(ModelError::InvalidSheetName(SheetNameError::InvalidCharacter('/')))
    );
    assert_eq!(
        wb.add_sheet("'Quoted'"),
        Err(ModelError::InvalidSheetName(SheetNameError::EdgeApostrophe))
    );
    assert!(matches!(
        wb.add_sheet("x".repeat(32)),
        Err(ModelError::InvalidSheetName(SheetNameError::TooLong { len: 32, max: 31 }))
    ));
    assert_eq!(wb.sheet_names(), vec!["Summary".to_string()]);
}

#[test]
fn renaming_a_sheet_rewrites_quoted_references() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let calc = wb.add_sheet("Calc").unwrap();
    wb.set_formula(calc, at("A1"), Formula::parse("SUM(Data!A1:B2)+Calc!C1").unwrap())
        .unwrap();
    wb.create_name(DefinedNameScope::Sheet(calc), "Src", "Data!$A$1")
        .unwrap();

    wb.rename_sheet(data, "Raw Data").unwrap();

    assert_eq!(wb.sheet_index("raw data"), Some(0));
    let sheet = wb.sheet(calc).unwrap();
    assert_eq!(
        sheet.effective_formula(at("A1")).unwrap().unwrap().to_string(),
        "SUM('Raw Data'!A1:B2)+Calc!C1"
    );
    assert_eq!(
        wb.name(DefinedNameScope::Sheet(calc), "src")
            .unwrap()
            .refers_to
            .to_string(),
        "'Raw Data'!$A$1"
    );
}

#[test]
fn removing_a_sheet_drops_its_names_and_chain_entries() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    let calc = wb.add_sheet("Calc").unwrap();
    wb.set_formula(data, at("A1"), Formula::parse("1").unwrap())
        .unwrap();
    wb.set_formula(calc, at("A1"), Formula::parse("2").unwrap())
        .unwrap();
    wb.create_name(DefinedNameScope::Sheet(data), "Local", "$A$1")
        .unwrap();
    wb.create_name(DefinedNameScope::Workbook, "Global", "Calc!$A$1")
        .unwrap();
    let mut chain = CalcChain::new();
    chain.push(data, at("A1"));
    chain.push(calc, at("A1"));
    wb.set_calc_chain(Some(chain));

    let removed = wb.remove_sheet(data).unwrap();
    assert_eq!(removed.name(), "Data");
    assert!(wb.sheet(data).is_none());
    assert_eq!(wb.names().len(), 1);
    assert_eq!(wb.names()[0].name, "Global");
    let chain = wb.calc_chain().unwrap();
    assert_eq!(chain.len(), 1);
    assert!(chain.contains(calc, at("A1")));

    // Ids are never reused.
    let again = wb.add_sheet("Data").unwrap();
    assert_ne!(again, data);
}

#[test]
fn workbook_round_trips_through_json() {
    let mut wb = Workbook::new();
    let data = wb.add_sheet("Data").unwrap();
    wb.set_cell_text(data, at("A1"), "hello").unwrap();
    wb.sheet_mut(data)
        .unwrap()
        .set_shared_formula(
            sheetml_model::Range::from_a1("B1:B3").unwrap(),
            Formula::parse("A1&\"!\"").unwrap(),
        )
        .unwrap();
    wb.create_name(DefinedNameScope::Workbook, "Greeting", "Data!$A$1")
        .unwrap();

    let json = serde_json::to_string(&wb).unwrap();
    let decoded: Workbook = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, wb);

    let sheet = decoded.sheet(data).unwrap();
    assert_eq!(
        sheet.effective_formula(at("B3")).unwrap().unwrap().to_string(),
        "A3&\"!\""
    );
}
