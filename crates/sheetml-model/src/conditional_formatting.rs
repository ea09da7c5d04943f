use serde::{Deserialize, Serialize};
use sheetml_formula::{Formula, FormulaShifter, Range, RangeParseError, RangeShift, ShiftError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellIsOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    Between,
    NotBetween,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CfRuleKind {
    CellIs {
        operator: CellIsOperator,
        formulas: Vec<Formula>,
    },
    Expression {
        formula: Formula,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CfRule {
    pub priority: u32,
    /// Differential format applied when the rule matches.
    pub dxf_id: Option<u32>,
    #[serde(default)]
    pub stop_if_true: bool,
    pub kind: CfRuleKind,
}

impl CfRule {
    pub fn formulas(&self) -> &[Formula] {
        match &self.kind {
            CfRuleKind::CellIs { formulas, .. } => formulas,
            CfRuleKind::Expression { formula } => std::slice::from_ref(formula),
        }
    }

    pub(crate) fn formulas_mut(&mut self) -> &mut [Formula] {
        match &mut self.kind {
            CfRuleKind::CellIs { formulas, .. } => formulas,
            CfRuleKind::Expression { formula } => std::slice::from_mut(formula),
        }
    }
}

/// A `<conditionalFormatting>` block: rules sharing one `sqref`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFormatting {
    pub applies_to: Vec<Range>,
    pub rules: Vec<CfRule>,
}

impl ConditionalFormatting {
    pub fn new(applies_to: Vec<Range>, rules: Vec<CfRule>) -> Self {
        Self { applies_to, rules }
    }

    pub fn applies_to_cell(&self, cell: sheetml_formula::CellRef) -> bool {
        self.applies_to.iter().any(|r| r.contains(cell))
    }

    /// This block after the shifter's edit, or `None` if all of its cells were deleted.
    ///
    /// `sheet` is the tab index of the owning sheet; its ranges only move when
    /// it is the edited sheet, but rule formulas may point at any sheet.
    pub(crate) fn plan_edit(
        &self,
        shifter: &FormulaShifter<'_>,
        sheet: usize,
    ) -> Result<Option<ConditionalFormatting>, ShiftError> {
        let mut planned = self.clone();
        if sheet == shifter.edit().sheet {
            planned.applies_to.clear();
            for range in &self.applies_to {
                match shifter.shift_range(*range)? {
                    RangeShift::Unchanged => planned.applies_to.push(*range),
                    RangeShift::Moved(moved) => planned.applies_to.push(moved),
                    RangeShift::Deleted => {}
                }
            }
            if planned.applies_to.is_empty() {
                log::debug!(
                    "conditional formatting {} removed by {:?}",
                    format_sqref(&self.applies_to),
                    shifter.edit().kind
                );
                return Ok(None);
            }
        }
        for rule in &mut planned.rules {
            for formula in rule.formulas_mut() {
                if let Some(shifted) = shifter.shift_formula(formula, Some(sheet))? {
                    *formula = shifted;
                }
            }
        }
        Ok(Some(planned))
    }
}

/// Parse a SpreadsheetML `sqref` attribute (`A1`, `A1:B2`, `A1 A3:B7`).
pub fn parse_sqref(sqref: &str) -> Result<Vec<Range>, RangeParseError> {
    sqref.split_whitespace().map(Range::from_a1).collect()
}

/// Format ranges as a space separated `sqref` attribute.
pub fn format_sqref(ranges: &[Range]) -> String {
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
