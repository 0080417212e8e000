//! Field selection from an imported estimate row.

use crate::model::cost::{CostComponents, RawCostRow};

/// Copies the five cost fields of `row`, keeping absent fields as `None`.
///
/// No coercion or validation happens here; callers hand in rows whose
/// amounts are already parsed.
pub fn extract_cost_components(row: &RawCostRow) -> CostComponents {
    CostComponents {
        workers_wage: row.workers_wage,
        labor_burden: row.labor_burden,
        labor_overhead: row.labor_overhead,
        material: row.material,
        equipment: row.equipment,
    }
}
