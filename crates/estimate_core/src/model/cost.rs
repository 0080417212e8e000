//! Cost value objects shared by the extractor and calculator.
//!
//! # Responsibility
//! - Define the strict raw-row input and the normalized component set.
//! - Define the derived cost split whose total cannot be assigned directly.
//!
//! # Invariants
//! - `CalculatedCosts::total_cost == labor + material + equipment`, always.
//! - Absent components stay `None` until arithmetic, where they count as zero.
//! - Validated amounts lie in `0..=MAX_COMPONENT_CENTS`.

use crate::model::line_item::LineItemValidationError;
use crate::model::money::Cents;
use serde::{Deserialize, Serialize};

/// Largest accepted single cost field: $1,000,000,000,000.00.
///
/// Five fields at this bound still sum far below `i64::MAX`, so bucket and
/// total arithmetic on validated input cannot overflow.
pub const MAX_COMPONENT_CENTS: Cents = Cents::from_dollars(1_000_000_000_000);

/// One imported estimate row as handed over by the import workflow.
///
/// Every field is optional; missing JSON keys deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCostRow {
    pub line_no: Option<u32>,
    pub description: Option<String>,
    /// Activity storage code, e.g. `REPAIR`.
    pub activity: Option<String>,
    pub workers_wage: Option<Cents>,
    pub labor_burden: Option<Cents>,
    pub labor_overhead: Option<Cents>,
    pub material: Option<Cents>,
    pub equipment: Option<Cents>,
}

/// Raw cost components of one line item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostComponents {
    pub workers_wage: Option<Cents>,
    pub labor_burden: Option<Cents>,
    pub labor_overhead: Option<Cents>,
    pub material: Option<Cents>,
    pub equipment: Option<Cents>,
}

impl CostComponents {
    /// Wage + burden + overhead, absent parts counted as zero.
    pub fn labor_total(&self) -> Cents {
        [self.workers_wage, self.labor_burden, self.labor_overhead]
            .into_iter()
            .map(|part| part.unwrap_or(Cents::ZERO))
            .sum()
    }

    pub fn material_or_zero(&self) -> Cents {
        self.material.unwrap_or(Cents::ZERO)
    }

    pub fn equipment_or_zero(&self) -> Cents {
        self.equipment.unwrap_or(Cents::ZERO)
    }

    /// Rejects negative components and components above
    /// [`MAX_COMPONENT_CENTS`].
    ///
    /// Callers at the input boundary run this before calculation; the
    /// calculator itself assumes validated input.
    pub fn validate(&self) -> Result<(), LineItemValidationError> {
        check_amounts([
            ("workers_wage", self.workers_wage),
            ("labor_burden", self.labor_burden),
            ("labor_overhead", self.labor_overhead),
            ("material", self.material),
            ("equipment", self.equipment),
        ])
    }
}

/// Activity-specific cost split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedCosts {
    labor_cost: Cents,
    material_cost: Cents,
    equipment_cost: Cents,
    total_cost: Cents,
}

impl CalculatedCosts {
    /// Zero split, used for note-only entries.
    pub const ZERO: CalculatedCosts = CalculatedCosts {
        labor_cost: Cents::ZERO,
        material_cost: Cents::ZERO,
        equipment_cost: Cents::ZERO,
        total_cost: Cents::ZERO,
    };

    /// Builds a split from its three buckets; the total is derived here only.
    pub fn from_buckets(labor_cost: Cents, material_cost: Cents, equipment_cost: Cents) -> Self {
        Self {
            labor_cost,
            material_cost,
            equipment_cost,
            total_cost: labor_cost + material_cost + equipment_cost,
        }
    }

    pub fn labor_cost(&self) -> Cents {
        self.labor_cost
    }

    pub fn material_cost(&self) -> Cents {
        self.material_cost
    }

    pub fn equipment_cost(&self) -> Cents {
        self.equipment_cost
    }

    pub fn total_cost(&self) -> Cents {
        self.total_cost
    }

    /// Replaces individual buckets with caller overrides and re-derives the total.
    pub fn with_overrides(&self, overrides: &CostOverrides) -> Self {
        Self::from_buckets(
            overrides.labor_cost.unwrap_or(self.labor_cost),
            overrides.material_cost.unwrap_or(self.material_cost),
            overrides.equipment_cost.unwrap_or(self.equipment_cost),
        )
    }
}

/// Per-bucket manual overrides entered by a reviewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostOverrides {
    pub labor_cost: Option<Cents>,
    pub material_cost: Option<Cents>,
    pub equipment_cost: Option<Cents>,
}

impl CostOverrides {
    pub fn is_empty(&self) -> bool {
        self.labor_cost.is_none() && self.material_cost.is_none() && self.equipment_cost.is_none()
    }

    /// Same bounds as [`CostComponents::validate`].
    pub fn validate(&self) -> Result<(), LineItemValidationError> {
        check_amounts([
            ("labor_cost", self.labor_cost),
            ("material_cost", self.material_cost),
            ("equipment_cost", self.equipment_cost),
        ])
    }
}

fn check_amounts<const N: usize>(
    fields: [(&'static str, Option<Cents>); N],
) -> Result<(), LineItemValidationError> {
    for (field, value) in fields {
        let Some(value) = value else {
            continue;
        };
        if value.is_negative() {
            return Err(LineItemValidationError::NegativeComponent { field, value });
        }
        if value > MAX_COMPONENT_CENTS {
            return Err(LineItemValidationError::ComponentTooLarge { field, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CalculatedCosts, CostComponents, CostOverrides, RawCostRow, MAX_COMPONENT_CENTS};
    use crate::model::activity::Activity;
    use crate::model::line_item::LineItemValidationError;
    use crate::model::money::Cents;

    #[test]
    fn raw_row_missing_fields_deserialize_to_none() {
        let row: RawCostRow =
            serde_json::from_str(r#"{"workersWage": 1000, "material": null}"#)
                .expect("partial cost row should parse");
        assert_eq!(row.workers_wage, Some(Cents::new(1000)));
        assert_eq!(row.material, None);
        assert_eq!(row.equipment, None);
        assert_eq!(row.line_no, None);
    }

    #[test]
    fn labor_total_treats_absent_parts_as_zero() {
        let components = CostComponents {
            workers_wage: Some(Cents::new(500)),
            labor_overhead: Some(Cents::new(25)),
            ..CostComponents::default()
        };
        assert_eq!(components.labor_total(), Cents::new(525));
        assert_eq!(components.material_or_zero(), Cents::ZERO);
    }

    #[test]
    fn validate_rejects_negative_component() {
        let components = CostComponents {
            equipment: Some(Cents::new(-1)),
            ..CostComponents::default()
        };
        let err = components.validate().unwrap_err();
        assert!(matches!(
            err,
            LineItemValidationError::NegativeComponent {
                field: "equipment",
                ..
            }
        ));
    }

    #[test]
    fn validate_bounds_components_at_max() {
        let at_bound = CostComponents {
            workers_wage: Some(MAX_COMPONENT_CENTS),
            labor_burden: Some(MAX_COMPONENT_CENTS),
            labor_overhead: Some(MAX_COMPONENT_CENTS),
            material: Some(MAX_COMPONENT_CENTS),
            equipment: Some(MAX_COMPONENT_CENTS),
        };
        at_bound.validate().expect("amounts at the bound are accepted");
        let costs = crate::costing::calculate_costs(&at_bound, Activity::RemoveAndReplace);
        assert_eq!(costs.total_cost(), Cents::new(MAX_COMPONENT_CENTS.raw() * 5));

        let overflowing = CostComponents {
            workers_wage: Some(Cents::new(i64::MAX)),
            labor_burden: Some(Cents::new(1)),
            ..CostComponents::default()
        };
        let err = overflowing
            .validate()
            .expect_err("amounts above the bound are rejected");
        assert!(matches!(
            err,
            LineItemValidationError::ComponentTooLarge {
                field: "workers_wage",
                ..
            }
        ));

        let overrides = CostOverrides {
            equipment_cost: Some(Cents::new(MAX_COMPONENT_CENTS.raw() + 1)),
            ..CostOverrides::default()
        };
        assert!(matches!(
            overrides.validate(),
            Err(LineItemValidationError::ComponentTooLarge {
                field: "equipment_cost",
                ..
            })
        ));
    }

    #[test]
    fn overrides_replace_buckets_and_rederive_total() {
        let base = CalculatedCosts::from_buckets(Cents::new(100), Cents::new(50), Cents::new(30));
        let adjusted = base.with_overrides(&CostOverrides {
            material_cost: Some(Cents::new(10)),
            ..CostOverrides::default()
        });
        assert_eq!(adjusted.material_cost(), Cents::new(10));
        assert_eq!(adjusted.total_cost(), Cents::new(140));
    }
}
