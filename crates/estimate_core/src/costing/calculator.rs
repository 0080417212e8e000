//! Activity cost calculator.

use crate::model::activity::Activity;
use crate::model::cost::{CalculatedCosts, CostComponents};
use crate::model::money::Cents;

/// Splits `source` into cost buckets according to `activity`.
///
/// Labor is wage + burden + overhead. Buckets excluded by the activity's
/// inclusion policy are zero, and the total is the sum of the three
/// buckets. `Activity::Other` applies the full remove-and-replace policy;
/// callers should flag it as a data-quality signal.
pub fn calculate_costs(source: &CostComponents, activity: Activity) -> CalculatedCosts {
    let inclusion = activity.inclusion();
    let pick = |included: bool, amount: Cents| if included { amount } else { Cents::ZERO };

    CalculatedCosts::from_buckets(
        pick(inclusion.labor, source.labor_total()),
        pick(inclusion.material, source.material_or_zero()),
        pick(inclusion.equipment, source.equipment_or_zero()),
    )
}

#[cfg(test)]
mod tests {
    use super::calculate_costs;
    use crate::model::activity::Activity;
    use crate::model::cost::CostComponents;
    use crate::model::money::Cents;

    fn sample() -> CostComponents {
        CostComponents {
            workers_wage: Some(Cents::from_dollars(100)),
            labor_burden: Some(Cents::from_dollars(20)),
            labor_overhead: Some(Cents::from_dollars(10)),
            material: Some(Cents::from_dollars(50)),
            equipment: Some(Cents::from_dollars(30)),
        }
    }

    #[test]
    fn repair_includes_labor_and_material() {
        let costs = calculate_costs(&sample(), Activity::Repair);
        assert_eq!(costs.labor_cost(), Cents::from_dollars(130));
        assert_eq!(costs.material_cost(), Cents::from_dollars(50));
        assert_eq!(costs.equipment_cost(), Cents::ZERO);
        assert_eq!(costs.total_cost(), Cents::from_dollars(180));
    }

    #[test]
    fn each_activity_matches_inclusion_table() {
        let cases = [
            (Activity::RemoveAndReplace, 130, 50, 30),
            (Activity::Remove, 130, 0, 0),
            (Activity::Replace, 130, 0, 30),
            (Activity::DetachAndReset, 130, 0, 0),
            (Activity::Materials, 0, 50, 0),
            (Activity::Repair, 130, 50, 0),
            (Activity::InstallOnly, 130, 0, 30),
            (Activity::Other, 130, 50, 30),
        ];

        for (activity, labor, material, equipment) in cases {
            let costs = calculate_costs(&sample(), activity);
            assert_eq!(costs.labor_cost(), Cents::from_dollars(labor), "{activity}");
            assert_eq!(costs.material_cost(), Cents::from_dollars(material), "{activity}");
            assert_eq!(costs.equipment_cost(), Cents::from_dollars(equipment), "{activity}");
            assert_eq!(
                costs.total_cost(),
                Cents::from_dollars(labor + material + equipment),
                "{activity}"
            );
        }
    }

    #[test]
    fn empty_components_yield_zero_split() {
        let costs = calculate_costs(&CostComponents::default(), Activity::RemoveAndReplace);
        assert_eq!(costs.total_cost(), Cents::ZERO);
    }
}
