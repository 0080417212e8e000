use estimate_core::{
    calculate_costs, extract_cost_components, Activity, CalculatedCosts, Cents, CostComponents,
    RawCostRow,
};
use proptest::prelude::*;

fn cents() -> impl Strategy<Value = Option<Cents>> {
    prop::option::of((0i64..10_000_000).prop_map(Cents::new))
}

fn components() -> impl Strategy<Value = CostComponents> {
    (cents(), cents(), cents(), cents(), cents()).prop_map(
        |(workers_wage, labor_burden, labor_overhead, material, equipment)| CostComponents {
            workers_wage,
            labor_burden,
            labor_overhead,
            material,
            equipment,
        },
    )
}

fn activity() -> impl Strategy<Value = Activity> {
    prop::sample::select(Activity::ALL.to_vec())
}

proptest! {
    #[test]
    fn total_is_sum_of_buckets(source in components(), activity in activity()) {
        let costs = calculate_costs(&source, activity);
        prop_assert_eq!(
            costs.total_cost(),
            costs.labor_cost() + costs.material_cost() + costs.equipment_cost()
        );
    }

    #[test]
    fn excluded_buckets_are_zero(source in components(), activity in activity()) {
        let inclusion = activity.inclusion();
        let costs = calculate_costs(&source, activity);
        if !inclusion.labor {
            prop_assert_eq!(costs.labor_cost(), Cents::ZERO);
        }
        if !inclusion.material {
            prop_assert_eq!(costs.material_cost(), Cents::ZERO);
        }
        if !inclusion.equipment {
            prop_assert_eq!(costs.equipment_cost(), Cents::ZERO);
        }
    }

    #[test]
    fn materials_carries_material_only(source in components()) {
        let costs = calculate_costs(&source, Activity::Materials);
        prop_assert_eq!(costs.labor_cost(), Cents::ZERO);
        prop_assert_eq!(costs.equipment_cost(), Cents::ZERO);
        prop_assert_eq!(costs.total_cost(), source.material_or_zero());
    }

    #[test]
    fn equivalent_activities_price_identically(source in components()) {
        prop_assert_eq!(
            calculate_costs(&source, Activity::Remove),
            calculate_costs(&source, Activity::DetachAndReset)
        );
        prop_assert_eq!(
            calculate_costs(&source, Activity::Replace),
            calculate_costs(&source, Activity::InstallOnly)
        );
        prop_assert_eq!(
            calculate_costs(&source, Activity::Other),
            calculate_costs(&source, Activity::RemoveAndReplace)
        );
    }

    #[test]
    fn calculation_is_deterministic(source in components(), activity in activity()) {
        prop_assert_eq!(calculate_costs(&source, activity), calculate_costs(&source, activity));
    }

    #[test]
    fn unknown_codes_fall_back_to_full_inclusion(code in "zz[a-z_]{1,10}") {
        let activity = Activity::from_code(&code);
        prop_assert!(activity.is_fallback());
        prop_assert_eq!(activity.inclusion(), Activity::RemoveAndReplace.inclusion());
    }
}

#[test]
fn repair_row_end_to_end() {
    let row: RawCostRow = serde_json::from_str(
        r#"{
            "lineNo": 15,
            "description": "Patch drywall",
            "activity": "REPAIR",
            "workersWage": 10000,
            "laborBurden": 2000,
            "laborOverhead": 1000,
            "material": 5000,
            "equipment": 3000
        }"#,
    )
    .expect("json row should parse");

    let activity = Activity::from_code(row.activity.as_deref().unwrap_or_default());
    let costs = calculate_costs(&extract_cost_components(&row), activity);

    assert_eq!(
        costs,
        CalculatedCosts::from_buckets(
            Cents::from_dollars(130),
            Cents::from_dollars(50),
            Cents::ZERO
        )
    );
    assert_eq!(costs.total_cost(), Cents::from_dollars(180));
}

#[test]
fn empty_row_prices_to_zero() {
    let row: RawCostRow = serde_json::from_str("{}").expect("json row should parse");
    let components = extract_cost_components(&row);

    assert_eq!(components, CostComponents::default());
    for activity in Activity::ALL {
        assert_eq!(calculate_costs(&components, activity), CalculatedCosts::ZERO);
    }
}

#[test]
fn symbol_and_code_lookups_agree() {
    for activity in Activity::ALL {
        assert_eq!(Activity::from_code(activity.code()), activity);
        if let Some(symbol) = activity.symbol() {
            assert_eq!(Activity::from_symbol(symbol), activity);
        }
    }
    assert_eq!(Activity::from_symbol("?"), Activity::Other);
}
