// src/select/choices.rs
use serde::Serialize;

/// One dropdown entry for UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    fn new(value: &str) -> Choice {
        Choice {
            label: value.replace('_', " "),
            value: value.to_string(),
        }
    }
}

const REGIONS: &[&str] = &[
    "america",
    "developed",
    "developed_ex_us",
    "europe",
    "japan",
    "asia_pacific_ex_japan",
    "north_america",
    "emerging",
];

const AMERICA_FACTORS: &[&str] = &[
    "F-F_Research_Data_Factors",
    "F-F_Research_Data_Factors_daily",
    "F-F_Research_Data_5_Factors_2x3",
    "F-F_Momentum_Factor",
];

const AMERICA_PORTFOLIOS: &[&str] = &[
    "Portfolios_Formed_on_ME",
    "Portfolios_Formed_on_BE-ME",
    "Portfolios_Formed_on_OP",
    "Portfolios_Formed_on_INV",
    "6_Portfolios_2x3",
    "25_Portfolios_5x5",
    "100_Portfolios_10x10",
];

const WEIGHTINGS: &[&str] = &["value", "equal"];

/// Pure lookup over the static catalogs, narrowing one level per supplied
/// argument: regions, then factor datasets for a region, then the portfolio
/// datasets when `is_portfolio` is set, then weighting conventions once a
/// portfolio is chosen.
pub fn factor_choices(
    region: Option<&str>,
    factor: Option<&str>,
    is_portfolio: bool,
    portfolio: Option<&str>,
) -> Vec<Choice> {
    if portfolio.is_some() {
        return WEIGHTINGS.iter().map(|w| Choice::new(w)).collect();
    }
    let Some(region) = region else {
        return REGIONS.iter().map(|r| Choice::new(r)).collect();
    };
    let region = region.to_lowercase();

    if is_portfolio && factor.is_some() {
        // portfolios exist only for the US library section
        if region == "america" {
            return AMERICA_PORTFOLIOS.iter().map(|p| Choice::new(p)).collect();
        }
        return Vec::new();
    }

    match region.as_str() {
        "america" => AMERICA_FACTORS.iter().map(|f| Choice::new(f)).collect(),
        // the emerging section publishes no 3-factor file and uppercases MOM
        "emerging" => vec![
            Choice::new("Emerging_5_Factors"),
            Choice::new("Emerging_MOM_Factor"),
        ],
        r if REGIONS.contains(&r) => {
            let stem = titlecase_region(r);
            vec![
                Choice::new(&format!("{stem}_3_Factors")),
                Choice::new(&format!("{stem}_5_Factors")),
                Choice::new(&format!("{stem}_Mom_Factor")),
            ]
        }
        _ => Vec::new(),
    }
}

fn titlecase_region(region: &str) -> String {
    region
        .split('_')
        .map(|part| match part {
            "ex" => "ex".to_string(),
            "us" => "US".to_string(),
            other => {
                let mut chars = other.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}
