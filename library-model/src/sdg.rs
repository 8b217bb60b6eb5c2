use std::ops::RangeInclusive;

use crate::{SDG_MAX, SDG_MIN};

/// Titles of the 17 Sustainable Development Goals, index 0 is SDG 1.
pub const SDG_TITLES: [&str; 17] = [
    "No Poverty",
    "Zero Hunger",
    "Good Health and Well-being",
    "Quality Education",
    "Gender Equality",
    "Clean Water and Sanitation",
    "Affordable and Clean Energy",
    "Decent Work and Economic Growth",
    "Industry, Innovation, and Infrastructure",
    "Reduced Inequalities",
    "Sustainable Cities and Communities",
    "Responsible Consumption and Production",
    "Climate Action",
    "Life Below Water",
    "Life on Land",
    "Peace, Justice and Strong Institutions",
    "Partnerships for the Goals",
];

pub fn sdg_numbers() -> RangeInclusive<u8> {
    SDG_MIN..=SDG_MAX
}

pub fn is_sdg_number(n: i64) -> bool {
    (SDG_MIN as i64..=SDG_MAX as i64).contains(&n)
}

pub fn sdg_title(number: u8) -> Option<&'static str> {
    if !is_sdg_number(number as i64) {
        return None;
    }
    SDG_TITLES.get(number as usize - 1).copied()
}
