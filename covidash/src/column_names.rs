//! Column names of the upstream sources and of the tables this crate writes. Source names must be
//! kept in sync with the upstream feeds.

// Infection and recovery time series: one row per (province, country), one column per date
pub const CASES_COUNTRY: &str = "Country/Region";
pub const CASES_PROVINCE: &str = "Province/State";
pub const CASES_LATITUDE: &str = "Lat";
pub const CASES_LONGITUDE: &str = "Long";

// Vaccination time series: one row per (country, date)
pub const VACCINATION_COUNTRY: &str = "Country_Region";
pub const VACCINATION_DATE: &str = "Date";
pub const VACCINATION_PARTIAL: &str = "People_partially_vaccinated";
pub const VACCINATION_FULL: &str = "People_fully_vaccinated";

// Population estimates, also the schema of the population cache file
pub const POPULATION_LOCATION: &str = "Location";
pub const POPULATION_TIME: &str = "Time";
pub const POPULATION_VARIANT: &str = "Variant";
pub const POPULATION_MALE: &str = "PopMale";
pub const POPULATION_FEMALE: &str = "PopFemale";
pub const POPULATION_TOTAL: &str = "PopTotal";

// Derived metrics table
pub const COUNTRY: &str = "Country";
pub const THREE_DAY_AVG_INFECTIONS: &str = "three_day_avg_infections";
pub const SEVEN_DAY_AVG_INFECTIONS: &str = "seven_day_avg_infections";
pub const FOURTEEN_DAY_AVG_INFECTIONS: &str = "fourteen_day_avg_infections";
pub const THREE_DAY_INCIDENCE: &str = "three_day_incidence";
pub const SEVEN_DAY_INCIDENCE: &str = "seven_day_incidence";
pub const FOURTEEN_DAY_INCIDENCE: &str = "fourteen_day_incidence";
pub const PARTIAL_VACCINATION_PERCENTAGE: &str = "partial_vaccination_percentage";
pub const FULL_VACCINATION_PERCENTAGE: &str = "full_vaccination_percentage";
