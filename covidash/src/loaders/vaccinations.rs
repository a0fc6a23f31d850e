//! Vaccination counts, published as one row per (country, date) and pivoted into two
//! Country x date tables.

use log::info;
use polars::prelude::*;

use super::{canonicalize_and_filter, read_csv, require_columns};
use crate::config::DatasetCategory;
use crate::country::SupportedCountries;
use crate::date::DateKey;
use crate::error::CovidashResult;
use crate::fetch::SourceFetcher;
use crate::table::TimeSeriesTable;
use crate::COL;

const CATEGORY: DatasetCategory = DatasetCategory::Vaccinations;
const SOURCE_DATE_DELIMITER: char = '-';

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VaccinationTables {
    /// Cumulative number of people with at least one dose
    pub partial: TimeSeriesTable,
    /// Cumulative number of people fully vaccinated
    pub full: TimeSeriesTable,
}

pub struct VaccinationLoader;

impl VaccinationLoader {
    pub async fn load(
        &self,
        fetcher: &SourceFetcher,
        location: &str,
        supported: &SupportedCountries,
    ) -> CovidashResult<VaccinationTables> {
        let bytes = fetcher.fetch_table(CATEGORY, location).await?;
        self.parse(bytes, supported)
    }

    pub fn parse(
        &self,
        bytes: Vec<u8>,
        supported: &SupportedCountries,
    ) -> CovidashResult<VaccinationTables> {
        let df = read_csv(CATEGORY, bytes)?;
        require_columns(
            CATEGORY,
            &df,
            &[
                COL::VACCINATION_COUNTRY,
                COL::VACCINATION_DATE,
                COL::VACCINATION_PARTIAL,
                COL::VACCINATION_FULL,
            ],
        )?;

        let df = canonicalize_and_filter(df, COL::VACCINATION_COUNTRY, supported)?;
        let df = df
            .lazy()
            .select([
                col(COL::VACCINATION_COUNTRY),
                col(COL::VACCINATION_DATE).cast(DataType::String),
                col(COL::VACCINATION_PARTIAL).cast(DataType::Float64),
                col(COL::VACCINATION_FULL).cast(DataType::Float64),
            ])
            .group_by([col(COL::VACCINATION_COUNTRY), col(COL::VACCINATION_DATE)])
            .agg([
                col(COL::VACCINATION_PARTIAL).sum(),
                col(COL::VACCINATION_FULL).sum(),
            ])
            .collect()?;
        info!("Grouped vaccination data with shape: {:?}", df.shape());

        let parse_date = |raw: &str| DateKey::from_ymd_token(raw, SOURCE_DATE_DELIMITER);
        Ok(VaccinationTables {
            partial: TimeSeriesTable::from_long_frame(
                &df,
                COL::VACCINATION_COUNTRY,
                COL::VACCINATION_DATE,
                COL::VACCINATION_PARTIAL,
                parse_date,
            )?,
            full: TimeSeriesTable::from_long_frame(
                &df,
                COL::VACCINATION_COUNTRY,
                COL::VACCINATION_DATE,
                COL::VACCINATION_FULL,
                parse_date,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CovidashError;

    const GOVEX: &str = "\
Country_Region,Date,Doses_admin,People_partially_vaccinated,People_fully_vaccinated,Report_Date_String,UID,Province_State
Austria,2021-01-02,300,250,50,2021-01-02,40,
Austria,2020-12-31,100,100,0,2020-12-31,40,
Russia,2021-01-01,1000,900,100,2021-01-01,643,
Czechia,2021-01-02,10,8,2,2021-01-02,203,
Czechia,2021-01-02,20,,5,2021-01-02,203,Prague
Atlantis,2021-01-01,1,1,1,2021-01-01,0,
";

    fn supported() -> SupportedCountries {
        SupportedCountries::new(["Austria", "Czech Republic", "Russian Federation"])
    }

    #[test]
    fn rows_are_pivoted_into_partial_and_full_tables() {
        let tables = VaccinationLoader
            .parse(GOVEX.as_bytes().to_vec(), &supported())
            .unwrap();
        assert_eq!(
            tables.full.date_labels(),
            vec!["31/12/20", "01/01/21", "02/01/21"]
        );
        assert_eq!(tables.partial.date_labels(), tables.full.date_labels());
        assert_eq!(tables.partial.series("Austria").unwrap(), &[100.0, 0.0, 250.0]);
        assert_eq!(tables.full.series("Austria").unwrap(), &[0.0, 0.0, 50.0]);
        assert_eq!(tables.full.latest("Russian Federation"), Some(0.0));
        assert_eq!(
            tables.full.value("Russian Federation", &"01/01/21".parse().unwrap()),
            Some(100.0)
        );
        // Duplicate (country, date) rows are summed, blanks count as zero
        assert_eq!(tables.partial.latest("Czech Republic"), Some(8.0));
        assert_eq!(tables.full.latest("Czech Republic"), Some(7.0));
        assert!(!tables.full.contains("Atlantis"));
    }

    #[test]
    fn malformed_dates_are_format_errors() {
        let csv = "\
Country_Region,Date,People_partially_vaccinated,People_fully_vaccinated
Austria,02/01/2021,1,1
";
        let err = VaccinationLoader
            .parse(csv.as_bytes().to_vec(), &supported())
            .unwrap_err();
        assert!(matches!(err, CovidashError::Format(_)));
    }
}
