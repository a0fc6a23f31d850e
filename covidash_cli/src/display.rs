use comfy_table::{presets::NOTHING, *};

use covidash::config::SourceAttribution;
use covidash::Covidash;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
}

fn align_numbers_right(table: &mut Table, from: usize) {
    for idx in from..table.column_count() {
        if let Some(column) = table.column_mut(idx) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
}

/// Supported countries with their population. Countries missing from the population source are
/// still listed.
pub fn display_countries(covidash: &Covidash) -> anyhow::Result<()> {
    let mut table = new_table(vec!["Country", "Male", "Female", "Total"]);
    for country in covidash.supported().iter() {
        match covidash.population().get(country) {
            Some(record) => table.add_row(vec![
                country.to_string(),
                record.male.to_string(),
                record.female.to_string(),
                record.total.to_string(),
            ]),
            None => table.add_row(vec![country, "-", "-", "-"]),
        };
    }
    align_numbers_right(&mut table, 1);
    println!("\n{}", table);
    Ok(())
}

pub fn display_summary(covidash: &Covidash) -> anyhow::Result<()> {
    let mut table = new_table(vec![
        "Country",
        "3-day avg",
        "7-day avg",
        "14-day avg",
        "3-day incidence",
        "7-day incidence",
        "14-day incidence",
        "Partially vaccinated (%)",
        "Fully vaccinated (%)",
    ]);
    for (country, metrics) in covidash.metrics().iter() {
        table.add_row(vec![
            country.to_string(),
            optional(metrics.three_day_avg_infections),
            optional(metrics.seven_day_avg_infections),
            optional(metrics.fourteen_day_avg_infections),
            optional(metrics.three_day_incidence),
            optional(metrics.seven_day_incidence),
            optional(metrics.fourteen_day_incidence),
            optional(metrics.partial_vaccination_percentage),
            optional(metrics.full_vaccination_percentage),
        ]);
    }
    align_numbers_right(&mut table, 1);
    println!("\n{}", table);
    Ok(())
}

pub fn display_sources(sources: &[SourceAttribution]) -> anyhow::Result<()> {
    let mut table = new_table(vec!["Dataset", "Source", "URL"]);
    for source in sources {
        table.add_row(vec![
            source.category.to_string(),
            source.institution.clone(),
            source.url.clone(),
        ]);
    }
    println!("\n{}", table);
    Ok(())
}
