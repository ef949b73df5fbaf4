use std::collections::{BTreeSet, HashMap};

use wage_recon::config::PipelineConfig;
use wage_recon::domain::{Cell, RawTable};
use wage_recon::pipeline::processing::normalize::SchemaNormalizer;
use wage_recon::pipeline::processing::wage_unit::annualize;
use wage_recon::pipeline::{PipelineState, ReconciliationPipeline};

const H1B_HEADERS: [&str; 7] = [
    "CASE_STATUS",
    "RECEIVED_DATE",
    "EMPLOYER_NAME",
    "SOC_CODE",
    "SOC_TITLE",
    "WAGE_RATE_OF_PAY_FROM",
    "WAGE_UNIT_OF_PAY",
];

fn table(name: &str, headers: &[&str], rows: &[Vec<&str>]) -> RawTable {
    RawTable::new(
        name,
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|v| Cell::from_raw(v)).collect())
            .collect(),
    )
}

fn h1b_row<'a>(status: &'a str, code: &'a str, wage: &'a str, unit: &'a str) -> Vec<&'a str> {
    vec![status, "2023-05-15", "Microsoft Corporation", code, "Some Title", wage, unit]
}

fn oews(rows: &[Vec<&str>]) -> RawTable {
    table(
        "oews",
        &["SOC Code", "Washington statewide occupational title", "Annual mean wage"],
        rows,
    )
}

#[test]
fn end_to_end_small_case() {
    let observations = table(
        "h1b",
        &H1B_HEADERS,
        &[
            h1b_row("Certified", "15-1132.00", "90000", "Year"),
            h1b_row("Certified", "15-1132.00", "110000", "Year"),
        ],
    );
    let references = oews(&[vec!["15-1132", "Software developers, applications", "95000"]]);

    let mut pipeline = ReconciliationPipeline::new(PipelineConfig::default());
    let output = pipeline.run(&observations, &references).unwrap();

    assert_eq!(output.reconciled.len(), 1);
    let row = &output.reconciled[0];
    assert_eq!(row.occupation_code, "15-1132");
    assert_eq!(row.annual_wage, 110000.0);
    assert_eq!(row.wage_diff, Some(15000.0));
    assert_eq!(pipeline.state(), &PipelineState::Done);
}

#[test]
fn status_scenario() {
    let observations = table(
        "h1b",
        &H1B_HEADERS,
        &[
            h1b_row("certified ", "15-1132.00", "100000", "Year"),
            h1b_row("DENIED", "13-2011.00", "100000", "Year"),
            h1b_row("", "17-2071.00", "100000", "Year"),
        ],
    );
    let references = oews(&[
        vec!["15-1132", "Software developers", "95000"],
        vec!["13-2011", "Accountants", "80000"],
        vec!["17-2071", "Electrical engineers", "105000"],
    ]);

    let mut pipeline = ReconciliationPipeline::new(PipelineConfig::default());
    let output = pipeline.run(&observations, &references).unwrap();

    let codes: Vec<_> = output.observations.iter().map(|o| o.occupation_code.as_str()).collect();
    assert_eq!(codes, vec!["15-1132"]);
    assert_eq!(output.references.len(), 1);
}

#[test]
fn code_canonicalization_scenario() {
    let observations = table(
        "h1b",
        &H1B_HEADERS,
        &[
            h1b_row("Certified", "15-1132.00", "100000", "Year"),
            h1b_row("Certified", "  29-1021.01 ", "120000", "Year"),
        ],
    );
    let normalized = SchemaNormalizer::with_renames(&PipelineConfig::default().observation.renames)
        .normalize(&observations)
        .unwrap();
    let codes: Vec<_> = normalized.records.iter().map(|r| r.occupation_code.as_str()).collect();
    assert_eq!(codes, vec!["15-1132", "29-1021"]);
}

#[test]
fn unit_conversion_exactness() {
    assert_eq!(annualize(10.0, Some("hour")), 20800.0);
    assert_eq!(annualize(1000.0, Some("week")), 52000.0);
    assert_eq!(annualize(5000.0, Some("month")), 60000.0);
    assert_eq!(annualize(75000.0, Some("year")), 75000.0);
    assert_eq!(annualize(75000.0, Some("")), 75000.0);
    assert_eq!(annualize(75000.0, Some("fortnight")), 75000.0);
    assert_eq!(annualize(75000.0, None), 75000.0);
}

fn mixed_inputs() -> (RawTable, RawTable) {
    let observations = table(
        "h1b",
        &H1B_HEADERS,
        &[
            h1b_row("Certified", "15-1252.00", "150000", "Year"),
            h1b_row("Certified", "15-1252.00", "175000", "Year"),
            h1b_row("Certified", "15-1252.00", "$160,000", "Year"),
            h1b_row("Certified", "15-1211.00", "60", "Hour"),
            h1b_row("Certified", "15-1211.00", "9000", "Month"),
            h1b_row("Certified", "11-3021.00", "400000", "Year"),
            h1b_row("Certified", "43-4051.00", "8", "Hour"),
            h1b_row("Certified", "17-2061.00", "2500", "Week"),
            h1b_row("Certified", "13-1111.00", "N/A", "Year"),
            h1b_row("Certified", "15-2051.00", "140000", "Bi-Weekly"),
        ],
    );
    let references = oews(&[
        vec!["15-1252", "Software developers", "165000"],
        vec!["15-1211", "Computer systems analysts", "118000"],
        vec!["17-2061", "Computer hardware engineers", "*"],
        vec!["15-2051", "Data scientists", "151000"],
        vec!["11-3021", "Computer and information systems managers", "210000"],
        vec!["99-0000", "Not in observations", "50000"],
    ]);
    (observations, references)
}

#[test]
fn range_filter_totality_and_dedup_uniqueness() {
    let (observations, references) = mixed_inputs();
    let mut pipeline = ReconciliationPipeline::new(PipelineConfig::default());
    let output = pipeline.run(&observations, &references).unwrap();

    for obs in &output.observations {
        assert!((20000.0..=300000.0).contains(&obs.annual_wage), "{obs:?}");
    }

    let mut per_code: HashMap<&str, usize> = HashMap::new();
    for obs in &output.observations {
        *per_code.entry(obs.occupation_code.as_str()).or_default() += 1;
    }
    assert!(per_code.values().all(|&n| n == 1));

    let by_code: HashMap<_, _> = output
        .observations
        .iter()
        .map(|o| (o.occupation_code.as_str(), o.annual_wage))
        .collect();
    assert_eq!(by_code["15-1252"], 175000.0);
    // 60/hour = 124800 beats 9000/month = 108000
    assert_eq!(by_code["15-1211"], 124800.0);
    assert_eq!(by_code["17-2061"], 130000.0);
    // unrecognized unit passes the amount through as annual
    assert_eq!(by_code["15-2051"], 140000.0);
    assert!(!by_code.contains_key("11-3021"));
    assert!(!by_code.contains_key("43-4051"));
    assert!(!by_code.contains_key("13-1111"));
}

#[test]
fn join_correctness() {
    let (observations, references) = mixed_inputs();
    let mut pipeline = ReconciliationPipeline::new(PipelineConfig::default());
    let output = pipeline.run(&observations, &references).unwrap();

    let obs_codes: BTreeSet<_> = output.observations.iter().map(|o| o.occupation_code.clone()).collect();
    let ref_codes: BTreeSet<_> = output.references.iter().map(|r| r.occupation_code.clone()).collect();
    let both: BTreeSet<_> = obs_codes.intersection(&ref_codes).cloned().collect();

    assert!(!output.reconciled.is_empty());
    for row in &output.reconciled {
        assert!(!row.occupation_code.is_empty());
        assert!(both.contains(&row.occupation_code));
        let diff = row.wage_diff.unwrap();
        assert!((diff - (row.annual_wage - row.avg_local_wage)).abs() < 1e-6);
    }

    let joined: BTreeSet<_> = output.reconciled.iter().map(|r| r.occupation_code.clone()).collect();
    assert_eq!(joined, both);
    // suppressed survey wage and code outside the universe never reach the join
    assert!(!ref_codes.contains("17-2061"));
    assert!(!ref_codes.contains("99-0000"));
}

#[test]
fn mean_policy_averages_each_group() {
    let (observations, references) = mixed_inputs();
    let mut config = PipelineConfig::default();
    config.observation.dedup_policy = wage_recon::pipeline::processing::resolve::DedupPolicy::Mean;
    let mut pipeline = ReconciliationPipeline::new(config);
    let output = pipeline.run(&observations, &references).unwrap();

    let dev = output
        .observations
        .iter()
        .find(|o| o.occupation_code == "15-1252")
        .unwrap();
    assert!((dev.annual_wage - (150000.0 + 175000.0 + 160000.0) / 3.0).abs() < 1e-6);

    let analyst = output
        .observations
        .iter()
        .find(|o| o.occupation_code == "15-1211")
        .unwrap();
    assert!((analyst.annual_wage - (124800.0 + 108000.0) / 2.0).abs() < 1e-6);
}

#[test]
fn inputs_are_not_modified() {
    let (observations, references) = mixed_inputs();
    let before = (observations.clone(), references.clone());
    let mut pipeline = ReconciliationPipeline::new(PipelineConfig::default());
    pipeline.run(&observations, &references).unwrap();
    assert_eq!((observations, references), before);
}

#[test]
fn normalizing_canonical_tables_is_a_no_op() {
    let (observations, _) = mixed_inputs();
    let normalizer = SchemaNormalizer::with_renames(&PipelineConfig::default().observation.renames);
    let once = normalizer.normalize(&observations).unwrap();
    let twice = normalizer.normalize(&once.to_raw()).unwrap();
    assert_eq!(once.columns, twice.columns);
    assert_eq!(once.records, twice.records);
}
