use std::path::Path;

use medcite_search::check_citations;

use super::BatchRecord;

/// Re-run the citation validator over a saved batch file and report any
/// PMIDs cited outside the retrieved evidence.
pub fn run(input: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(input)?;
    let records: Vec<BatchRecord> = serde_json::from_str(&raw)?;

    let mut clean = true;
    for record in &records {
        if let Some(fabricated) = check_citations(&record.answer, &record.citations) {
            clean = false;
            println!("{}: ungrounded PMIDs: {:?}", record.name, fabricated);
        }
    }
    if clean {
        println!("All {} answer(s) fully grounded", records.len());
    }
    Ok(())
}
