use chrono::NaiveDate;
use isd_lite::{IsdLite, IsdLiteError, ProbeMode, YearRange};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), IsdLiteError> {
    let client = IsdLite::new().await?;
    let years = YearRange::new(2018, 2020).unwrap();

    let catalog = client
        .station_catalog()
        .call()
        .await?
        .filter_by_us_state(&["CO"])
        .filter_by_period(
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
        );
    println!("{} candidate stations in Colorado", catalog.len());

    let build = client
        .build_dataset()
        .catalog(&catalog)
        .years(years)
        .mode(ProbeMode::Bulk)
        .region("CO".to_string())
        .call()
        .await?;

    let (times, stations) = build.dataset.shape();
    println!("Consolidated {times} timestamps x {stations} stations");
    for id in &build.dropped {
        println!("Dropped {id}: incomplete download");
    }

    let out = PathBuf::from("isd-lite-colorado");
    for path in client.write_dataset(&build.dataset, &out).await? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
