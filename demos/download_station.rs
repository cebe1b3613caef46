use isd_lite::{IsdLite, IsdLiteError, StationId, Variable, YearRange};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), IsdLiteError> {
    let client = IsdLite::new().await?;
    let zurich: StationId = "066600-99999".parse()?;
    let years = YearRange::single(2023);

    // Ctrl-C stops the batch; archives already on disk stay valid.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let reports = client
        .download()
        .stations(&[zurich.clone()])
        .years(years)
        .cancel(cancel)
        .call()
        .await;
    for (year, report) in &reports {
        println!(
            "{year}: {} downloaded, {} up to date, {} failed",
            report.downloaded(),
            report.skipped(),
            report.failures().count()
        );
    }

    let catalog = client.station_catalog().call().await?.filter_by_id(&[zurich]);
    let dataset = client
        .load_observations()
        .stations(catalog.stations())
        .years(years)
        .call()
        .await?;

    let temperature = dataset.variable(Variable::Temperature);
    for (i, time) in dataset.times().iter().take(24).enumerate() {
        println!("{time}  T = {:?}", temperature.get(i, 0));
    }
    Ok(())
}
