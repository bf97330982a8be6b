//! GHG and NOx tracking array reports
//!
//! Run with: cargo test -p j1939-84-tests --test tracking_test

use j1939_84::TrackingStep;
use j1939_84_tests::{first_field, TestBench};
use j1939_core::{FuelType, Outcome, VehicleInformation};
use pretty_assertions::assert_eq;

const VIN: &str = "3HSDZAPR5NN123456";

fn bench(year: u16, fuel: FuelType) -> TestBench {
    TestBench::with_vehicle(VehicleInformation::new(VIN, year, fuel)).obd(&[0x00])
}

#[tokio::test]
async fn test_hybrid_charge_depleting_table() {
    let mut bench = bench(2024, FuelType::HybridDiesel);
    bench.respond(vec![first_field(64244, 0x00, 29_120_000, 36)]);
    bench.mock.add_ds_response(64246, 0x00, [first_field(64246, 0x00, 1_680_000, 36)]);
    bench.mock.add_ds_response(64245, 0x00, [first_field(64245, 0x00, 2_240_000, 36)]);

    bench.run(&TrackingStep).await.unwrap();
    let results = bench.sink.results();
    let index = results
        .iter()
        .position(|r| r == "Hybrid Charge Depleting or Increasing Operation from Engine #1 (0)")
        .unwrap();
    let lines: Vec<&str> = results[index + 1].lines().collect();
    assert_eq!(lines[0], "|--------------------------------+-------------+-------------+-------------|");
    assert_eq!(lines[1], "|                                |    Active   |    Stored   |             |");
    assert_eq!(lines[2], "|                                |   100 Hour  |   100 Hour  |   Lifetime  |");
    assert_eq!(lines[4], "| Chg Depleting engine off,  km  |       1,680 |       2,240 |      29,120 |");
    assert_eq!(lines[5], "| Chg Depleting engine on,   km  |         N/A |         N/A |         N/A |");
    assert!(results[index + 1].ends_with("|\n\n"));

    let hybrid: Vec<String> = bench
        .sink
        .outcomes()
        .into_iter()
        .map(|o| o.message)
        .filter(|m| m.starts_with("6.1.26.8"))
        .collect();
    assert!(hybrid.is_empty(), "{:?}", hybrid);
}

#[tokio::test]
async fn test_missing_ghg_lifetime() {
    let mut bench = bench(2023, FuelType::Gasoline);
    bench.mock.add_ds_response(64254, 0x00, [first_field(64254, 0x00, 3_600, 50)]);
    bench.mock.add_ds_response(64253, 0x00, [first_field(64253, 0x00, 7_200, 50)]);

    bench.run(&TrackingStep).await.unwrap();
    assert_eq!(
        bench.sink.messages(Outcome::Fail),
        vec!["6.1.26.6.a - No response was received from Engine #1 (0)".to_string()]
    );
    assert_eq!(
        bench.sink.messages(Outcome::Warn),
        vec!["6.1.26.10.a - No response was received from Engine #1 (0)".to_string()]
    );

    let results = bench.sink.results();
    assert_eq!(results[0], "GHG Tracking from Engine #1 (0)");
    let lines: Vec<&str> = results[1].lines().collect();
    assert_eq!(lines[4], "| Engine Run Time, s             |       3,600 |       7,200 |             |");
    assert_eq!(lines[5], "| Vehicle Dist., km              |         N/A |         N/A |             |");
}

#[tokio::test]
async fn test_nox_binning_tables() {
    let mut bench = bench(2024, FuelType::Diesel);
    let mut bins: Vec<u8> = Vec::new();
    for bin in 1..=17u32 {
        bins.extend((bin * 5_000).to_le_bytes());
    }
    let tail_pipe = j1939_core::Packet::new(64262, 0x00, bins.clone());
    bench.respond(vec![tail_pipe]);
    bench
        .mock
        .add_ds_response(64264, 0x00, [j1939_core::Packet::new(64264, 0x00, bins)]);

    bench.run(&TrackingStep).await.unwrap();
    let nox_failures: Vec<String> = bench
        .sink
        .messages(Outcome::Fail)
        .into_iter()
        .filter(|m| m.starts_with("6.1.26.12"))
        .collect();
    assert_eq!(
        nox_failures,
        vec!["6.1.26.12.a - No response was received from Engine #1 (0)".to_string()]
    );

    let results = bench.sink.results();
    let index = results
        .iter()
        .position(|r| r == "NOx Binning from Engine #1 (0)")
        .unwrap();
    let lifetime: Vec<&str> = results[index + 1].lines().collect();
    assert!(lifetime[1].starts_with("| Lifetime             |   Tail Pipe |     Eng Out |"));
    assert_eq!(
        lifetime[4],
        "| Bin 1 (Total)        |           5 |             |             |             |             |             |"
    );
    assert_eq!(
        lifetime[5],
        "| Bin 2 (Idle)         |          10 |             |             |             |             |             |"
    );

    let active: Vec<&str> = results[index + 2].lines().collect();
    assert!(active[1].starts_with("| Active 100 Hour      |"));
    assert!(active[4].starts_with("| Bin 1 (Total)        |           5 |"));

    let stored: Vec<&str> = results[index + 3].lines().collect();
    assert!(stored[1].starts_with("| Stored 100 Hour      |"));
    assert!(stored[4].starts_with("| Bin 1 (Total)        |             |"));
}
