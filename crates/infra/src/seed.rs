//! Demo dataset for local runs.

use chrono::{DateTime, Days, Utc};

use garagebook_fleet::{CustomerDetails, InterventionDetails, Plate, VehicleDetails};

use crate::error::WorkshopResult;
use crate::store::UnitOfWork;

struct DemoCustomer {
    name: &'static str,
    national_id: &'static str,
    phone: &'static str,
    town: &'static str,
    vehicles: &'static [DemoVehicle],
}

struct DemoVehicle {
    plate: &'static str,
    make: &'static str,
    model: &'static str,
    year: i32,
    odometer_km: i64,
    work: &'static [(&'static str, f64, f64)],
}

const DEMO: &[DemoCustomer] = &[
    DemoCustomer {
        name: "Marta Soler",
        national_id: "12345678Z",
        phone: "600111222",
        town: "Valencia",
        vehicles: &[DemoVehicle {
            plate: "1234ABC",
            make: "Seat",
            model: "Ibiza",
            year: 2017,
            odometer_km: 84_500,
            work: &[
                ("Oil and filter change", 65.0, 0.5),
                ("Front brake pads", 120.0, 1.5),
            ],
        }],
    },
    DemoCustomer {
        name: "Jordi Puig",
        national_id: "87654321X",
        phone: "600333444",
        town: "Castellón",
        vehicles: &[
            DemoVehicle {
                plate: "5678DEF",
                make: "Renault",
                model: "Clio",
                year: 2015,
                odometer_km: 132_000,
                work: &[("Timing belt replacement", 420.0, 4.0)],
            },
            DemoVehicle {
                plate: "9012GHJ",
                make: "Ford",
                model: "Transit",
                year: 2020,
                odometer_km: 61_200,
                work: &[
                    ("Annual service", 180.0, 2.0),
                    ("Tyre rotation", 35.0, 0.5),
                ],
            },
        ],
    },
    DemoCustomer {
        name: "Talleres Benicalap S.L.",
        national_id: "B46000001",
        phone: "963000000",
        town: "Valencia",
        vehicles: &[],
    },
];

/// Inserts the demo dataset unless the store already holds customers.
///
/// Returns whether anything was inserted.
pub async fn seed_demo(tx: &mut dyn UnitOfWork, now: DateTime<Utc>) -> WorkshopResult<bool> {
    if !tx.customers().await?.is_empty() {
        return Ok(false);
    }

    let today = now.date_naive();
    for demo in DEMO {
        let customer = tx
            .insert_customer(
                CustomerDetails {
                    national_id: Some(demo.national_id.to_string()),
                    phone: Some(demo.phone.to_string()),
                    town: Some(demo.town.to_string()),
                    ..CustomerDetails::named(demo.name)
                },
                now,
            )
            .await?;

        for car in demo.vehicles {
            let details = VehicleDetails {
                make: Some(car.make.to_string()),
                model: Some(car.model.to_string()),
                year: Some(car.year),
                owner_id: Some(customer.id),
                ..VehicleDetails::new(Plate::parse(car.plate)?)
            };
            let vehicle = tx.insert_vehicle(details, now).await?;

            for (days_ago, (description, price, hours)) in car.work.iter().enumerate() {
                let date = today
                    .checked_sub_days(Days::new(7 * (days_ago as u64 + 1)))
                    .unwrap_or(today);
                let details = InterventionDetails {
                    odometer_km: Some(car.odometer_km),
                    customer_id: Some(customer.id),
                    labor_hours: *hours,
                    ..InterventionDetails::new(date, *description, *price)
                };
                tx.insert_intervention(vehicle.id, details).await?;
            }
        }
    }

    tracing::info!(customers = DEMO.len(), "seeded demo data");
    Ok(true)
}
