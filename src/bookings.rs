//! Train seat inventory for the bookings dataset.
//!
//! Passenger records are booked against the inventory in arrival order.
//! A confirmed booking decrements the train's available seats and enriches
//! the record with the train fare so the revenue measure can be computed.

use crate::analysis::RecordHook;
use crate::error::{BatchError, BatchResult};
use crate::models::{Record, RejectReason, Rejected, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub const TRAIN_FIELD: &str = "Train ID";
pub const TICKETS_FIELD: &str = "Number of Tickets";
/// Field added to confirmed bookings.
pub const FARE_FIELD: &str = "Total Fare";

/// One row of the inventory file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    #[serde(rename = "Train ID")]
    pub id: String,
    #[serde(rename = "Train Name")]
    pub name: String,
    #[serde(rename = "Source Station")]
    pub source_station: String,
    #[serde(rename = "Destination Station")]
    pub destination_station: String,
    #[serde(rename = "Total Seats")]
    pub total_seats: u32,
    #[serde(rename = "Available Seats")]
    pub available_seats: u32,
    #[serde(rename = "Total Fare")]
    pub fare: i64,
}

/// Seat inventory keyed by train id, in file order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    trains: Vec<Train>,
    index: HashMap<String, usize>,
    confirmed: usize,
    declined: usize,
}

impl Inventory {
    pub fn new(trains: Vec<Train>) -> BatchResult<Self> {
        let mut index = HashMap::new();
        for (i, train) in trains.iter().enumerate() {
            if train.available_seats > train.total_seats {
                return Err(BatchError::Inventory(format!(
                    "train {} has {} available of {} seats",
                    train.id, train.available_seats, train.total_seats
                )));
            }
            if index.insert(train.id.clone(), i).is_some() {
                return Err(BatchError::Inventory(format!(
                    "train {} listed twice",
                    train.id
                )));
            }
        }
        Ok(Self {
            trains,
            index,
            confirmed: 0,
            declined: 0,
        })
    }

    /// Load the inventory CSV.
    pub fn load(path: &Path) -> BatchResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| BatchError::source(path, e))?;

        let trains = reader
            .deserialize::<Train>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BatchError::Inventory(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded {} trains from {}", trains.len(), path.display());
        Self::new(trains)
    }

    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    pub fn get(&self, id: &str) -> Option<&Train> {
        self.index.get(id).map(|&i| &self.trains[i])
    }

    /// Bookings confirmed and declined so far.
    pub fn tally(&self) -> (usize, usize) {
        (self.confirmed, self.declined)
    }

    /// Reserve seats; returns the train's fare.
    pub fn book(&mut self, train_id: &str, tickets: u32) -> Result<i64, RejectReason> {
        let Some(&i) = self.index.get(train_id) else {
            self.declined += 1;
            return Err(RejectReason::UnknownReference {
                field: TRAIN_FIELD.to_string(),
                value: train_id.to_string(),
            });
        };

        let train = &mut self.trains[i];
        if train.available_seats < tickets {
            self.declined += 1;
            return Err(RejectReason::Unavailable {
                reason: format!(
                    "insufficient seats on train {}: requested {}, available {}",
                    train.id, tickets, train.available_seats
                ),
            });
        }

        train.available_seats -= tickets;
        self.confirmed += 1;
        Ok(train.fare)
    }

    /// Serialize the inventory back to CSV with the original columns.
    pub fn to_csv(&self) -> BatchResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for train in &self.trains {
            writer
                .serialize(train)
                .map_err(|e| BatchError::Inventory(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| BatchError::Inventory(e.to_string()))
    }
}

impl RecordHook for Inventory {
    fn apply(&mut self, record: Record) -> Result<Record, Rejected> {
        let reject = |reason| Rejected::new(record.origin().clone(), reason);

        let train_id = record
            .get(TRAIN_FIELD)
            .map(|v| v.to_string())
            .unwrap_or_default();
        let tickets = record
            .get(TICKETS_FIELD)
            .and_then(Value::as_f64)
            .filter(|t| *t >= 0.0 && *t <= u32::MAX as f64)
            .map(|t| t as u32)
            .ok_or_else(|| {
                reject(RejectReason::MissingField {
                    field: TICKETS_FIELD.to_string(),
                })
            })?;

        match self.book(&train_id, tickets) {
            Ok(fare) => {
                debug!("Booking confirmed on train {} ({} tickets)", train_id, tickets);
                Ok(record.with_field(FARE_FIELD, Value::Integer(fare)))
            }
            Err(reason) => {
                debug!("Booking declined: {}", reason);
                Err(reject(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BatchAggregator;
    use crate::models::{Origin, RawRecord};
    use crate::pipeline::{preset, DatasetKind};
    use std::fs;
    use tempfile::TempDir;

    const INVENTORY: &str = "\
Train ID,Train Name,Source Station,Destination Station,Total Seats,Available Seats,Total Fare
T100,Coastal Express,Mumbai,Goa,100,10,500
T200,Desert Queen,Jaipur,Jodhpur,50,2,300
";

    fn inventory() -> Inventory {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trains.csv");
        fs::write(&path, INVENTORY).unwrap();
        Inventory::load(&path).unwrap()
    }

    fn passenger(line: usize, name: &str, train: &str, tickets: &str) -> RawRecord {
        let fields = [
            ("Passenger Name", name),
            ("Train ID", train),
            ("Number of Tickets", tickets),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        RawRecord::fields(Origin::new("passengers.csv", line), fields)
    }

    #[test]
    fn test_load_inventory() {
        let inv = inventory();
        assert_eq!(inv.trains().len(), 2);
        assert_eq!(inv.get("T200").unwrap().name, "Desert Queen");
        assert_eq!(inv.get("T200").unwrap().fare, 300);
    }

    #[test]
    fn test_book_and_overbook() {
        let mut inv = inventory();
        assert_eq!(inv.book("T200", 2), Ok(300));
        assert_eq!(inv.get("T200").unwrap().available_seats, 0);

        let err = inv.book("T200", 1).unwrap_err();
        assert!(matches!(err, RejectReason::Unavailable { .. }));
        // Declined booking leaves seats unchanged
        assert_eq!(inv.get("T200").unwrap().available_seats, 0);

        assert!(matches!(
            inv.book("T999", 1),
            Err(RejectReason::UnknownReference { .. })
        ));
        assert_eq!(inv.tally(), (1, 2));
    }

    #[test]
    fn test_duplicate_train_rejected() {
        let train = Train {
            id: "T1".into(),
            name: "A".into(),
            source_station: "X".into(),
            destination_station: "Y".into(),
            total_seats: 10,
            available_seats: 5,
            fare: 100,
        };
        assert!(Inventory::new(vec![train.clone(), train.clone()]).is_err());

        let overfull = Train {
            available_seats: 11,
            ..train
        };
        assert!(Inventory::new(vec![overfull]).is_err());
    }

    #[test]
    fn test_bookings_batch_revenue() {
        let pipeline = preset(DatasetKind::Bookings).unwrap();
        let mut inv = inventory();

        let mut batch = BatchAggregator::new(&pipeline).with_hook(&mut inv);
        batch.extend(vec![
            passenger(2, "Asha", "T100", "3"),
            passenger(3, "Ravi", "T200", "3"),
            passenger(4, "Meera", "T200", "2"),
            passenger(5, "John", "T100", "2"),
            passenger(6, "Zoe", "T404", "1"),
            passenger(7, "Kim", "T100", "0"),
        ]);
        let outcome = batch.finish();

        assert_eq!(outcome.counts.total, 6);
        assert_eq!(outcome.counts.valid, 3);
        assert_eq!(outcome.counts.invalid, 3);

        let ranking = outcome.ranking(&pipeline);
        assert_eq!(ranking.entries[0].key, "T100");
        assert_eq!(ranking.entries[0].statistic, 2500.0);
        assert_eq!(ranking.entries[0].measure("tickets_sold"), Some(5.0));
        assert_eq!(ranking.entries[1].key, "T200");
        assert_eq!(ranking.entries[1].statistic, 600.0);

        assert_eq!(inv.get("T100").unwrap().available_seats, 5);
        assert_eq!(inv.get("T200").unwrap().available_seats, 0);
    }

    #[test]
    fn test_inventory_csv_roundtrip_keeps_columns() {
        let mut inv = inventory();
        inv.book("T100", 4).unwrap();
        let text = String::from_utf8(inv.to_csv().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), INVENTORY.lines().next());
        assert_eq!(
            lines.next(),
            Some("T100,Coastal Express,Mumbai,Goa,100,6,500")
        );
    }
}
