//! Synthetic record generator
//!
//! Produces exactly `num_records` records from the configured field kinds.
//! A fixed `seed` makes the output reproducible.

use super::RecordSource;
use crate::config::schema::{FieldKind, GeneratorConfig};
use crate::domain::errors::SurgeError;
use crate::domain::record::{Record, Value};
use crate::domain::Result;
use chrono::{DateTime, Duration, Utc};
use fake::faker::address::en::{BuildingNumber, CityName, CountryName, StreetName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// 2000-01-01T00:00:00Z
const EARLIEST_SECS: i64 = 946_684_800;
/// 2030-01-01T00:00:00Z
const LATEST_SECS: i64 = 1_893_456_000;

enum Column {
    Sequence(i64),
    Constant(Value),
    Random(FieldKind),
}

pub struct GeneratorSource {
    columns: Vec<Column>,
    rng: StdRng,
    produced: u64,
    total: u64,
}

impl GeneratorSource {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let columns = config
            .fields
            .iter()
            .map(|field| match &field.kind {
                FieldKind::Sequence { start } => Ok(Column::Sequence(*start)),
                FieldKind::Constant { value } => constant_value(value).map(Column::Constant),
                kind => Ok(Column::Random(kind.clone())),
            })
            .collect::<Result<Vec<_>>>()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            columns,
            rng,
            produced: 0,
            total: config.num_records,
        })
    }
}

fn constant_value(value: &toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::Text(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Text(dt.to_string()),
        other => Value::Json(serde_json::to_value(other).map_err(SurgeError::from)?),
    })
}

fn random_timestamp(rng: &mut StdRng) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + Duration::seconds(rng.gen_range(EARLIEST_SECS..LATEST_SECS))
}

fn random_value(kind: &FieldKind, rng: &mut StdRng) -> Value {
    match kind {
        FieldKind::Integer { min, max } => Value::Int(rng.gen_range(*min..=*max)),
        FieldKind::Float { min, max } => Value::Float(rng.gen_range(*min..=*max)),
        FieldKind::Boolean => Value::Bool(rng.gen()),
        FieldKind::Name => Value::Text(Name().fake_with_rng(rng)),
        FieldKind::FirstName => Value::Text(FirstName().fake_with_rng(rng)),
        FieldKind::LastName => Value::Text(LastName().fake_with_rng(rng)),
        FieldKind::Email => Value::Text(SafeEmail().fake_with_rng(rng)),
        FieldKind::Phone => Value::Text(PhoneNumber().fake_with_rng(rng)),
        FieldKind::Company => Value::Text(CompanyName().fake_with_rng(rng)),
        FieldKind::City => Value::Text(CityName().fake_with_rng(rng)),
        FieldKind::Country => Value::Text(CountryName().fake_with_rng(rng)),
        FieldKind::StreetAddress => {
            let number: String = BuildingNumber().fake_with_rng(rng);
            let street: String = StreetName().fake_with_rng(rng);
            Value::Text(format!("{number} {street}"))
        }
        FieldKind::Word => Value::Text(Word().fake_with_rng(rng)),
        FieldKind::Sentence {
            min_words,
            max_words,
        } => Value::Text(Sentence(*min_words..*max_words + 1).fake_with_rng(rng)),
        FieldKind::Date => Value::Date(random_timestamp(rng).date_naive()),
        FieldKind::Timestamp => Value::Timestamp(random_timestamp(rng)),
        FieldKind::Uuid => Value::Uuid(uuid::Builder::from_random_bytes(rng.gen()).into_uuid()),
        FieldKind::Choice { values } => values
            .choose(rng)
            .map(|v| Value::Text(v.clone()))
            .unwrap_or(Value::Null),
        // Resolved when the generator is built
        FieldKind::Sequence { .. } | FieldKind::Constant { .. } => Value::Null,
    }
}

impl RecordSource for GeneratorSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        if self.produced >= self.total {
            return Ok(None);
        }
        self.produced += 1;

        let rng = &mut self.rng;
        let values = self
            .columns
            .iter_mut()
            .map(|column| match column {
                Column::Sequence(next) => {
                    let value = Value::Int(*next);
                    *next += 1;
                    value
                }
                Column::Constant(value) => value.clone(),
                Column::Random(kind) => random_value(kind, rng),
            })
            .collect();
        Ok(Some(Record::new(values)))
    }

    fn total_count(&self) -> Option<u64> {
        Some(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FieldSpec;

    fn field(name: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            kind,
        }
    }

    fn config(seed: Option<u64>) -> GeneratorConfig {
        GeneratorConfig {
            num_records: 5,
            seed,
            fields: vec![
                field("id", FieldKind::Sequence { start: 10 }),
                field("age", FieldKind::Integer { min: 18, max: 65 }),
                field("email", FieldKind::Email),
                field(
                    "tier",
                    FieldKind::Choice {
                        values: vec!["gold".into(), "silver".into()],
                    },
                ),
                field(
                    "source",
                    FieldKind::Constant {
                        value: toml::Value::String("synthetic".into()),
                    },
                ),
                field("created_at", FieldKind::Timestamp),
                field("external_id", FieldKind::Uuid),
            ],
        }
    }

    fn drain(source: &mut GeneratorSource) -> Vec<Record> {
        let mut records = Vec::new();
        while let Some(record) = source.next_record().unwrap() {
            records.push(record);
        }
        records
    }

    #[test]
    fn test_produces_exact_count() {
        let mut source = GeneratorSource::new(&config(None)).unwrap();
        assert_eq!(source.total_count(), Some(5));
        let records = drain(&mut source);
        assert_eq!(records.len(), 5);
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn test_field_values() {
        let mut source = GeneratorSource::new(&config(Some(7))).unwrap();
        let records = drain(&mut source);

        for (i, record) in records.iter().enumerate() {
            let values = record.values();
            assert_eq!(values.len(), 7);
            assert_eq!(values[0], Value::Int(10 + i as i64));
            match &values[1] {
                Value::Int(age) => assert!((18..=65).contains(age)),
                other => panic!("unexpected age: {other:?}"),
            }
            match &values[2] {
                Value::Text(email) => assert!(email.contains('@')),
                other => panic!("unexpected email: {other:?}"),
            }
            assert!(matches!(&values[3], Value::Text(t) if t == "gold" || t == "silver"));
            assert_eq!(values[4], Value::Text("synthetic".into()));
            assert!(matches!(values[5], Value::Timestamp(_)));
            assert!(matches!(values[6], Value::Uuid(_)));
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let first = drain(&mut GeneratorSource::new(&config(Some(42))).unwrap());
        let second = drain(&mut GeneratorSource::new(&config(Some(42))).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_records() {
        let mut cfg = config(Some(1));
        cfg.num_records = 0;
        let mut source = GeneratorSource::new(&cfg).unwrap();
        assert_eq!(source.total_count(), Some(0));
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn test_structured_constant_becomes_json() {
        let mut table = toml::map::Map::new();
        table.insert("plan".into(), toml::Value::String("pro".into()));
        let value = constant_value(&toml::Value::Table(table)).unwrap();
        assert_eq!(value, Value::Json(serde_json::json!({"plan": "pro"})));
    }
}
