//! Record shapes for the two collections
//!
//! Every entity field is optional: the collections carry no required-field
//! validation, so a record may hold any subset of its declared fields.

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// An entity shape served as one CRUD resource
pub trait Resource:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + Unpin + 'static
{
    /// Collection the records live in
    const COLLECTION: &'static str;
    /// Base path of the HTTP resource
    const BASE_PATH: &'static str;
    /// Environment variable carrying the store connection string
    const URI_ENV: &'static str;
    /// Name used in log lines and the health payload
    const SERVICE: &'static str;
    /// Display names for messages ("Task not found", "Failed to fetch tasks")
    const TITLE: &'static str;
    const SINGULAR: &'static str;
    const PLURAL: &'static str;
    /// Whether the store stamps `createdAt`/`updatedAt`
    const TIMESTAMPS: bool;
    /// Wire names of the declared top-level fields
    const FIELDS: &'static [&'static str];
}

/// An update: fields to overwrite, plus declared fields the body cleared
///
/// A field sent as `null` (or a number sent as `""`) is stored as null rather
/// than being left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch<T> {
    pub set: T,
    pub unset: Vec<String>,
}

impl<T: Resource> Patch<T> {
    pub fn from_json(body: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let sent: Vec<String> = body
            .keys()
            .filter(|key| T::FIELDS.contains(&key.as_str()))
            .cloned()
            .collect();

        let set: T = serde_json::from_value(Value::Object(body))?;
        let written = serde_json::to_value(&set)?;
        let unset = sent
            .into_iter()
            .filter(|key| written.get(key).is_none())
            .collect();

        Ok(Self { set, unset })
    }
}

/// A stored record: the store-assigned id, the entity fields and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: T,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Model details picked for a task's product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedModel {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity: Option<String>,
    /// Warranty duration
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub warranty: Option<Number>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyStatus {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry_date: Option<String>,
}

/// A service-call task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub complaint_number: Option<String>,

    // Customer
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub alt_phone: Option<String>,

    // Address
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub city: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub pincode: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub landmark: Option<String>,

    // Product
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<SelectedModel>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty_status: Option<WarrantyStatus>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub purchase_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub installation_date: Option<String>,

    // Call
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub call_source: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_status: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub assign_engineer: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub contact_no: Option<String>,

    // Dealer / ASP
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub dealer: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub asp: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub asp_name: Option<String>,

    // Resolution
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub action_taken: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub customer_feedback: Option<String>,
    /// Wire name keeps the clients' existing spelling
    #[serde(
        rename = "enginnerNotes",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub engineer_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub complaint_notes: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_status: Option<String>,
}

impl Resource for Task {
    const COLLECTION: &'static str = "tasks";
    const BASE_PATH: &'static str = "/tasks";
    const URI_ENV: &'static str = "MONGODB_URI";
    const SERVICE: &'static str = "tasks";
    const TITLE: &'static str = "Task";
    const SINGULAR: &'static str = "task";
    const PLURAL: &'static str = "tasks";
    const TIMESTAMPS: bool = true;
    const FIELDS: &'static [&'static str] = &[
        "complaintNumber",
        "name",
        "email",
        "phone",
        "altPhone",
        "state",
        "city",
        "pincode",
        "location",
        "landmark",
        "product",
        "selectedModel",
        "serialNumber",
        "warrantyStatus",
        "purchaseDate",
        "installationDate",
        "callType",
        "condition",
        "callSource",
        "taskStatus",
        "assignEngineer",
        "contactNo",
        "dealer",
        "date",
        "asp",
        "aspName",
        "actionTaken",
        "customerFeedback",
        "enginnerNotes",
        "images",
        "status",
        "complaintNotes",
        "additionalStatus",
    ];
}

/// A stock movement entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub part_code: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub product: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_stock: Option<Number>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub stock_in: Option<Number>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub stock_out: Option<Number>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<Number>,
}

impl Resource for InventoryItem {
    const COLLECTION: &'static str = "inventories";
    const BASE_PATH: &'static str = "/api/inventory";
    const URI_ENV: &'static str = "MONGO_URI";
    const SERVICE: &'static str = "inventory";
    const TITLE: &'static str = "Item";
    const SINGULAR: &'static str = "item";
    const PLURAL: &'static str = "items";
    const TIMESTAMPS: bool = false;
    const FIELDS: &'static [&'static str] = &[
        "date",
        "partCode",
        "product",
        "model",
        "capacity",
        "currentStock",
        "stockIn",
        "stockOut",
        "total",
    ];
}

/// Casts numbers and booleans to their string form; `null` is absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientString;

    impl<'de> Visitor<'de> for LenientString {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, number or boolean")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_owned()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        // Display drops the fraction of whole floats: 10.0 -> "10"
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
    }

    deserializer.deserialize_option(LenientString)
}

/// Accepts numbers and numeric strings; `null` and `""` are absent.
/// Whole values are kept as integers so `3` serializes back as `3`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientNumber;

    impl<'de> Visitor<'de> for LenientNumber {
        type Value = Option<Number>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or a numeric string")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(Number::from(v)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Number::from(v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                return Ok(Some(Number::from(v as i64)));
            }
            Number::from_f64(v)
                .map(Some)
                .ok_or_else(|| E::custom(format!("{v} is not a finite number")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if let Ok(n) = trimmed.parse::<i64>() {
                return Ok(Some(Number::from(n)));
            }
            match trimmed.parse::<f64>() {
                Ok(f) => self.visit_f64(f),
                Err(_) => Err(E::custom(format!("cast to number failed for \"{v}\""))),
            }
        }
    }

    deserializer.deserialize_option(LenientNumber)
}
