use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use moveleads::marketplace::PropertySize;
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_property_size(raw: &str) -> Result<PropertySize, String> {
    PropertySize::from_label(raw).ok_or_else(|| {
        let known: Vec<&str> = PropertySize::ALL.iter().map(|size| size.label()).collect();
        format!("unknown property size '{raw}', expected one of {}", known.join(", "))
    })
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
