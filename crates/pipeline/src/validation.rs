//! Validation of raw meter data messages into typed requests.
//!
//! Each check is a plain function over the message object, and the two
//! request parsers are their composition. A check either yields the typed
//! value it is responsible for or the catalog error for the request.

use bvp_core::{format_duration, parse_duration, parse_horizon, HorizonWindow, MeterError, Window};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::{Map, Value};

pub const GET_METER_DATA_REQUEST: &str = "GetMeterDataRequest";
pub const POST_METER_DATA_REQUEST: &str = "PostMeterDataRequest";
pub const POWER_UNIT: &str = "MW";

type Message = Map<String, Value>;

/// Length of one programme time unit.
#[must_use]
pub fn ptu() -> Duration {
    Duration::minutes(15)
}

/// Longest window a single request may cover.
#[must_use]
pub fn max_window() -> Duration {
    Duration::days(366)
}

/// A data source named in a query, by id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Id(i64),
    Name(String),
}

/// A validated meter data query.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMeterDataRequest {
    pub unit: String,
    pub connection_groups: Vec<Vec<String>>,
    pub window: Window,
    pub resolution: Duration,
    pub horizon_window: HorizonWindow,
    pub rolling: bool,
    /// `None` when the request names no sources.
    pub sources: Option<Vec<SourceRef>>,
}

/// A validated meter data submission, values in the USEF sign convention.
#[derive(Debug, Clone, PartialEq)]
pub struct PostMeterDataRequest {
    pub unit: String,
    pub connection_groups: Vec<Vec<String>>,
    pub value_groups: Vec<Vec<f64>>,
    pub window: Window,
    pub horizon: Duration,
    pub rolling: bool,
}

/// Validates a `GetMeterDataRequest`.
///
/// Without a horizon the query accepts every ex-post observation.
///
/// # Errors
/// Returns the catalog error of the first failing check.
pub fn parse_get_request(message: &Value) -> Result<GetMeterDataRequest, MeterError> {
    let message = as_message(message)?;
    check_message_type(message, GET_METER_DATA_REQUEST)?;
    let unit = check_unit(message, POWER_UNIT)?;
    let resolution = optional_resolution(message, ptu())?;
    let connection_groups = connection_groups(message)?;
    let sources = optional_sources(message)?;
    let (earliest, rolling) = match optional_horizon(message)? {
        Some((horizon, rolling)) => (Some(horizon), rolling),
        None => (None, true),
    };
    let window = period(message)?;

    Ok(GetMeterDataRequest {
        unit,
        connection_groups,
        window,
        resolution,
        horizon_window: HorizonWindow::ex_post(earliest),
        rolling,
        sources,
    })
}

/// Validates a `PostMeterDataRequest`.
///
/// A missing horizon is inferred as the time from `now` to the end of the
/// window, applied per value.
///
/// # Errors
/// Returns the catalog error of the first failing check.
pub fn parse_post_request(
    message: &Value,
    now: DateTime<Utc>,
) -> Result<PostMeterDataRequest, MeterError> {
    let message = as_message(message)?;
    check_message_type(message, POST_METER_DATA_REQUEST)?;
    let unit = check_unit(message, POWER_UNIT)?;
    let connection_groups = connection_groups(message)?;
    let value_groups = value_groups(message)?;
    if value_groups.len() != connection_groups.len() {
        return Err(MeterError::PtusIncomplete(
            "Each connection group needs its own values.".to_string(),
        ));
    }
    let horizon = optional_horizon(message)?;
    let window = period(message)?;
    optional_resolution(message, ptu())?;
    check_ptu_grid(&window, &value_groups)?;

    let (horizon, rolling) = horizon.unwrap_or_else(|| (window.end() - now, false));
    if window.start.checked_add_signed(horizon).is_none() {
        return Err(MeterError::InvalidHorizon(
            "Horizon reaches outside the supported time range.".to_string(),
        ));
    }

    Ok(PostMeterDataRequest {
        unit,
        connection_groups,
        value_groups,
        window,
        horizon,
        rolling,
    })
}

fn as_message(message: &Value) -> Result<&Message, MeterError> {
    message
        .as_object()
        .ok_or_else(|| MeterError::NoMessageType("Request message should be an object.".to_string()))
}

/// # Errors
/// `NoMessageType` without a `type`, `InvalidMessageType` for another type.
pub fn check_message_type(message: &Message, expected: &str) -> Result<(), MeterError> {
    match message.get("type") {
        None => Err(MeterError::NoMessageType(String::new())),
        Some(Value::String(t)) if t == expected => Ok(()),
        Some(_) => Err(MeterError::InvalidMessageType(format!(
            "Request message should specify type '{expected}'."
        ))),
    }
}

/// # Errors
/// `InvalidUnit` unless `unit` equals `accepted`.
pub fn check_unit(message: &Message, accepted: &str) -> Result<String, MeterError> {
    match message.get("unit") {
        Some(Value::String(unit)) if unit == accepted => Ok(unit.clone()),
        _ => Err(MeterError::InvalidUnit(format!(
            "Data should be given in {accepted}."
        ))),
    }
}

/// Reads `resolution`, which may only be `accepted` when present.
///
/// # Errors
/// `InvalidResolution` for any other resolution.
pub fn optional_resolution(message: &Message, accepted: Duration) -> Result<Duration, MeterError> {
    match message.get("resolution") {
        None => Ok(accepted),
        Some(Value::String(s)) if parse_duration(s).is_ok_and(|r| r == accepted) => Ok(accepted),
        Some(_) => Err(MeterError::InvalidResolution(String::new())),
    }
}

/// Reads `connection`, `connections` or `groups` into connection groups.
///
/// # Errors
/// `UnrecognizedConnectionGroup` when connections are missing or contain
/// empty items.
pub fn connection_groups(message: &Message) -> Result<Vec<Vec<String>>, MeterError> {
    if let Some(value) = message.get("connection").or_else(|| message.get("connections")) {
        return Ok(vec![address_list(value)?]);
    }

    let Some(Value::Array(groups)) = message.get("groups") else {
        return Err(MeterError::UnrecognizedConnectionGroup(
            "Missing connection, connections or groups.".to_string(),
        ));
    };
    groups
        .iter()
        .map(|group| {
            group
                .get("connection")
                .or_else(|| group.get("connections"))
                .ok_or_else(|| {
                    MeterError::UnrecognizedConnectionGroup(
                        "Each group should specify its connections.".to_string(),
                    )
                })
                .and_then(address_list)
        })
        .collect()
}

fn address_list(value: &Value) -> Result<Vec<String>, MeterError> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            _ => Err(MeterError::UnrecognizedConnectionGroup(
                "Connection groups should not contain empty items.".to_string(),
            )),
        })
        .collect()
}

/// Reads `value`, `values` or the values of each entry in `groups`.
///
/// # Errors
/// `PtusIncomplete` when values are missing or not numbers.
pub fn value_groups(message: &Message) -> Result<Vec<Vec<f64>>, MeterError> {
    if let Some(value) = message.get("value").or_else(|| message.get("values")) {
        return Ok(vec![number_list(value)?]);
    }

    let Some(Value::Array(groups)) = message.get("groups") else {
        return Err(MeterError::PtusIncomplete(String::new()));
    };
    groups
        .iter()
        .map(|group| {
            group
                .get("value")
                .or_else(|| group.get("values"))
                .ok_or_else(|| MeterError::PtusIncomplete(String::new()))
                .and_then(number_list)
        })
        .collect()
}

fn number_list(value: &Value) -> Result<Vec<f64>, MeterError> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| MeterError::PtusIncomplete("Values should be numbers.".to_string()))
        })
        .collect()
}

/// Reads `start` and `duration`.
///
/// # Errors
/// `InvalidTimezone` for a start time without offset, `InvalidPeriod` for
/// anything else that does not make a positive window.
pub fn period(message: &Message) -> Result<Window, MeterError> {
    let start = match message.get("start") {
        Some(Value::String(s)) => parse_start(s)?,
        _ => return Err(MeterError::InvalidPeriod("Missing start time.".to_string())),
    };
    let duration = match message.get("duration") {
        Some(Value::String(s)) => {
            parse_duration(s).map_err(|e| MeterError::InvalidPeriod(e.to_string()))?
        }
        _ => return Err(MeterError::InvalidPeriod("Missing duration.".to_string())),
    };
    if duration <= Duration::zero() {
        return Err(MeterError::InvalidPeriod(
            "Duration should be positive.".to_string(),
        ));
    }
    if duration > max_window() {
        return Err(MeterError::InvalidPeriod(format!(
            "Duration should not exceed {}.",
            format_duration(max_window())
        )));
    }
    if start.checked_add_signed(duration).is_none() {
        return Err(MeterError::InvalidPeriod(
            "Period ends outside the supported time range.".to_string(),
        ));
    }
    Ok(Window::new(start, duration))
}

fn parse_start(s: &str) -> Result<DateTime<Utc>, MeterError> {
    if let Ok(start) = DateTime::parse_from_rfc3339(s) {
        return Ok(start.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"));
    if naive.is_ok() {
        Err(MeterError::InvalidTimezone(String::new()))
    } else {
        Err(MeterError::InvalidPeriod(format!("Cannot parse start time '{s}'.")))
    }
}

/// Reads the optional `horizon`, with an `R/` prefix for a rolling horizon.
///
/// # Errors
/// `InvalidHorizon` when unparsable or positive.
pub fn optional_horizon(message: &Message) -> Result<Option<(Duration, bool)>, MeterError> {
    let Some(value) = message.get("horizon") else {
        return Ok(None);
    };
    let Value::String(s) = value else {
        return Err(MeterError::InvalidHorizon(
            "Horizon should be an ISO 8601 duration.".to_string(),
        ));
    };
    let (horizon, rolling) =
        parse_horizon(s).map_err(|e| MeterError::InvalidHorizon(e.to_string()))?;
    if horizon > Duration::zero() {
        return Err(MeterError::InvalidHorizon(
            "Meter data must have a zero or negative horizon to indicate observations after the fact."
                .to_string(),
        ));
    }
    Ok(Some((horizon, rolling)))
}

/// Checks that the window lies on the PTU grid and that every value group
/// evenly divides it.
///
/// # Errors
/// `InvalidPtuDuration` when any of the three conditions fails.
pub fn check_ptu_grid(window: &Window, value_groups: &[Vec<f64>]) -> Result<(), MeterError> {
    let ptu_seconds = ptu().num_seconds();
    let start_on_grid = window.start.timestamp().rem_euclid(ptu_seconds) == 0
        && window.start.timestamp_subsec_nanos() == 0;

    let ptu_nanos = ptu().num_nanoseconds().unwrap_or(i64::MAX);
    let ptus = window
        .duration
        .num_nanoseconds()
        .filter(|ns| *ns > 0 && ns % ptu_nanos == 0)
        .map(|ns| ns / ptu_nanos);

    let values_fit = ptus.is_some_and(|n| {
        value_groups
            .iter()
            .filter(|g| !g.is_empty())
            .all(|g| i64::try_from(g.len()).is_ok_and(|len| n % len == 0))
    });

    if start_on_grid && values_fit {
        Ok(())
    } else {
        Err(MeterError::InvalidPtuDuration(String::new()))
    }
}

/// Reads the optional `source` (or `sources`) as names or ids. Numeric
/// strings are taken as ids.
///
/// # Errors
/// `InvalidMessageType` for sources that are neither names nor ids.
pub fn optional_sources(message: &Message) -> Result<Option<Vec<SourceRef>>, MeterError> {
    let Some(value) = message.get("source").or_else(|| message.get("sources")) else {
        return Ok(None);
    };
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Number(n) => n.as_i64().map(SourceRef::Id),
            Value::String(s) => Some(
                s.parse::<i64>()
                    .map_or_else(|_| SourceRef::Name(s.clone()), SourceRef::Id),
            ),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .map(Some)
        .ok_or_else(|| {
            MeterError::InvalidMessageType("Sources should be given as names or ids.".to_string())
        })
}

/// Builds a message from GET query parameters.
///
/// Values that are JSON lists are spliced in, repeated keys collect into a
/// list, and single-element lists are flattened to their element. Other
/// values are kept as strings.
pub fn form_from_query<I, K, V>(pairs: I) -> Value
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    let mut collected: Vec<(String, Vec<Value>)> = Vec::new();
    for (key, raw) in pairs {
        let key = key.into();
        let raw = raw.as_ref();
        let parsed = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            _ => vec![Value::String(raw.to_string())],
        };
        match collected.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.extend(parsed),
            None => collected.push((key, parsed)),
        }
    }

    let form: Message = collected
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            (key, value)
        })
        .collect();
    Value::Object(form)
}
