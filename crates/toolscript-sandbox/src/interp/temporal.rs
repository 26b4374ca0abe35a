//! `datetime` values: naive date-times, dates and durations backed by chrono.

use std::fmt::Write as _;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use super::builtins::Args;
use super::fault::{ExcKind, Fault};
use super::value::{TypeKind, Value};

const MICROS_PER_DAY: i64 = 86_400_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Temporal {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Delta(Duration),
}

pub const DATETIME_METHODS: &[&str] = &[
    "isoformat", "strftime", "timestamp", "date", "weekday", "isoweekday",
];
pub const DATE_METHODS: &[&str] = &["isoformat", "strftime", "weekday", "isoweekday"];
pub const TIMEDELTA_METHODS: &[&str] = &["total_seconds"];

impl Temporal {
    pub fn type_kind(&self) -> TypeKind {
        match self {
            Temporal::DateTime(_) => TypeKind::DateTime,
            Temporal::Date(_) => TypeKind::Date,
            Temporal::Delta(_) => TypeKind::TimeDelta,
        }
    }

    /// Data attributes (`dt.year`, `td.days`, ...).
    pub fn field(&self, name: &str) -> Option<Value> {
        let int = |v: i64| Some(Value::Int(v));
        match (self, name) {
            (Temporal::DateTime(dt), "year") => int(dt.year() as i64),
            (Temporal::DateTime(dt), "month") => int(dt.month() as i64),
            (Temporal::DateTime(dt), "day") => int(dt.day() as i64),
            (Temporal::DateTime(dt), "hour") => int(dt.hour() as i64),
            (Temporal::DateTime(dt), "minute") => int(dt.minute() as i64),
            (Temporal::DateTime(dt), "second") => int(dt.second() as i64),
            (Temporal::DateTime(dt), "microsecond") => int((dt.nanosecond() / 1000) as i64),
            (Temporal::Date(d), "year") => int(d.year() as i64),
            (Temporal::Date(d), "month") => int(d.month() as i64),
            (Temporal::Date(d), "day") => int(d.day() as i64),
            (Temporal::Delta(td), "days") => int(delta_parts(td).0),
            (Temporal::Delta(td), "seconds") => int(delta_parts(td).1),
            (Temporal::Delta(td), "microseconds") => int(delta_parts(td).2),
            _ => None,
        }
    }

    /// `str(value)`
    pub fn display(&self) -> String {
        match self {
            Temporal::DateTime(dt) => iso_datetime(dt, ' '),
            Temporal::Date(d) => d.format("%Y-%m-%d").to_string(),
            Temporal::Delta(td) => {
                let (days, secs, micros) = delta_parts(td);
                let mut out = String::new();
                if days != 0 {
                    let _ = write!(out, "{} day{}, ", days, if days.abs() == 1 { "" } else { "s" });
                }
                let _ = write!(out, "{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60);
                if micros != 0 {
                    let _ = write!(out, ".{:06}", micros);
                }
                out
            }
        }
    }

    /// `repr(value)`
    pub fn repr(&self) -> String {
        match self {
            Temporal::DateTime(dt) => {
                let mut out = format!(
                    "datetime.datetime({}, {}, {}, {}, {}",
                    dt.year(),
                    dt.month(),
                    dt.day(),
                    dt.hour(),
                    dt.minute()
                );
                let micros = dt.nanosecond() / 1000;
                if dt.second() != 0 || micros != 0 {
                    let _ = write!(out, ", {}", dt.second());
                }
                if micros != 0 {
                    let _ = write!(out, ", {}", micros);
                }
                out.push(')');
                out
            }
            Temporal::Date(d) => format!("datetime.date({}, {}, {})", d.year(), d.month(), d.day()),
            Temporal::Delta(td) => {
                let (days, secs, micros) = delta_parts(td);
                let mut fields = Vec::new();
                if days != 0 {
                    fields.push(format!("days={}", days));
                }
                if secs != 0 {
                    fields.push(format!("seconds={}", secs));
                }
                if micros != 0 {
                    fields.push(format!("microseconds={}", micros));
                }
                if fields.is_empty() {
                    fields.push("0".to_string());
                }
                format!("datetime.timedelta({})", fields.join(", "))
            }
        }
    }

    /// `format(value, spec)` and `strftime`: chrono's directives, which
    /// follow the C library ones.
    pub fn strftime(&self, spec: &str) -> Result<String, Fault> {
        let mut out = String::new();
        let written = match self {
            Temporal::DateTime(dt) => write!(out, "{}", dt.format(spec)),
            Temporal::Date(d) => write!(out, "{}", d.format(spec)),
            Temporal::Delta(_) => return Ok(self.display()),
        };
        written.map_err(|_| Fault::value_error(format!("Invalid format string '{}'", spec)))?;
        Ok(out)
    }
}

/// Python's normalized `(days, seconds, microseconds)`; only `days` may be negative.
fn delta_parts(td: &Duration) -> (i64, i64, i64) {
    let micros = td.num_microseconds().unwrap_or(i64::MAX);
    let days = micros.div_euclid(MICROS_PER_DAY);
    let rest = micros.rem_euclid(MICROS_PER_DAY);
    (days, rest / 1_000_000, rest % 1_000_000)
}

fn iso_datetime(dt: &NaiveDateTime, sep: char) -> String {
    let micros = dt.nanosecond() / 1000;
    let base = dt.format(&format!("%Y-%m-%d{}%H:%M:%S", sep)).to_string();
    if micros == 0 {
        base
    } else {
        format!("{}.{:06}", base, micros)
    }
}

fn int_arg(v: Option<Value>, name: &str, default: i64) -> Result<i64, Fault> {
    match v {
        None => Ok(default),
        Some(v) => v.expect_int(name),
    }
}

fn required(v: Option<Value>, function: &str, name: &str) -> Result<i64, Fault> {
    match v {
        Some(v) => v.expect_int(name),
        None => Err(Fault::type_error(format!(
            "{}() missing required argument '{}'",
            function, name
        ))),
    }
}

fn num_arg(v: Option<Value>, name: &str) -> Result<f64, Fault> {
    match v {
        None => Ok(0.0),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| Fault::type_error(format!("unsupported type for timedelta {} component: {}", name, v.type_name()))),
    }
}

fn overflow(message: &str) -> Fault {
    Fault::new(ExcKind::OverflowError, message)
}

fn out_of_range(what: &str) -> Fault {
    Fault::value_error(format!("{} is out of range", what))
}

/// `datetime(year, month, day, hour=0, minute=0, second=0, microsecond=0)`
pub fn new_datetime(mut args: Args) -> Result<Value, Fault> {
    args.count(0, 7)?;
    let year = required(args.take(0, "year"), "datetime", "year")?;
    let month = required(args.take(1, "month"), "datetime", "month")?;
    let day = required(args.take(2, "day"), "datetime", "day")?;
    let hour = int_arg(args.take(3, "hour"), "hour", 0)?;
    let minute = int_arg(args.take(4, "minute"), "minute", 0)?;
    let second = int_arg(args.take(5, "second"), "second", 0)?;
    let micro = int_arg(args.take(6, "microsecond"), "microsecond", 0)?;
    args.finish()?;
    let date = make_date(year, month, day)?;
    let part = |v: i64| u32::try_from(v).map_err(|_| out_of_range("time component"));
    let dt = date
        .and_hms_micro_opt(part(hour)?, part(minute)?, part(second)?, part(micro)?)
        .ok_or_else(|| out_of_range("time component"))?;
    Ok(Value::Temporal(Temporal::DateTime(dt)))
}

/// `date(year, month, day)`
pub fn new_date(mut args: Args) -> Result<Value, Fault> {
    args.count(0, 3)?;
    let year = required(args.take(0, "year"), "date", "year")?;
    let month = required(args.take(1, "month"), "date", "month")?;
    let day = required(args.take(2, "day"), "date", "day")?;
    args.finish()?;
    Ok(Value::Temporal(Temporal::Date(make_date(year, month, day)?)))
}

fn make_date(year: i64, month: i64, day: i64) -> Result<NaiveDate, Fault> {
    if !(1..=9999).contains(&year) {
        return Err(Fault::value_error(format!("year {} is out of range", year)));
    }
    if !(1..=12).contains(&month) {
        return Err(Fault::value_error("month must be in 1..12"));
    }
    NaiveDate::from_ymd_opt(year as i32, month as u32, u32::try_from(day).unwrap_or(0))
        .ok_or_else(|| Fault::value_error("day is out of range for month"))
}

/// `timedelta(days=0, seconds=0, microseconds=0, milliseconds=0, minutes=0, hours=0, weeks=0)`
pub fn new_timedelta(mut args: Args) -> Result<Value, Fault> {
    args.count(0, 7)?;
    let days = num_arg(args.take(0, "days"), "days")?;
    let seconds = num_arg(args.take(1, "seconds"), "seconds")?;
    let micros = num_arg(args.take(2, "microseconds"), "microseconds")?;
    let millis = num_arg(args.take(3, "milliseconds"), "milliseconds")?;
    let minutes = num_arg(args.take(4, "minutes"), "minutes")?;
    let hours = num_arg(args.take(5, "hours"), "hours")?;
    let weeks = num_arg(args.take(6, "weeks"), "weeks")?;
    args.finish()?;
    let total = ((weeks * 7.0 + days) * 86_400.0 + hours * 3600.0 + minutes * 60.0 + seconds) * 1e6
        + millis * 1e3
        + micros;
    delta_from_micros(total).map(|d| Value::Temporal(Temporal::Delta(d)))
}

/// Durations are whole microseconds in an `i64`.
fn delta_from_micros(total: f64) -> Result<Duration, Fault> {
    if !total.is_finite() || total.abs() >= i64::MAX as f64 {
        return Err(overflow("timedelta value out of range"));
    }
    Ok(Duration::microseconds(total.round() as i64))
}

pub fn now() -> Value {
    Value::Temporal(Temporal::DateTime(Local::now().naive_local()))
}

pub fn utcnow() -> Value {
    Value::Temporal(Temporal::DateTime(Utc::now().naive_utc()))
}

pub fn today() -> Value {
    Value::Temporal(Temporal::Date(Local::now().date_naive()))
}

pub fn from_timestamp(ts: f64) -> Result<Value, Fault> {
    if !ts.is_finite() {
        return Err(Fault::value_error("timestamp out of range for platform time_t"));
    }
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9).round().min(999_999_999.0) as u32;
    chrono::DateTime::from_timestamp(secs as i64, nanos)
        .map(|utc| Value::Temporal(Temporal::DateTime(utc.with_timezone(&Local).naive_local())))
        .ok_or_else(|| Fault::value_error("timestamp out of range for platform time_t"))
}

/// `datetime.fromisoformat`: `YYYY-MM-DD[(T| )HH:MM[:SS[.ffffff]]]`.
pub fn datetime_fromisoformat(text: &str) -> Result<Value, Fault> {
    let invalid = || Fault::value_error(format!("Invalid isoformat string: '{}'", text));
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return d
            .and_hms_opt(0, 0, 0)
            .map(|dt| Value::Temporal(Temporal::DateTime(dt)))
            .ok_or_else(invalid);
    }
    let normalized = text.replacen(' ', "T", 1);
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(Value::Temporal(Temporal::DateTime(dt)));
        }
    }
    Err(invalid())
}

pub fn date_fromisoformat(text: &str) -> Result<Value, Fault> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|d| Value::Temporal(Temporal::Date(d)))
        .map_err(|_| Fault::value_error(format!("Invalid isoformat string: '{}'", text)))
}

pub fn call_method(t: &Temporal, name: &str, mut args: Args) -> Result<Value, Fault> {
    match (t, name) {
        (Temporal::DateTime(dt), "isoformat") => {
            args.count(0, 1)?;
            let sep = args.take(0, "sep");
            args.finish()?;
            let sep = match sep {
                Some(v) => v.expect_str("isoformat() argument 1")?.chars().next().unwrap_or('T'),
                None => 'T',
            };
            Ok(Value::string(iso_datetime(dt, sep)))
        }
        (Temporal::Date(d), "isoformat") => {
            args.finish()?;
            args.count(0, 0)?;
            Ok(Value::string(d.format("%Y-%m-%d").to_string()))
        }
        (Temporal::DateTime(_) | Temporal::Date(_), "strftime") => {
            args.finish()?;
            args.count(1, 1)?;
            let spec = args.pos[0].expect_str("strftime() argument 1")?;
            t.strftime(&spec).map(Value::string)
        }
        (Temporal::DateTime(dt), "timestamp") => {
            args.finish()?;
            args.count(0, 0)?;
            let local = Local
                .from_local_datetime(dt)
                .earliest()
                .ok_or_else(|| overflow("timestamp out of range"))?;
            Ok(Value::Float(local.timestamp_micros() as f64 / 1e6))
        }
        (Temporal::DateTime(dt), "date") => {
            args.finish()?;
            args.count(0, 0)?;
            Ok(Value::Temporal(Temporal::Date(dt.date())))
        }
        (Temporal::DateTime(_) | Temporal::Date(_), "weekday" | "isoweekday") => {
            args.finish()?;
            args.count(0, 0)?;
            let weekday = match t {
                Temporal::DateTime(dt) => dt.weekday(),
                Temporal::Date(d) => d.weekday(),
                Temporal::Delta(_) => return Err(Fault::attribute_error("weekday")),
            };
            Ok(Value::Int(if name == "weekday" {
                weekday.num_days_from_monday() as i64
            } else {
                weekday.number_from_monday() as i64
            }))
        }
        (Temporal::Delta(td), "total_seconds") => {
            args.finish()?;
            args.count(0, 0)?;
            Ok(Value::Float(td.num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6))
        }
        _ => Err(Fault::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            t.type_kind().name(),
            name
        ))),
    }
}

/// Arithmetic between temporal values; `None` when the operator does not apply.
pub fn add(a: &Temporal, b: &Temporal) -> Option<Result<Temporal, Fault>> {
    let out_of_bounds = || overflow("date value out of range");
    Some(match (a, b) {
        (Temporal::DateTime(dt), Temporal::Delta(td)) | (Temporal::Delta(td), Temporal::DateTime(dt)) => {
            dt.checked_add_signed(*td).map(Temporal::DateTime).ok_or_else(out_of_bounds)
        }
        (Temporal::Date(d), Temporal::Delta(td)) | (Temporal::Delta(td), Temporal::Date(d)) => d
            .checked_add_signed(Duration::days(td.num_days()))
            .map(Temporal::Date)
            .ok_or_else(out_of_bounds),
        (Temporal::Delta(x), Temporal::Delta(y)) => x.checked_add(y).map(Temporal::Delta).ok_or_else(out_of_bounds),
        _ => return None,
    })
}

pub fn sub(a: &Temporal, b: &Temporal) -> Option<Result<Temporal, Fault>> {
    let out_of_bounds = || overflow("date value out of range");
    Some(match (a, b) {
        (Temporal::DateTime(dt), Temporal::Delta(td)) => {
            dt.checked_sub_signed(*td).map(Temporal::DateTime).ok_or_else(out_of_bounds)
        }
        (Temporal::Date(d), Temporal::Delta(td)) => d
            .checked_sub_signed(Duration::days(td.num_days()))
            .map(Temporal::Date)
            .ok_or_else(out_of_bounds),
        (Temporal::DateTime(x), Temporal::DateTime(y)) => Ok(Temporal::Delta(x.signed_duration_since(*y))),
        (Temporal::Date(x), Temporal::Date(y)) => Ok(Temporal::Delta(x.signed_duration_since(*y))),
        (Temporal::Delta(x), Temporal::Delta(y)) => x.checked_sub(y).map(Temporal::Delta).ok_or_else(out_of_bounds),
        _ => return None,
    })
}

/// `timedelta * number`
pub fn scale(td: &Duration, factor: f64) -> Result<Temporal, Fault> {
    let micros = td.num_microseconds().unwrap_or(i64::MAX) as f64 * factor;
    delta_from_micros(micros).map(Temporal::Delta)
}

pub fn negate(td: &Duration) -> Result<Temporal, Fault> {
    scale(td, -1.0)
}

/// Ordering between values of the same temporal kind.
pub fn compare(a: &Temporal, b: &Temporal) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Temporal::DateTime(x), Temporal::DateTime(y)) => Some(x.cmp(y)),
        (Temporal::Date(x), Temporal::Date(y)) => Some(x.cmp(y)),
        (Temporal::Delta(x), Temporal::Delta(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> Temporal {
        Temporal::DateTime(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap(),
        )
    }

    #[test]
    fn test_display_and_repr() {
        let t = dt(2024, 3, 5, 14, 30, 0);
        assert_eq!(t.display(), "2024-03-05 14:30:00");
        assert_eq!(t.repr(), "datetime.datetime(2024, 3, 5, 14, 30)");
        let td = Temporal::Delta(Duration::seconds(90_061));
        assert_eq!(td.display(), "1 day, 1:01:01");
        assert_eq!(td.repr(), "datetime.timedelta(days=1, seconds=3661)");
        let neg = Temporal::Delta(Duration::seconds(-1));
        assert_eq!(neg.display(), "-1 day, 23:59:59");
        assert_eq!(Temporal::Delta(Duration::zero()).repr(), "datetime.timedelta(0)");
    }

    #[test]
    fn test_arithmetic() {
        let a = dt(2024, 2, 28, 12, 0, 0);
        let b = dt(2024, 3, 1, 12, 0, 0);
        let Some(Ok(Temporal::Delta(diff))) = sub(&b, &a) else {
            panic!("expected delta");
        };
        assert_eq!(diff.num_days(), 2);
        let Some(Ok(back)) = add(&a, &Temporal::Delta(diff)) else {
            panic!("expected datetime");
        };
        assert_eq!(back, b);
        assert!(add(&a, &b).is_none());
        assert_eq!(compare(&a, &b), Some(std::cmp::Ordering::Less));
    }

    #[test]
    fn test_fields_and_parsing() {
        let Value::Temporal(t) = datetime_fromisoformat("2023-12-31T23:59:58.250000").unwrap() else {
            panic!("expected datetime");
        };
        assert!(matches!(t.field("microsecond"), Some(Value::Int(250000))));
        assert!(matches!(t.field("year"), Some(Value::Int(2023))));
        assert!(datetime_fromisoformat("yesterday").is_err());
        assert_eq!(t.strftime("%d/%m/%Y").unwrap(), "31/12/2023");
    }
}
