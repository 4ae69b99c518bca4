use std::fmt;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};

use crate::config::Config;

const TIMEZONE_ENV_VAR: &str =
  "TASKDECK_TIMEZONE";

/// Where calendar days begin and end.
/// "Today" always means the calendar day
/// containing the evaluation instant in
/// this zone.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum Calendar {
  #[default]
  Local,
  Zone(Tz)
}

impl fmt::Display for Calendar {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Calendar::Local => {
        f.write_str("local")
      }
      | Calendar::Zone(tz) => {
        write!(f, "{}", tz.name())
      }
    }
  }
}

impl Calendar {
  /// `timezone` config key, then the
  /// environment, then system local
  /// time. Unparseable zones are logged
  /// and skipped.
  pub fn resolve(cfg: &Config) -> Self {
    let candidates = [
      cfg.get("timezone").map(|raw| {
        (raw, "config:timezone")
      }),
      std::env::var(TIMEZONE_ENV_VAR)
        .ok()
        .map(|raw| {
          (raw, TIMEZONE_ENV_VAR)
        })
    ];

    for (raw, source) in
      candidates.into_iter().flatten()
    {
      if let Some(tz) =
        parse_timezone(&raw, source)
      {
        return Calendar::Zone(tz);
      }
    }

    tracing::debug!(
      "no timezone configured; using \
       local time"
    );
    Calendar::Local
  }

  #[must_use]
  pub fn date_of(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | Calendar::Local => {
        instant
          .with_timezone(&Local)
          .date_naive()
      }
      | Calendar::Zone(tz) => {
        instant
          .with_timezone(tz)
          .date_naive()
      }
    }
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    self.date_of(now)
  }
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
  Current,
  Upcoming,
  Critical,
  Normal
}

/// Due-date badge: display label plus
/// the urgency bucket that styles it.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct DueBadge {
  pub label:   String,
  pub urgency: Urgency
}

/// First match wins: today, tomorrow,
/// past, then a "Mon D" label.
#[must_use]
pub fn classify_due(
  due: Option<NaiveDate>,
  today: NaiveDate
) -> Option<DueBadge> {
  let due = due?;

  let (label, urgency) = if due == today
  {
    ("Today".to_string(), Urgency::Current)
  } else if today
    .checked_add_days(Days::new(1))
    == Some(due)
  {
    (
      "Tomorrow".to_string(),
      Urgency::Upcoming
    )
  } else if due < today {
    (
      "Overdue".to_string(),
      Urgency::Critical
    )
  } else {
    (
      format_month_day(due),
      Urgency::Normal
    )
  };

  Some(DueBadge {
    label,
    urgency
  })
}

#[must_use]
pub fn format_month_day(
  date: NaiveDate
) -> String {
  date.format("%b %-d").to_string()
}

/// Parse a due-date expression relative
/// to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_due_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return shift_days(today, -1);
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  let rel_re = Regex::new(r"^\+(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("w") => {
        num.checked_mul(7).ok_or_else(
          || {
            anyhow!(
              "relative offset too \
               large: {token}"
            )
          }
        )?
      }
      | _ => num
    };
    return shift_days(today, days);
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized due date: \
       {token:?} (expected YYYY-MM-DD, \
       today, tomorrow, a weekday, or \
       +Nd/+Nw)"
    )
  })
}

fn shift_days(
  day: NaiveDate,
  delta: i64
) -> anyhow::Result<NaiveDate> {
  let magnitude =
    Days::new(delta.unsigned_abs());
  let shifted = if delta >= 0 {
    day.checked_add_days(magnitude)
  } else {
    day.checked_sub_days(magnitude)
  };
  shifted.ok_or_else(|| {
    anyhow!(
      "date out of range: {day} \
       shifted by {delta} days"
    )
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Next occurrence of `target` strictly
/// after `today`.
fn next_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let current = today
    .weekday()
    .num_days_from_monday()
    as i64;
  let wanted =
    target.num_days_from_monday() as i64;
  let mut delta = wanted - current;
  if delta <= 0 {
    delta += 7;
  }
  today
    .checked_add_days(Days::new(
      delta as u64
    ))
    .unwrap_or(today)
}
