use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};

/// Resolves a due-date expression relative to `today`.
///
/// Accepts `today`, `tomorrow`, `yesterday`, weekday names (next
/// occurrence), offsets like `+3d` / `+2w`, and ISO `YYYY-MM-DD`.
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
      return Ok(today + Duration::days(1));
    }
    | "yesterday" => {
      return Ok(today - Duration::days(1));
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  if let Some(offset) =
    lower.strip_prefix('+')
  {
    return parse_offset(offset, today);
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date: {token} \
       (expected YYYY-MM-DD, today, \
       tomorrow, a weekday or +Nd)"
    )
  })
}

/// Parses `YYYY-MM` into a year and month.
pub fn parse_year_month(
  input: &str
) -> anyhow::Result<(i32, u32)> {
  let token = input.trim();
  let first = NaiveDate::parse_from_str(
    &format!("{token}-01"),
    "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "invalid month: {token} \
       (expected YYYY-MM)"
    )
  })?;
  Ok((first.year(), first.month()))
}

fn parse_offset(
  offset: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let unit = offset
    .chars()
    .last()
    .ok_or_else(|| {
      anyhow!("empty date offset")
    })?;
  let digits = &offset
    [..offset.len() - unit.len_utf8()];
  let amount: i64 =
    digits.parse().with_context(|| {
      format!(
        "invalid date offset: \
         +{offset}"
      )
    })?;
  let days = match unit {
    | 'd' => Some(amount),
    | 'w' => amount.checked_mul(7),
    | other => {
      return Err(anyhow!(
        "unknown offset unit '{other}' \
         (use d or w)"
      ));
    }
  };
  days
    .and_then(Duration::try_days)
    .and_then(|delta| {
      today.checked_add_signed(delta)
    })
    .ok_or_else(|| {
      anyhow!(
        "date offset out of range: \
         +{offset}"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
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

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    parse_due_date,
    parse_year_month
  };

  fn today() -> NaiveDate {
    // A Tuesday.
    NaiveDate::from_ymd_opt(2026, 2, 17)
      .expect("valid date")
  }

  #[test]
  fn parses_relative_words() {
    assert_eq!(
      parse_due_date("Tomorrow", today())
        .expect("tomorrow")
        .to_string(),
      "2026-02-18"
    );
    assert_eq!(
      parse_due_date("today", today())
        .expect("today"),
      today()
    );
  }

  #[test]
  fn parses_weekday_name() {
    assert_eq!(
      parse_due_date("wednesday", today())
        .expect("weekday")
        .to_string(),
      "2026-02-18"
    );
    assert_eq!(
      parse_due_date("tue", today())
        .expect("same weekday")
        .to_string(),
      "2026-02-24"
    );
  }

  #[test]
  fn parses_offsets_and_iso() {
    assert_eq!(
      parse_due_date("+2w", today())
        .expect("offset")
        .to_string(),
      "2026-03-03"
    );
    assert_eq!(
      parse_due_date("2026-12-31", today())
        .expect("iso")
        .to_string(),
      "2026-12-31"
    );
    assert!(
      parse_due_date("+3y", today())
        .is_err()
    );
    assert!(
      parse_due_date("someday", today())
        .is_err()
    );
  }

  #[test]
  fn huge_offsets_are_errors() {
    for input in [
      "+200000000000000d",
      "+2000000000000000000w",
      "+9223372036854775807d"
    ] {
      assert!(
        parse_due_date(input, today())
          .is_err(),
        "{input} should be rejected"
      );
    }
  }

  #[test]
  fn parses_year_month() {
    assert_eq!(
      parse_year_month("2026-03")
        .expect("month"),
      (2026, 3)
    );
    assert!(
      parse_year_month("2026-13").is_err()
    );
  }
}
