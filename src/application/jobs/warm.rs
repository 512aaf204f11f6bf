//! Cron job that re-warms the word cache on a schedule.

use std::str::FromStr;
use std::sync::Arc;

use apalis::layers::WorkerBuilderExt;
use apalis::prelude::*;
use apalis_cron::{CronStream, Schedule};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::warmer::{Warmer, WarmerError};

/// Marker struct for the cron-triggered warm job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct WarmCacheJob;

impl From<chrono::DateTime<chrono::Utc>> for WarmCacheJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Context for the warm job worker.
#[derive(Clone)]
pub struct WarmCacheContext {
    pub warmer: Arc<Warmer>,
    pub limit: u32,
}

/// Run one scheduled warm. Failures are logged and the recurrence continues.
pub async fn process_warm_cache_job(
    _job: WarmCacheJob,
    ctx: Data<WarmCacheContext>,
) -> Result<(), apalis::prelude::Error> {
    info!(limit = ctx.limit, "running scheduled cache warming");
    if let Err(err) = ctx.warmer.run(ctx.limit).await {
        warn!(error = %err, "scheduled cache warming failed");
    }
    Ok(())
}

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Parse a cron expression for the warm schedule.
///
/// Five-field expressions (`min hour dom mon dow`) follow crontab: they run
/// at second zero and number weekdays 0-7 with both 0 and 7 meaning Sunday.
/// Six- and seven-field expressions are taken as given.
pub fn parse_warm_schedule(expression: &str) -> Result<Schedule, WarmerError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = match fields.as_slice() {
        [minute, hour, day, month, weekday] => {
            let weekday = crontab_weekdays(weekday)
                .map_err(|reason| WarmerError::invalid_schedule(expression, reason))?;
            format!("0 {minute} {hour} {day} {month} {weekday}")
        }
        [_, _, _, _, _, _] | [_, _, _, _, _, _, _] => fields.join(" "),
        _ => {
            return Err(WarmerError::invalid_schedule(
                expression,
                format!("expected 5, 6 or 7 fields, found {}", fields.len()),
            ));
        }
    };

    Schedule::from_str(&normalized)
        .map_err(|err| WarmerError::invalid_schedule(expression, err.to_string()))
}

/// Rewrite a numeric crontab day-of-week field as weekday names.
///
/// Fields using names or `*`/`?` without a step are returned unchanged.
fn crontab_weekdays(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" || field.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(field.to_string());
    }

    let mut days = [false; 7];
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step
                    .parse()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| format!("invalid day-of-week step `{part}`"))?;
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((start, end)) => (crontab_weekday(start)?, crontab_weekday(end)?),
                None if step > 1 => (crontab_weekday(range)?, 7),
                None => {
                    let day = crontab_weekday(range)?;
                    (day, day)
                }
            },
        };
        if start > end {
            return Err(format!("day-of-week range `{range}` runs backwards"));
        }

        for day in (start..=end).step_by(usize::from(step)) {
            days[usize::from(day % 7)] = true;
        }
    }

    let names: Vec<&str> = WEEKDAY_NAMES
        .iter()
        .zip(days)
        .filter_map(|(name, selected)| selected.then_some(*name))
        .collect();
    Ok(names.join(","))
}

fn crontab_weekday(value: &str) -> Result<u8, String> {
    value
        .parse::<u8>()
        .ok()
        .filter(|day| *day <= 7)
        .ok_or_else(|| format!("day of week `{value}` is outside 0-7"))
}

/// Start a cron worker that warms `limit` words at every tick of `schedule`.
pub fn spawn_warm_worker(warmer: Arc<Warmer>, schedule: Schedule, limit: u32) -> JoinHandle<()> {
    let worker = WorkerBuilder::new("warm-cache-worker")
        .data(WarmCacheContext { warmer, limit })
        .backend(CronStream::new(schedule))
        .build_fn(process_warm_cache_job);

    let monitor = Monitor::new().register(worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "warm job monitor stopped");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_expression_runs_on_the_minute() {
        let schedule = parse_warm_schedule("0 * * * *").expect("hourly");
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
        for time in upcoming {
            assert_eq!(chrono::Timelike::second(&time), 0);
            assert_eq!(chrono::Timelike::minute(&time), 0);
        }
    }

    #[test]
    fn six_and_seven_field_expressions_are_accepted() {
        assert!(parse_warm_schedule("*/30 * * * * *").is_ok());
        assert!(parse_warm_schedule("0 0 12 * * * 2099").is_ok());
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let err = parse_warm_schedule("* * *").expect_err("too few fields");
        assert!(matches!(err, WarmerError::InvalidSchedule { .. }));
        assert!(parse_warm_schedule("").is_err());
    }

    fn weekdays(expression: &str) -> Vec<chrono::Weekday> {
        let schedule = parse_warm_schedule(expression).expect("schedule");
        let mut days: Vec<_> = schedule
            .upcoming(chrono::Utc)
            .take(14)
            .map(|time| chrono::Datelike::weekday(&time))
            .collect();
        days.sort_by_key(|day| day.num_days_from_sunday());
        days.dedup();
        days
    }

    #[test]
    fn five_field_weekdays_follow_crontab_numbering() {
        use chrono::Weekday::*;

        assert_eq!(weekdays("0 0 * * 1"), vec![Mon]);
        assert_eq!(weekdays("0 0 * * 0"), vec![Sun]);
        assert_eq!(weekdays("0 0 * * 7"), vec![Sun]);
        assert_eq!(weekdays("0 0 * * 1-5"), vec![Mon, Tue, Wed, Thu, Fri]);
        assert_eq!(weekdays("0 0 * * 5-7"), vec![Sun, Fri, Sat]);
        assert_eq!(weekdays("0 0 * * 0,3"), vec![Sun, Wed]);
        assert_eq!(weekdays("0 0 * * */2"), vec![Sun, Tue, Thu, Sat]);
        assert_eq!(weekdays("0 0 * * 1-5/2"), vec![Mon, Wed, Fri]);
        assert_eq!(weekdays("0 0 * * Mon-Fri"), vec![Mon, Tue, Wed, Thu, Fri]);
    }

    #[test]
    fn monday_schedule_fires_at_midnight_on_mondays() {
        let schedule = parse_warm_schedule("0 0 * * 1").expect("weekly");
        for time in schedule.upcoming(chrono::Utc).take(3) {
            assert_eq!(chrono::Datelike::weekday(&time), chrono::Weekday::Mon);
            assert_eq!(chrono::Timelike::hour(&time), 0);
            assert_eq!(chrono::Timelike::minute(&time), 0);
        }
    }

    #[test]
    fn out_of_range_weekdays_are_rejected() {
        assert!(parse_warm_schedule("0 0 * * 8").is_err());
        assert!(parse_warm_schedule("0 0 * * 5-2").is_err());
        assert!(parse_warm_schedule("0 0 * * */0").is_err());
    }

    #[test]
    fn malformed_field_is_rejected() {
        assert!(parse_warm_schedule("61 * * * *").is_err());
        assert!(parse_warm_schedule("0 * * * blursday").is_err());
    }
}
