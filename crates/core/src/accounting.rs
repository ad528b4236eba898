//! Pure, replayable time-accounting engine.
//!
//! Converts an ordered status-event stream into per-day, per-category
//! minute totals. Consecutive events delimit half-open intervals: event
//! `e[i]`'s category owns `[e[i].occurred_at, e[i+1].occurred_at)`. The
//! final event's interval extends to the caller-supplied `now` only if
//! the live presence record still confirms it; otherwise it contributes
//! nothing, so time after a disconnect is never counted.
//!
//! Intervals are split at every midnight of the canonical timezone and
//! each per-date sub-interval credits `floor(minutes)` to its category
//! bucket. Fractional minutes are dropped, not carried.
//!
//! The engine is deterministic: it never reads the clock, so identical
//! inputs (including the `now` hint) always produce identical output.

use std::collections::BTreeMap;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::event::StatusEvent;
use crate::presence::PresenceRecord;
use crate::status::StatusCategory;
use crate::summary::DaySummary;
use crate::types::{DbId, Timestamp};

/// Summarize one identity's events into per-date day summaries.
///
/// `events` may contain other identities' events; they are ignored.
/// `live` gates whether the final interval is still open (see module
/// docs). Dates with no touching event produce no entry.
pub fn summarize_identity(
    identity_id: DbId,
    events: &[StatusEvent],
    zone: FixedOffset,
    now: Timestamp,
    live: Option<&PresenceRecord>,
) -> BTreeMap<NaiveDate, DaySummary> {
    let mut evs: Vec<&StatusEvent> = events
        .iter()
        .filter(|e| e.identity_id == identity_id)
        .collect();
    // Stable sort: events sharing an instant keep their arrival order.
    evs.sort_by_key(|e| e.occurred_at);

    let mut days: BTreeMap<NaiveDate, DayAcc> = BTreeMap::new();

    for (i, ev) in evs.iter().enumerate() {
        // The event instant itself always touches its date, even when
        // the interval ends up with zero duration.
        touch(&mut days, identity_id, &zone, ev.occurred_at, ev.status);

        let end = match evs.get(i + 1) {
            Some(next) => Some(next.occurred_at),
            None => open_interval_end(ev, now, live),
        };
        if let Some(end) = end {
            credit(&mut days, identity_id, &zone, ev.status, ev.occurred_at, end);
        }
    }

    days.into_iter()
        .map(|(date, acc)| (date, acc.finish(&zone)))
        .collect()
}

/// Summarize a mixed event list, grouping by identity.
///
/// This is the broadcast-replay path: viewers hold the full event log
/// plus the live presence map and recompute everything on each update.
pub fn summarize_all(
    events: &[StatusEvent],
    zone: FixedOffset,
    now: Timestamp,
    live: &BTreeMap<DbId, PresenceRecord>,
) -> BTreeMap<DbId, BTreeMap<NaiveDate, DaySummary>> {
    let mut ids: Vec<DbId> = events.iter().map(|e| e.identity_id).collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|id| {
            let summaries = summarize_identity(id, events, zone, now, live.get(&id));
            (id, summaries)
        })
        .collect()
}

/// Whether the last event's interval is still open, and until when.
///
/// Open only while the live record confirms the same identity, status,
/// and change instant. A disconnect removes the record and a takeover
/// replaces it, so either way the stale tail contributes zero.
fn open_interval_end(
    last: &StatusEvent,
    now: Timestamp,
    live: Option<&PresenceRecord>,
) -> Option<Timestamp> {
    let live = live?;
    let confirmed = live.identity_id == last.identity_id
        && live.status == last.status
        && live.status_changed_at == last.occurred_at;
    (confirmed && now > last.occurred_at).then_some(now)
}

/// Working accumulator for one calendar date.
struct DayAcc {
    summary: DaySummary,
    first_touch: Timestamp,
    last_touch: Timestamp,
}

impl DayAcc {
    fn new(identity_id: DbId, date: NaiveDate, instant: Timestamp) -> Self {
        Self {
            summary: DaySummary::empty(identity_id, date),
            first_touch: instant,
            last_touch: instant,
        }
    }

    fn observe(&mut self, instant: Timestamp) {
        self.first_touch = self.first_touch.min(instant);
        self.last_touch = self.last_touch.max(instant);
    }

    fn finish(mut self, zone: &FixedOffset) -> DaySummary {
        self.summary.login_time = Some(format_hm(self.first_touch, zone));
        self.summary.logout_time = Some(format_hm(self.last_touch, zone));
        self.summary
    }
}

fn format_hm(instant: Timestamp, zone: &FixedOffset) -> String {
    instant.with_timezone(zone).format("%H:%M").to_string()
}

/// Record that `instant` touches its canonical-zone date.
fn touch(
    days: &mut BTreeMap<NaiveDate, DayAcc>,
    identity_id: DbId,
    zone: &FixedOffset,
    instant: Timestamp,
    status: StatusCategory,
) {
    let date = instant.with_timezone(zone).date_naive();
    let day = days
        .entry(date)
        .or_insert_with(|| DayAcc::new(identity_id, date, instant));
    day.observe(instant);
    if status.is_leave() {
        day.summary.is_leave_day = true;
    }
}

/// Credit the half-open interval `[start, end)` to `status`, splitting
/// at canonical-zone midnights.
fn credit(
    days: &mut BTreeMap<NaiveDate, DayAcc>,
    identity_id: DbId,
    zone: &FixedOffset,
    status: StatusCategory,
    start: Timestamp,
    end: Timestamp,
) {
    let mut cursor = start;
    while cursor < end {
        let date = cursor.with_timezone(zone).date_naive();
        let day_end = midnight_after(date, zone);
        let segment_end = end.min(day_end);

        let minutes = (segment_end - cursor).num_seconds() / 60;

        let day = days
            .entry(date)
            .or_insert_with(|| DayAcc::new(identity_id, date, cursor));
        if status.accrues_minutes() {
            day.summary.add_minutes(status, minutes);
        } else {
            day.summary.is_leave_day = true;
        }

        day.observe(cursor);
        // The half-open interval never attains the midnight bound, so a
        // segment running into it touches at most the date's last whole
        // minute (23:59 once formatted).
        let last = if segment_end < day_end {
            segment_end
        } else {
            (day_end - Duration::minutes(1)).max(cursor)
        };
        day.observe(last);

        cursor = segment_end;
    }
}

/// UTC instant of the canonical-zone midnight that ends `date`.
fn midnight_after(date: NaiveDate, zone: &FixedOffset) -> Timestamp {
    let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
    let local = next.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(zone.local_minus_utc()))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn ev(identity_id: DbId, status: StatusCategory, at: &str) -> StatusEvent {
        StatusEvent {
            identity_id,
            status,
            occurred_at: ts(at),
        }
    }

    fn live(identity_id: DbId, status: StatusCategory, changed_at: &str) -> PresenceRecord {
        PresenceRecord::new(identity_id, status, ts(changed_at))
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn midnight_boundary_splits_interval_between_dates() {
        // Available at 23:50, Lunch at 00:10 the next day: ten
        // productive minutes land on day one, ten lunch minutes on day
        // two, and day two gets no productive time from the first
        // interval.
        let events = [
            ev(7, StatusCategory::Available, "2026-03-02T23:50:00Z"),
            ev(7, StatusCategory::Lunch, "2026-03-03T00:10:00Z"),
        ];
        let presence = live(7, StatusCategory::Lunch, "2026-03-03T00:10:00Z");
        let days = summarize_identity(
            7,
            &events,
            utc(),
            ts("2026-03-03T00:20:00Z"),
            Some(&presence),
        );

        let day1 = &days[&date("2026-03-02")];
        assert_eq!(day1.minutes(StatusCategory::Available), 10);
        assert_eq!(day1.total_minutes, 10);

        let day2 = &days[&date("2026-03-03")];
        assert_eq!(day2.minutes(StatusCategory::Available), 0);
        assert_eq!(day2.minutes(StatusCategory::Lunch), 10);
    }

    #[test]
    fn login_logout_formatted_in_canonical_zone() {
        let events = [
            ev(7, StatusCategory::Available, "2026-03-02T23:50:00Z"),
            ev(7, StatusCategory::Lunch, "2026-03-03T00:10:00Z"),
        ];
        let presence = live(7, StatusCategory::Lunch, "2026-03-03T00:10:00Z");
        let days = summarize_identity(
            7,
            &events,
            utc(),
            ts("2026-03-03T00:20:00Z"),
            Some(&presence),
        );

        let day1 = &days[&date("2026-03-02")];
        assert_eq!(day1.login_time.as_deref(), Some("23:50"));
        assert_eq!(day1.logout_time.as_deref(), Some("23:59"));

        let day2 = &days[&date("2026-03-03")];
        assert_eq!(day2.login_time.as_deref(), Some("00:00"));
        assert_eq!(day2.logout_time.as_deref(), Some("00:20"));
    }

    #[test]
    fn final_interval_contributes_zero_without_live_record() {
        // Disconnected: no presence record, so the open tail is cut at
        // the last event.
        let events = [ev(7, StatusCategory::Available, "2026-03-02T10:00:00Z")];
        let days = summarize_identity(7, &events, utc(), ts("2026-03-02T10:30:00Z"), None);

        let day = &days[&date("2026-03-02")];
        assert_eq!(day.total_minutes, 0);
        assert_eq!(day.login_time.as_deref(), Some("10:00"));
        assert_eq!(day.logout_time.as_deref(), Some("10:00"));
    }

    #[test]
    fn stale_live_record_excludes_offline_gap() {
        // Reconnection: the client was away for five minutes, then a
        // fresh status change moved status_changed_at. The old event's
        // tail no longer matches the live record and must not accrue.
        let events = [ev(7, StatusCategory::Available, "2026-03-02T10:00:00Z")];
        let presence = live(7, StatusCategory::Available, "2026-03-02T10:05:00Z");
        let days = summarize_identity(
            7,
            &events,
            utc(),
            ts("2026-03-02T10:05:00Z"),
            Some(&presence),
        );

        assert_eq!(days[&date("2026-03-02")].total_minutes, 0);
    }

    #[test]
    fn confirmed_open_interval_accrues_to_now() {
        let events = [ev(7, StatusCategory::Available, "2026-03-02T10:00:00Z")];
        let presence = live(7, StatusCategory::Available, "2026-03-02T10:00:00Z");
        let days = summarize_identity(
            7,
            &events,
            utc(),
            ts("2026-03-02T10:45:30Z"),
            Some(&presence),
        );

        assert_eq!(days[&date("2026-03-02")].minutes(StatusCategory::Available), 45);
    }

    #[test]
    fn leave_sets_flag_and_accrues_nothing() {
        let events = [ev(7, StatusCategory::Leave, "2026-03-02T09:00:00Z")];
        let presence = live(7, StatusCategory::Leave, "2026-03-02T09:00:00Z");
        let days = summarize_identity(
            7,
            &events,
            utc(),
            ts("2026-03-02T12:00:00Z"),
            Some(&presence),
        );

        let day = &days[&date("2026-03-02")];
        assert!(day.is_leave_day);
        assert_eq!(day.total_minutes, 0);
        assert!(day.buckets.is_empty());
        assert_eq!(day.login_time.as_deref(), Some("09:00"));
        assert_eq!(day.logout_time.as_deref(), Some("12:00"));
    }

    #[test]
    fn fractional_minutes_dropped_per_subinterval() {
        let events = [
            ev(7, StatusCategory::Available, "2026-03-02T10:00:00Z"),
            ev(7, StatusCategory::Break, "2026-03-02T10:05:30Z"),
            ev(7, StatusCategory::Lunch, "2026-03-02T10:10:00Z"),
        ];
        let days = summarize_identity(7, &events, utc(), ts("2026-03-02T10:10:00Z"), None);

        let day = &days[&date("2026-03-02")];
        assert_eq!(day.minutes(StatusCategory::Available), 5);
        // 270 seconds floors to 4, and the dropped 30s are not carried.
        assert_eq!(day.minutes(StatusCategory::Break), 4);
        assert_eq!(day.total_minutes, 9);
    }

    #[test]
    fn attributed_minutes_never_exceed_covered_span() {
        let events = [
            ev(7, StatusCategory::Available, "2026-03-02T09:00:10Z"),
            ev(7, StatusCategory::Break, "2026-03-02T11:17:45Z"),
            ev(7, StatusCategory::Available, "2026-03-02T11:32:05Z"),
            ev(7, StatusCategory::Lunch, "2026-03-02T13:01:59Z"),
        ];
        let now = ts("2026-03-02T13:45:30Z");
        let presence = live(7, StatusCategory::Lunch, "2026-03-02T13:01:59Z");
        let days = summarize_identity(7, &events, utc(), now, Some(&presence));

        let attributed: i64 = days.values().map(|d| d.total_minutes).sum();
        let span = (now - events[0].occurred_at).num_seconds() / 60;
        assert!(attributed <= span, "{attributed} > {span}");
    }

    #[test]
    fn replay_is_deterministic() {
        let events = [
            ev(7, StatusCategory::Available, "2026-03-02T09:00:00Z"),
            ev(7, StatusCategory::Meeting, "2026-03-02T10:30:00Z"),
            ev(7, StatusCategory::Available, "2026-03-02T11:00:00Z"),
        ];
        let now = ts("2026-03-02T12:00:00Z");
        let presence = live(7, StatusCategory::Available, "2026-03-02T11:00:00Z");

        let first = summarize_identity(7, &events, ist(), now, Some(&presence));
        let second = summarize_identity(7, &events, ist(), now, Some(&presence));
        assert_eq!(first, second);
    }

    #[test]
    fn split_uses_canonical_zone_midnight_not_utc() {
        // 18:00 UTC is 23:30 in the +05:30 canonical zone, so the hour
        // until 19:00 UTC straddles the canonical midnight at 18:30 UTC.
        let events = [
            ev(7, StatusCategory::Available, "2026-03-02T18:00:00Z"),
            ev(7, StatusCategory::Break, "2026-03-02T19:00:00Z"),
        ];
        let days = summarize_identity(7, &events, ist(), ts("2026-03-02T19:00:00Z"), None);

        assert_eq!(
            days[&date("2026-03-02")].minutes(StatusCategory::Available),
            30
        );
        assert_eq!(
            days[&date("2026-03-03")].minutes(StatusCategory::Available),
            30
        );
    }

    #[test]
    fn unsorted_input_is_sorted_before_sweep() {
        let sorted = [
            ev(7, StatusCategory::Available, "2026-03-02T09:00:00Z"),
            ev(7, StatusCategory::Break, "2026-03-02T10:00:00Z"),
            ev(7, StatusCategory::Available, "2026-03-02T10:15:00Z"),
        ];
        let shuffled = [sorted[2].clone(), sorted[0].clone(), sorted[1].clone()];
        let now = ts("2026-03-02T11:00:00Z");

        assert_eq!(
            summarize_identity(7, &sorted, utc(), now, None),
            summarize_identity(7, &shuffled, utc(), now, None)
        );
    }

    #[test]
    fn same_instant_events_keep_arrival_order() {
        // A correction sent at the same clamped instant: the later
        // arrival owns the time going forward, the earlier one owns a
        // zero-length interval.
        let events = [
            ev(7, StatusCategory::Break, "2026-03-02T09:00:00Z"),
            ev(7, StatusCategory::Available, "2026-03-02T09:00:00Z"),
            ev(7, StatusCategory::Lunch, "2026-03-02T09:30:00Z"),
        ];
        let days = summarize_identity(7, &events, utc(), ts("2026-03-02T09:30:00Z"), None);

        let day = &days[&date("2026-03-02")];
        assert_eq!(day.minutes(StatusCategory::Break), 0);
        assert_eq!(day.minutes(StatusCategory::Available), 30);
    }

    #[test]
    fn mixed_event_list_groups_by_identity() {
        let events = [
            ev(1, StatusCategory::Available, "2026-03-02T09:00:00Z"),
            ev(2, StatusCategory::Meeting, "2026-03-02T09:10:00Z"),
            ev(1, StatusCategory::Break, "2026-03-02T09:30:00Z"),
            ev(2, StatusCategory::Available, "2026-03-02T09:40:00Z"),
        ];
        let mut presence = BTreeMap::new();
        presence.insert(
            2,
            live(2, StatusCategory::Available, "2026-03-02T09:40:00Z"),
        );

        let all = summarize_all(&events, utc(), ts("2026-03-02T10:00:00Z"), &presence);

        let one = &all[&1][&date("2026-03-02")];
        assert_eq!(one.minutes(StatusCategory::Available), 30);
        // Identity 1 has no live record: the Break tail is cut.
        assert_eq!(one.minutes(StatusCategory::Break), 0);

        let two = &all[&2][&date("2026-03-02")];
        assert_eq!(two.minutes(StatusCategory::Meeting), 30);
        assert_eq!(two.minutes(StatusCategory::Available), 20);
    }
}
