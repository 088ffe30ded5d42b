use crate::errors::{CollectorError, CollectorResult};
use crate::stats::Evs;
use schema::Stat;

pub const MAX_EV_PER_STAT: u16 = 252;
pub const MAX_EV_TOTAL: u16 = 510;

pub fn ev_total(evs: &Evs) -> u16 {
    evs.iter().sum()
}

/// Add `points` effort to `stat`, keeping the per-stat and total caps.
/// Nothing is changed when the request would break either cap.
pub fn apply_effort(evs: &mut Evs, stat: Stat, points: u16) -> CollectorResult<()> {
    if points == 0 {
        return Err(CollectorError::invalid("EV points must be positive"));
    }

    let current = evs[stat.index()];
    let new_value = current.saturating_add(points);
    if new_value > MAX_EV_PER_STAT {
        return Err(CollectorError::invalid(format!(
            "{} EVs would reach {}, the cap is {}",
            stat, new_value, MAX_EV_PER_STAT
        )));
    }

    let new_total = ev_total(evs).saturating_add(points);
    if new_total > MAX_EV_TOTAL {
        return Err(CollectorError::invalid(format!(
            "total EVs would reach {}, the cap is {}",
            new_total, MAX_EV_TOTAL
        )));
    }

    evs[stat.index()] = new_value;
    Ok(())
}
